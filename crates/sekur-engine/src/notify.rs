//! # Notification Emitter
//!
//! Post-commit event fan-out. The engine emits one [`EscrowEvent`] per
//! settled state change, after the store write has committed and the
//! ledger credits have been applied. Emission is strictly best-effort:
//! an emitter failure is logged and swallowed, never propagated into
//! the settlement path, and never rolls anything back.

use serde::{Deserialize, Serialize};

use sekur_core::{CurrencyCode, EscrowId, PartyId};

use crate::transaction::EscrowStatus;

// ── Events ─────────────────────────────────────────────────────────────

/// The kind of lifecycle event being announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    EscrowInitiated,
    EscrowReleased,
    EscrowRefunded,
    EscrowDisputed,
    DisputeResolved,
}

impl EventKind {
    /// Dotted event name, the stable identifier on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscrowInitiated => "escrow.initiated",
            Self::EscrowReleased => "escrow.released",
            Self::EscrowRefunded => "escrow.refunded",
            Self::EscrowDisputed => "escrow.disputed",
            Self::DisputeResolved => "escrow.dispute_resolved",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A settled lifecycle change, addressed to both parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub kind: EventKind,
    pub escrow_id: EscrowId,
    pub payer_id: PartyId,
    pub receiver_id: PartyId,
    /// Status the escrow settled into.
    pub status: EscrowStatus,
    /// Amount in minor units relevant to the event (held, released, or
    /// refunded amount depending on the kind).
    pub amount: i64,
    pub currency: CurrencyCode,
}

// ── Emitter ────────────────────────────────────────────────────────────

/// Delivery failure. The engine logs these and moves on.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification seam.
pub trait NotificationEmitter: Send + Sync {
    /// Deliver an event to both parties. Called after commit only.
    fn emit(&self, event: &EscrowEvent) -> Result<(), NotifyError>;
}

/// Default emitter: writes each event to the structured log. Suitable
/// for deployments where a log shipper is the notification transport.
#[derive(Debug, Default)]
pub struct TracingEmitter;

impl NotificationEmitter for TracingEmitter {
    fn emit(&self, event: &EscrowEvent) -> Result<(), NotifyError> {
        tracing::info!(
            event = event.kind.as_str(),
            escrow_id = %event.escrow_id,
            payer_id = event.payer_id.as_str(),
            receiver_id = event.receiver_id.as_str(),
            status = event.status.as_str(),
            amount = event.amount,
            currency = event.currency.as_str(),
            "escrow event"
        );
        Ok(())
    }
}
