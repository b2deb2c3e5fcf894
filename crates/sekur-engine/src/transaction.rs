//! # Escrow Transaction & Action Log
//!
//! The central entity of the settlement engine and its append-only audit
//! trail.
//!
//! ## Design Choice: Validated Enum over Typestate
//!
//! [`EscrowStatus`] is a validated enum (runtime-checked) rather than a
//! typestate encoding. Escrows are stored in databases and travel over
//! the API; the state is not known at compile time, and a validated enum
//! serializes directly via serde. Exhaustive `match` at every transition
//! site still eliminates the "forgot to handle a status" class of bugs
//! the original loosely-typed handlers suffered from.
//!
//! ## Transition Graph
//!
//! ```text
//! pending ──initiate()──▶ held ──release()──▶ released
//!                           │
//!                           ├──refund()────▶ refunded
//!                           │
//!                           └──dispute()───▶ dispute
//!                                              │
//!                                 ┌────────────┤
//!                           resolve(release)  resolve(refund)
//!                                 │            │
//!                                 ▼            ▼
//!                        resolved_released  resolved_refunded
//! ```
//!
//! `released`, `refunded`, `resolved_released`, and `resolved_refunded`
//! are terminal. The arbitrated terminals are kept distinct from the
//! self-service ones so downstream reporting can separate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sekur_core::{
    ActorId, CurrencyCode, EscrowId, FeePercent, MinorAmount, OrderRef, PartyId,
};

use crate::error::EscrowError;

// ── Status ─────────────────────────────────────────────────────────────

/// The lifecycle status of an escrow transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Record constructed, funds not yet debited. Never persisted —
    /// `initiate` lands directly on `held` or fails without trace.
    Pending,
    /// Funds debited from the payer and held by the platform.
    Held,
    /// Receiver credited (minus fee). Terminal.
    Released,
    /// Payer credited back in full. Terminal.
    Refunded,
    /// Frozen pending arbitration. No funds move.
    Dispute,
    /// Arbitrated in the receiver's favor. Terminal.
    ResolvedReleased,
    /// Arbitrated in the payer's favor. Terminal.
    ResolvedRefunded,
}

impl EscrowStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Released => "released",
            Self::Refunded => "refunded",
            Self::Dispute => "dispute",
            Self::ResolvedReleased => "resolved_released",
            Self::ResolvedRefunded => "resolved_refunded",
        }
    }

    /// Whether this status is terminal (no further transition is legal).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Released | Self::Refunded | Self::ResolvedReleased | Self::ResolvedRefunded
        )
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [EscrowStatus] {
        match self {
            Self::Pending => &[Self::Held],
            Self::Held => &[Self::Released, Self::Refunded, Self::Dispute],
            Self::Dispute => &[Self::ResolvedReleased, Self::ResolvedRefunded],
            Self::Released | Self::Refunded | Self::ResolvedReleased | Self::ResolvedRefunded => {
                &[]
            }
        }
    }

    /// All status values, for dashboards and metrics labels.
    pub fn all() -> &'static [EscrowStatus] {
        &[
            Self::Pending,
            Self::Held,
            Self::Released,
            Self::Refunded,
            Self::Dispute,
            Self::ResolvedReleased,
            Self::ResolvedRefunded,
        ]
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EscrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown escrow status: {s:?}"))
    }
}

// ── Action Log ─────────────────────────────────────────────────────────

/// The kind of action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowAction {
    /// Funds debited and the hold created.
    Initiated,
    /// Receiver credited, escrow closed favorably.
    Released,
    /// Payer credited back, escrow closed unfavorably.
    Refunded,
    /// Escrow frozen pending arbitration.
    DisputeOpened,
    /// Arbitration decision applied.
    DisputeResolved,
}

impl EscrowAction {
    /// The canonical string identifier for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Released => "released",
            Self::Refunded => "refunded",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeResolved => "dispute_resolved",
        }
    }
}

impl std::fmt::Display for EscrowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EscrowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Initiated,
            Self::Released,
            Self::Refunded,
            Self::DisputeOpened,
            Self::DisputeResolved,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
        .ok_or_else(|| format!("unknown escrow action: {s:?}"))
    }
}

/// A single entry in the append-only escrow action log.
///
/// ## Security Invariant
///
/// The log is never mutated or deleted. It is the audit trail and must
/// allow full reconstruction of a transaction's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// The escrow this entry belongs to.
    pub escrow_id: EscrowId,
    /// What happened.
    pub action: EscrowAction,
    /// Party or system actor that performed the action.
    pub performed_by: ActorId,
    /// Optional human-readable note.
    pub note: Option<String>,
    /// Free-form structured context (amounts, reasons, sweep markers).
    pub metadata: serde_json::Value,
    /// When the action was recorded (UTC).
    pub created_at: DateTime<Utc>,
}

impl ActionLogEntry {
    /// Create a log entry timestamped now.
    pub fn new(
        escrow_id: EscrowId,
        action: EscrowAction,
        performed_by: ActorId,
        note: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            escrow_id,
            action,
            performed_by,
            note,
            metadata,
            created_at: Utc::now(),
        }
    }
}

// ── The Transaction ────────────────────────────────────────────────────

/// The central escrow record: who paid, who will be paid, how much is
/// held, and where the lifecycle currently stands.
///
/// The engine is the sole writer of `status`; every status write happens
/// through the store's `transition` primitive together with a log append.
/// `amount`, `currency`, `fee_percent`, `fee_amount`, and `net_amount`
/// are immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Unique identifier, generated at creation.
    pub id: EscrowId,
    /// The commercial transaction this escrow protects. At most one
    /// active escrow per order ref.
    pub order_ref: OrderRef,
    /// The party whose funds are held.
    pub payer_id: PartyId,
    /// The party paid on release.
    pub receiver_id: PartyId,
    /// Held amount in minor currency units.
    pub amount: MinorAmount,
    /// Currency of all amounts on this record.
    pub currency: CurrencyCode,
    /// Fee policy snapshotted at creation; never re-evaluated.
    pub fee_percent: FeePercent,
    /// Platform fee in minor units, computed once at creation.
    pub fee_amount: i64,
    /// `amount - fee_amount`; payable to the receiver on release.
    pub net_amount: i64,
    /// Current lifecycle status.
    pub status: EscrowStatus,
    /// Why the escrow was frozen; set only when entering `dispute`.
    pub dispute_reason: Option<String>,
    /// Arbitrator's note; set only when leaving `dispute`.
    pub resolution_note: Option<String>,
    /// Arbitrated settlement amount in minor units, when the decision
    /// was partial.
    pub resolution_amount: Option<i64>,
    /// When the record was created (UTC).
    pub created_at: DateTime<Utc>,
    /// When the record was last written (UTC).
    pub updated_at: DateTime<Utc>,
    /// When a terminal status was reached (UTC).
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscrowTransaction {
    /// Construct a new escrow record in `pending` status.
    ///
    /// Computes the fee split once: `fee_amount` is round-half-to-even
    /// of `amount * fee_percent / 100` and `net_amount` is the exact
    /// remainder, so `fee_amount + net_amount == amount` by
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidInput`] if payer and receiver are
    /// the same party.
    pub fn new(
        order_ref: OrderRef,
        payer_id: PartyId,
        receiver_id: PartyId,
        amount: MinorAmount,
        currency: CurrencyCode,
        fee_percent: FeePercent,
    ) -> Result<Self, EscrowError> {
        if payer_id == receiver_id {
            return Err(EscrowError::InvalidInput(
                "payer and receiver must be different parties".to_string(),
            ));
        }

        let split = fee_percent.split(amount);
        debug_assert_eq!(split.fee + split.net, amount.get());

        let now = Utc::now();
        Ok(Self {
            id: EscrowId::new(),
            order_ref,
            payer_id,
            receiver_id,
            amount,
            currency,
            fee_percent,
            fee_amount: split.fee,
            net_amount: split.net,
            status: EscrowStatus::Pending,
            dispute_reason: None,
            resolution_note: None,
            resolution_amount: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(s: &str) -> OrderRef {
        OrderRef::new(s).unwrap()
    }

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    fn new_tx(amount: i64, fee: &str) -> EscrowTransaction {
        EscrowTransaction::new(
            order("O1"),
            party("payer"),
            party("receiver"),
            MinorAmount::new(amount).unwrap(),
            CurrencyCode::new("GNF").unwrap(),
            fee.parse().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn new_computes_fee_split() {
        let tx = new_tx(10_000, "2.5");
        assert_eq!(tx.status, EscrowStatus::Pending);
        assert_eq!(tx.fee_amount, 250);
        assert_eq!(tx.net_amount, 9_750);
        assert_eq!(tx.fee_amount + tx.net_amount, tx.amount.get());
    }

    #[test]
    fn new_rejects_self_payment() {
        let result = EscrowTransaction::new(
            order("O1"),
            party("same"),
            party("same"),
            MinorAmount::new(100).unwrap(),
            CurrencyCode::new("GNF").unwrap(),
            FeePercent::zero(),
        );
        assert!(matches!(result, Err(EscrowError::InvalidInput(_))));
    }

    #[test]
    fn status_terminal_classification() {
        assert!(!EscrowStatus::Pending.is_terminal());
        assert!(!EscrowStatus::Held.is_terminal());
        assert!(!EscrowStatus::Dispute.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
        assert!(EscrowStatus::ResolvedReleased.is_terminal());
        assert!(EscrowStatus::ResolvedRefunded.is_terminal());
    }

    #[test]
    fn status_valid_transitions() {
        assert_eq!(EscrowStatus::Pending.valid_transitions(), &[EscrowStatus::Held]);
        let from_held = EscrowStatus::Held.valid_transitions();
        assert!(from_held.contains(&EscrowStatus::Released));
        assert!(from_held.contains(&EscrowStatus::Refunded));
        assert!(from_held.contains(&EscrowStatus::Dispute));
        assert_eq!(from_held.len(), 3);

        let from_dispute = EscrowStatus::Dispute.valid_transitions();
        assert!(from_dispute.contains(&EscrowStatus::ResolvedReleased));
        assert!(from_dispute.contains(&EscrowStatus::ResolvedRefunded));
        assert_eq!(from_dispute.len(), 2);

        for terminal in [
            EscrowStatus::Released,
            EscrowStatus::Refunded,
            EscrowStatus::ResolvedReleased,
            EscrowStatus::ResolvedRefunded,
        ] {
            assert!(terminal.valid_transitions().is_empty());
        }
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&EscrowStatus::ResolvedReleased).unwrap();
        assert_eq!(json, "\"resolved_released\"");
        let back: EscrowStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EscrowStatus::ResolvedReleased);
    }

    #[test]
    fn status_from_str_roundtrip() {
        for st in EscrowStatus::all() {
            let parsed: EscrowStatus = st.as_str().parse().unwrap();
            assert_eq!(parsed, *st);
        }
        assert!("bogus".parse::<EscrowStatus>().is_err());
    }

    #[test]
    fn action_as_str() {
        assert_eq!(EscrowAction::Initiated.as_str(), "initiated");
        assert_eq!(EscrowAction::Released.as_str(), "released");
        assert_eq!(EscrowAction::Refunded.as_str(), "refunded");
        assert_eq!(EscrowAction::DisputeOpened.as_str(), "dispute_opened");
        assert_eq!(EscrowAction::DisputeResolved.as_str(), "dispute_resolved");
    }

    #[test]
    fn transaction_serde_roundtrip() {
        let tx = new_tx(10_000, "2.5");
        let json = serde_json::to_string(&tx).unwrap();
        let back: EscrowTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn zero_fee_split() {
        let tx = new_tx(777, "0");
        assert_eq!(tx.fee_amount, 0);
        assert_eq!(tx.net_amount, 777);
    }
}
