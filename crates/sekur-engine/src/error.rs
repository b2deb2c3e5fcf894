//! # Engine Error Taxonomy
//!
//! Every failure mode of the escrow engine is a distinct variant,
//! surfaced to callers verbatim. None of these leave side effects
//! behind: an error means nothing was persisted and nothing was
//! credited (see the atomicity notes on [`crate::engine::EscrowEngine`]).

use thiserror::Error;

use sekur_core::{ActorId, EscrowId, OrderRef, PartyId, ValidationError};

use crate::transaction::EscrowStatus;

/// Errors raised by escrow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// Malformed amount, fee, or identical payer/receiver. Rejected
    /// before any side effect.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An active (non-terminal) escrow already exists for the order.
    #[error("an active escrow already exists for order {order_ref}")]
    DuplicateActiveEscrow {
        /// The order reference that is already protected.
        order_ref: OrderRef,
    },

    /// The payer's balance cannot cover the hold. Propagated from the
    /// ledger adapter at `initiate`; nothing is persisted.
    #[error("insufficient funds: party {party} has {available}, needs {required}")]
    InsufficientFunds {
        /// The party whose balance fell short.
        party: PartyId,
        /// Minor units required for the hold.
        required: i64,
        /// Minor units actually available.
        available: i64,
    },

    /// The requested transition is illegal from the current status.
    #[error("invalid state: escrow is {current}, requested {requested}")]
    InvalidState {
        /// Status the escrow is currently in.
        current: EscrowStatus,
        /// Status the caller tried to move to.
        requested: EscrowStatus,
    },

    /// The actor lacks authorization for the requested operation.
    #[error("forbidden: actor {actor} may not {operation} this escrow")]
    Forbidden {
        /// The actor that was rejected.
        actor: ActorId,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The optimistic status guard lost a race. The caller should
    /// re-read and either retry or treat the operation as already
    /// applied.
    #[error("concurrent modification of escrow {escrow_id}")]
    ConcurrentModification {
        /// The escrow whose status moved underneath the caller.
        escrow_id: EscrowId,
    },

    /// No escrow exists with the given identifier.
    #[error("escrow {escrow_id} not found")]
    NotFound {
        /// The identifier that matched nothing.
        escrow_id: EscrowId,
    },
}

impl From<ValidationError> for EscrowError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
