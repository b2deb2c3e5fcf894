//! # Dispute Resolver
//!
//! Arbitration front-end over the engine's `resolve` operation. Keeps
//! the arbitration vocabulary (full award, partial award, percentage
//! split) out of the request handlers and maps each form onto the one
//! underlying primitive.

use std::sync::Arc;

use sekur_core::{ActorId, EscrowId, FeePercent};

use crate::engine::{EscrowEngine, ResolutionDecision};
use crate::error::EscrowError;
use crate::transaction::EscrowTransaction;

/// Arbitration operations, bound to an engine.
#[derive(Clone)]
pub struct DisputeResolver {
    engine: Arc<EscrowEngine>,
}

impl DisputeResolver {
    pub fn new(engine: Arc<EscrowEngine>) -> Self {
        Self { engine }
    }

    /// Award the full held amount one way. Settles exactly like the
    /// matching self-service operation, fee included on release.
    pub fn resolve_full(
        &self,
        arbitrator: &ActorId,
        id: &EscrowId,
        decision: ResolutionDecision,
        note: Option<String>,
    ) -> Result<EscrowTransaction, EscrowError> {
        self.engine.resolve(arbitrator, id, decision, note, None)
    }

    /// Award a fixed amount to the favored party; the counterparty
    /// receives the remainder and no fee is taken.
    pub fn resolve_partial(
        &self,
        arbitrator: &ActorId,
        id: &EscrowId,
        decision: ResolutionDecision,
        amount: i64,
        note: Option<String>,
    ) -> Result<EscrowTransaction, EscrowError> {
        self.engine.resolve(arbitrator, id, decision, note, Some(amount))
    }

    /// Award a percentage of the held amount to the favored party.
    /// The portion is computed with the same banker's rounding used
    /// for fees, so split awards stay consistent with fee arithmetic.
    pub fn resolve_split(
        &self,
        arbitrator: &ActorId,
        id: &EscrowId,
        decision: ResolutionDecision,
        portion: FeePercent,
        note: Option<String>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let tx = self.engine.get(id)?;
        let amount = portion.split(tx.amount).fee;
        self.engine.resolve(arbitrator, id, decision, note, Some(amount))
    }
}
