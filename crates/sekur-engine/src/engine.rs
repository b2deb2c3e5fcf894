//! # Escrow Engine
//!
//! Orchestrates the full escrow lifecycle over four injected seams:
//! store, ledger, authorization, and notifications.
//!
//! ## Atomicity Model
//!
//! Money movement and status are kept consistent by ordering, not by a
//! distributed transaction:
//!
//! - **Initiate** debits the payer first, then inserts the `held`
//!   record. If the insert loses a duplicate-order race, the debit is
//!   compensated with a credit before the error returns.
//! - **Terminal operations** commit the guarded status transition
//!   first. The transition is the single commit point; once it
//!   succeeds the follow-up credits are infallible by the ledger
//!   contract, so funds can never be applied partially or twice.
//!
//! Notifications are emitted strictly after commit and are best-effort.

use std::sync::Arc;

use sekur_core::{ActorId, EscrowId, FeePercent, OrderRef, PartyId};

use crate::authz::AuthorizationProvider;
use crate::error::EscrowError;
use crate::ledger::{LedgerAdapter, LedgerError};
use crate::notify::{EscrowEvent, EventKind, NotificationEmitter};
use crate::store::{EscrowStore, TransitionChange};
use crate::transaction::{ActionLogEntry, EscrowAction, EscrowStatus, EscrowTransaction};

// ── Configuration ──────────────────────────────────────────────────────

/// Engine-level settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Platform account credited with the fee portion on release.
    pub fee_account: PartyId,
    /// Fee applied when an initiate request names no fee.
    pub default_fee: FeePercent,
}

// ── Requests ───────────────────────────────────────────────────────────

/// Input to [`EscrowEngine::initiate`].
#[derive(Debug, Clone)]
pub struct InitiateParams {
    pub order_ref: OrderRef,
    pub payer_id: PartyId,
    pub receiver_id: PartyId,
    pub amount: sekur_core::MinorAmount,
    pub currency: sekur_core::CurrencyCode,
    /// Overrides the engine's default fee when present.
    pub fee_percent: Option<FeePercent>,
}

/// Which way an arbitrated dispute settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionDecision {
    /// In the receiver's favor.
    Release,
    /// In the payer's favor.
    Refund,
}

// ── Engine ─────────────────────────────────────────────────────────────

/// The settlement engine. Cheap to clone behind its `Arc`s; one
/// instance is shared across all request handlers and the sweep task.
pub struct EscrowEngine {
    store: Arc<dyn EscrowStore>,
    ledger: Arc<dyn LedgerAdapter>,
    authz: Arc<dyn AuthorizationProvider>,
    emitter: Arc<dyn NotificationEmitter>,
    config: EngineConfig,
}

impl EscrowEngine {
    pub fn new(
        store: Arc<dyn EscrowStore>,
        ledger: Arc<dyn LedgerAdapter>,
        authz: Arc<dyn AuthorizationProvider>,
        emitter: Arc<dyn NotificationEmitter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            authz,
            emitter,
            config,
        }
    }

    /// The store behind this engine, for read-side wiring.
    pub fn store(&self) -> &Arc<dyn EscrowStore> {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Lifecycle Operations ───────────────────────────────────────────

    /// Open an escrow: debit the payer and hold the funds.
    ///
    /// The acting party must be the payer. At most one non-terminal
    /// escrow may exist per order ref.
    pub fn initiate(
        &self,
        actor: &ActorId,
        params: InitiateParams,
    ) -> Result<EscrowTransaction, EscrowError> {
        if !actor.is_party(&params.payer_id) {
            return Err(EscrowError::Forbidden {
                actor: actor.clone(),
                operation: "initiate",
            });
        }
        if let Some(existing) = self.store.active_by_order_ref(&params.order_ref) {
            return Err(EscrowError::DuplicateActiveEscrow {
                order_ref: existing.order_ref,
            });
        }

        let fee = params.fee_percent.unwrap_or(self.config.default_fee);
        let mut tx = EscrowTransaction::new(
            params.order_ref,
            params.payer_id,
            params.receiver_id,
            params.amount,
            params.currency,
            fee,
        )?;

        // Debit first. A record only ever reaches the store with its
        // funds already held.
        self.ledger
            .debit(&tx.payer_id, &tx.currency, tx.amount)
            .map_err(|err| map_ledger_error(err, tx.amount.get()))?;
        tx.status = EscrowStatus::Held;

        let log = ActionLogEntry::new(
            tx.id,
            EscrowAction::Initiated,
            actor.clone(),
            None,
            serde_json::json!({
                "amount": tx.amount.get(),
                "fee_amount": tx.fee_amount,
                "fee_percent": tx.fee_percent.to_string(),
            }),
        );
        if let Err(err) = self.store.insert(tx.clone(), log) {
            // Lost a duplicate-order race after the debit: give the
            // money back before surfacing the error.
            self.ledger
                .credit(&tx.payer_id, &tx.currency, tx.amount.get());
            return Err(err);
        }

        tracing::info!(
            escrow_id = %tx.id,
            order_ref = tx.order_ref.as_str(),
            amount = tx.amount.get(),
            "escrow initiated"
        );
        self.emit(&tx, EventKind::EscrowInitiated, tx.amount.get());
        Ok(tx)
    }

    /// Release held funds to the receiver, minus the platform fee.
    ///
    /// Allowed for the payer or an arbitrator. Replaying a release
    /// against an already-released escrow succeeds without moving
    /// funds again.
    pub fn release(
        &self,
        actor: &ActorId,
        id: &EscrowId,
        note: Option<String>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let tx = self.store.get(id)?;
        if !actor.is_party(&tx.payer_id) && !self.authz.is_arbitrator(actor) {
            return Err(EscrowError::Forbidden {
                actor: actor.clone(),
                operation: "release",
            });
        }
        if tx.status == EscrowStatus::Released {
            return Ok(tx);
        }

        let log = ActionLogEntry::new(
            tx.id,
            EscrowAction::Released,
            actor.clone(),
            note,
            serde_json::json!({
                "net_amount": tx.net_amount,
                "fee_amount": tx.fee_amount,
            }),
        );
        let updated = self.store.transition(
            id,
            tx.status,
            EscrowStatus::Released,
            TransitionChange::default(),
            log,
        )?;

        // Commit point passed: both credits are infallible.
        self.ledger
            .credit(&updated.receiver_id, &updated.currency, updated.net_amount);
        self.credit_fee(&updated);

        tracing::info!(escrow_id = %updated.id, net_amount = updated.net_amount, "escrow released");
        self.emit(&updated, EventKind::EscrowReleased, updated.net_amount);
        Ok(updated)
    }

    /// Return held funds to the payer in full. No fee is taken.
    ///
    /// Allowed for the receiver or an arbitrator. Idempotent against
    /// an already-refunded escrow.
    pub fn refund(
        &self,
        actor: &ActorId,
        id: &EscrowId,
        note: Option<String>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let tx = self.store.get(id)?;
        if !actor.is_party(&tx.receiver_id) && !self.authz.is_arbitrator(actor) {
            return Err(EscrowError::Forbidden {
                actor: actor.clone(),
                operation: "refund",
            });
        }
        if tx.status == EscrowStatus::Refunded {
            return Ok(tx);
        }

        let log = ActionLogEntry::new(
            tx.id,
            EscrowAction::Refunded,
            actor.clone(),
            note,
            serde_json::json!({ "amount": tx.amount.get() }),
        );
        let updated = self.store.transition(
            id,
            tx.status,
            EscrowStatus::Refunded,
            TransitionChange::default(),
            log,
        )?;

        self.ledger
            .credit(&updated.payer_id, &updated.currency, updated.amount.get());

        tracing::info!(escrow_id = %updated.id, amount = updated.amount.get(), "escrow refunded");
        self.emit(&updated, EventKind::EscrowRefunded, updated.amount.get());
        Ok(updated)
    }

    /// Freeze a held escrow pending arbitration. No funds move.
    ///
    /// Allowed for either party to the transaction or an arbitrator.
    /// The auto-escalation path goes through [`EscrowEngine::escalate`],
    /// which bypasses this guard under the engine-owned system actor.
    pub fn dispute(
        &self,
        actor: &ActorId,
        id: &EscrowId,
        reason: String,
    ) -> Result<EscrowTransaction, EscrowError> {
        let tx = self.store.get(id)?;
        if !actor.is_party(&tx.payer_id)
            && !actor.is_party(&tx.receiver_id)
            && !self.authz.is_arbitrator(actor)
        {
            return Err(EscrowError::Forbidden {
                actor: actor.clone(),
                operation: "dispute",
            });
        }
        self.open_dispute(actor, tx, reason)
    }

    /// Shared dispute transition, run after the caller has settled who
    /// the acting identity is.
    fn open_dispute(
        &self,
        actor: &ActorId,
        tx: EscrowTransaction,
        reason: String,
    ) -> Result<EscrowTransaction, EscrowError> {
        if tx.status == EscrowStatus::Dispute {
            return Ok(tx);
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(EscrowError::InvalidInput(
                "dispute reason must not be empty".to_string(),
            ));
        }

        let log = ActionLogEntry::new(
            tx.id,
            EscrowAction::DisputeOpened,
            actor.clone(),
            Some(reason.clone()),
            serde_json::Value::Null,
        );
        let updated = self.store.transition(
            &tx.id,
            tx.status,
            EscrowStatus::Dispute,
            TransitionChange {
                dispute_reason: Some(reason),
                ..Default::default()
            },
            log,
        )?;

        tracing::info!(escrow_id = %updated.id, "escrow disputed");
        self.emit(&updated, EventKind::EscrowDisputed, updated.amount.get());
        Ok(updated)
    }

    /// Apply an arbitration decision to a disputed escrow.
    ///
    /// Arbitrators only. A full decision settles like the matching
    /// self-service operation: release pays the receiver net of the
    /// fee, refund returns the payer everything. When
    /// `resolution_amount` is present the settlement is split with no
    /// fee taken: the favored party receives that amount and the
    /// counterparty the remainder.
    pub fn resolve(
        &self,
        actor: &ActorId,
        id: &EscrowId,
        decision: ResolutionDecision,
        note: Option<String>,
        resolution_amount: Option<i64>,
    ) -> Result<EscrowTransaction, EscrowError> {
        if !self.authz.is_arbitrator(actor) {
            return Err(EscrowError::Forbidden {
                actor: actor.clone(),
                operation: "resolve",
            });
        }
        let tx = self.store.get(id)?;
        let target = match decision {
            ResolutionDecision::Release => EscrowStatus::ResolvedReleased,
            ResolutionDecision::Refund => EscrowStatus::ResolvedRefunded,
        };
        if tx.status == target {
            return Ok(tx);
        }
        if let Some(portion) = resolution_amount {
            if portion <= 0 || portion > tx.amount.get() {
                return Err(EscrowError::InvalidInput(format!(
                    "resolution amount must be between 1 and {}",
                    tx.amount.get()
                )));
            }
        }

        let log = ActionLogEntry::new(
            tx.id,
            EscrowAction::DisputeResolved,
            actor.clone(),
            note.clone(),
            serde_json::json!({
                "decision": target.as_str(),
                "resolution_amount": resolution_amount,
            }),
        );
        let updated = self.store.transition(
            id,
            tx.status,
            target,
            TransitionChange {
                resolution_note: note,
                resolution_amount,
                ..Default::default()
            },
            log,
        )?;

        let settled_amount = match resolution_amount {
            // Split settlement, fee waived.
            Some(portion) => {
                let (favored, counterparty) = match decision {
                    ResolutionDecision::Release => (&updated.receiver_id, &updated.payer_id),
                    ResolutionDecision::Refund => (&updated.payer_id, &updated.receiver_id),
                };
                self.ledger.credit(favored, &updated.currency, portion);
                let remainder = updated.amount.get() - portion;
                if remainder > 0 {
                    self.ledger.credit(counterparty, &updated.currency, remainder);
                }
                portion
            }
            None => match decision {
                ResolutionDecision::Release => {
                    self.ledger.credit(
                        &updated.receiver_id,
                        &updated.currency,
                        updated.net_amount,
                    );
                    self.credit_fee(&updated);
                    updated.net_amount
                }
                ResolutionDecision::Refund => {
                    self.ledger.credit(
                        &updated.payer_id,
                        &updated.currency,
                        updated.amount.get(),
                    );
                    updated.amount.get()
                }
            },
        };

        tracing::info!(
            escrow_id = %updated.id,
            decision = target.as_str(),
            settled_amount,
            "dispute resolved"
        );
        self.emit(&updated, EventKind::DisputeResolved, settled_amount);
        Ok(updated)
    }

    // ── Read Side ──────────────────────────────────────────────────────

    /// Fetch an escrow by id.
    pub fn get(&self, id: &EscrowId) -> Result<EscrowTransaction, EscrowError> {
        self.store.get(id)
    }

    /// The active escrow for an order ref, if one exists.
    pub fn get_active_by_order(&self, order_ref: &OrderRef) -> Option<EscrowTransaction> {
        self.store.active_by_order_ref(order_ref)
    }

    /// All escrows involving a party, newest first.
    pub fn list_by_party(&self, party: &PartyId) -> Vec<EscrowTransaction> {
        self.store.list_by_party(party)
    }

    /// Audit trail of an escrow, oldest first.
    pub fn history(&self, id: &EscrowId) -> Result<Vec<ActionLogEntry>, EscrowError> {
        self.store.get(id)?;
        Ok(self.store.history(id))
    }

    // ── Maintenance ────────────────────────────────────────────────────

    /// Actor recorded on sweep-opened disputes. Only the engine itself
    /// disputes under this identity; callers of [`EscrowEngine::dispute`]
    /// still have to be a party or an arbitrator.
    pub const SYSTEM_ACTOR: &'static str = "system:auto-escalation";

    /// Open a dispute on behalf of the auto-escalation sweep, recording
    /// [`EscrowEngine::SYSTEM_ACTOR`] in the audit trail.
    pub fn escalate(&self, id: &EscrowId, reason: String) -> Result<EscrowTransaction, EscrowError> {
        let system = ActorId::new(Self::SYSTEM_ACTOR).expect("literal is a valid actor id");
        let tx = self.store.get(id)?;
        self.open_dispute(&system, tx, reason)
    }

    /// Escalate held escrows older than `max_age` into `dispute`,
    /// acting as the system. Returns how many were escalated; an
    /// escrow that moves underneath the sweep is skipped, not failed.
    pub fn escalate_stale(&self, max_age: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - max_age;
        let stale = self.store.list_held_older_than(cutoff);

        let mut escalated = 0;
        for tx in stale {
            match self.escalate(
                &tx.id,
                format!("auto-escalated: held longer than {} hours", max_age.num_hours()),
            ) {
                Ok(_) => escalated += 1,
                Err(EscrowError::ConcurrentModification { .. })
                | Err(EscrowError::InvalidState { .. }) => continue,
                Err(err) => {
                    tracing::warn!(escrow_id = %tx.id, error = %err, "auto-escalation failed");
                }
            }
        }
        if escalated > 0 {
            tracing::info!(escalated, "auto-escalation sweep complete");
        }
        escalated
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn credit_fee(&self, tx: &EscrowTransaction) {
        if tx.fee_amount > 0 {
            self.ledger
                .credit(&self.config.fee_account, &tx.currency, tx.fee_amount);
        }
    }

    fn emit(&self, tx: &EscrowTransaction, kind: EventKind, amount: i64) {
        let event = EscrowEvent {
            kind,
            escrow_id: tx.id,
            payer_id: tx.payer_id.clone(),
            receiver_id: tx.receiver_id.clone(),
            status: tx.status,
            amount,
            currency: tx.currency.clone(),
        };
        if let Err(err) = self.emitter.emit(&event) {
            tracing::warn!(escrow_id = %tx.id, event = kind.as_str(), error = %err, "notification dropped");
        }
    }
}

fn map_ledger_error(err: LedgerError, required: i64) -> EscrowError {
    match err {
        // A wallet that was never funded holds nothing.
        LedgerError::UnknownAccount { party, .. } => EscrowError::InsufficientFunds {
            party,
            required,
            available: 0,
        },
        LedgerError::InsufficientFunds {
            party,
            required,
            available,
        } => EscrowError::InsufficientFunds {
            party,
            required,
            available,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::StaticArbitrators;
    use crate::ledger::MemoryLedger;
    use crate::notify::test_support::RecordingEmitter;
    use crate::store::MemoryStore;
    use sekur_core::{CurrencyCode, MinorAmount};

    struct Harness {
        engine: EscrowEngine,
        ledger: Arc<MemoryLedger>,
        store: Arc<MemoryStore>,
        emitter: Arc<RecordingEmitter>,
    }

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    fn actor(s: &str) -> ActorId {
        ActorId::new(s).unwrap()
    }

    fn gnf() -> CurrencyCode {
        CurrencyCode::new("GNF").unwrap()
    }

    fn harness() -> Harness {
        harness_with_emitter(Arc::new(RecordingEmitter::default()))
    }

    fn harness_with_emitter(emitter: Arc<RecordingEmitter>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        ledger.deposit(&party("payer"), &gnf(), 100_000);
        let engine = EscrowEngine::new(
            Arc::clone(&store) as Arc<dyn EscrowStore>,
            Arc::clone(&ledger) as Arc<dyn LedgerAdapter>,
            Arc::new(StaticArbitrators::new([actor("arbiter")])),
            Arc::clone(&emitter) as Arc<dyn NotificationEmitter>,
            EngineConfig {
                fee_account: party("platform"),
                default_fee: FeePercent::from_bps(250).unwrap(),
            },
        );
        Harness {
            engine,
            ledger,
            store,
            emitter,
        }
    }

    fn params(order_ref: &str, amount: i64) -> InitiateParams {
        InitiateParams {
            order_ref: OrderRef::new(order_ref).unwrap(),
            payer_id: party("payer"),
            receiver_id: party("receiver"),
            amount: MinorAmount::new(amount).unwrap(),
            currency: gnf(),
            fee_percent: None,
        }
    }

    fn initiate(h: &Harness, order_ref: &str, amount: i64) -> EscrowTransaction {
        h.engine.initiate(&actor("payer"), params(order_ref, amount)).unwrap()
    }

    // ── Happy Paths ────────────────────────────────────────────────────

    #[test]
    fn initiate_then_release_splits_funds() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        assert_eq!(tx.status, EscrowStatus::Held);
        assert_eq!(h.ledger.balance_of(&party("payer"), &gnf()), 90_000);

        let released = h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        assert_eq!(released.status, EscrowStatus::Released);
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 9_750);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 250);
        assert_eq!(
            h.emitter.kinds(),
            vec![EventKind::EscrowInitiated, EventKind::EscrowReleased]
        );
    }

    #[test]
    fn refund_returns_full_amount_no_fee() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);

        let refunded = h.engine.refund(&actor("receiver"), &tx.id, None).unwrap();
        assert_eq!(refunded.status, EscrowStatus::Refunded);
        assert_eq!(h.ledger.balance_of(&party("payer"), &gnf()), 100_000);
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 0);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 0);
    }

    #[test]
    fn dispute_then_full_release_resolution() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine
            .dispute(&actor("receiver"), &tx.id, "payer unresponsive".to_string())
            .unwrap();

        let resolved = h
            .engine
            .resolve(
                &actor("arbiter"),
                &tx.id,
                ResolutionDecision::Release,
                Some("delivery confirmed".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(resolved.status, EscrowStatus::ResolvedReleased);
        assert_eq!(resolved.resolution_note.as_deref(), Some("delivery confirmed"));
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 9_750);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 250);
        assert_eq!(
            h.emitter.kinds(),
            vec![
                EventKind::EscrowInitiated,
                EventKind::EscrowDisputed,
                EventKind::DisputeResolved,
            ]
        );
    }

    #[test]
    fn dispute_then_full_refund_resolution() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "item never arrived".to_string())
            .unwrap();

        let resolved = h
            .engine
            .resolve(&actor("arbiter"), &tx.id, ResolutionDecision::Refund, None, None)
            .unwrap();
        assert_eq!(resolved.status, EscrowStatus::ResolvedRefunded);
        assert_eq!(h.ledger.balance_of(&party("payer"), &gnf()), 100_000);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 0);
    }

    #[test]
    fn partial_resolution_splits_without_fee() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "partial delivery".to_string())
            .unwrap();

        let resolved = h
            .engine
            .resolve(
                &actor("arbiter"),
                &tx.id,
                ResolutionDecision::Release,
                None,
                Some(6_000),
            )
            .unwrap();
        assert_eq!(resolved.resolution_amount, Some(6_000));
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 6_000);
        // Payer keeps 90_000 from initiate plus the 4_000 remainder.
        assert_eq!(h.ledger.balance_of(&party("payer"), &gnf()), 94_000);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 0);
    }

    // ── Conservation ───────────────────────────────────────────────────

    #[test]
    fn every_terminal_path_conserves_total_funds() {
        for terminal in ["release", "refund", "resolve_partial"] {
            let h = harness();
            let tx = initiate(&h, "O1", 9_999);
            match terminal {
                "release" => {
                    h.engine.release(&actor("payer"), &tx.id, None).unwrap();
                }
                "refund" => {
                    h.engine.refund(&actor("receiver"), &tx.id, None).unwrap();
                }
                _ => {
                    h.engine
                        .dispute(&actor("payer"), &tx.id, "split it".to_string())
                        .unwrap();
                    h.engine
                        .resolve(
                            &actor("arbiter"),
                            &tx.id,
                            ResolutionDecision::Refund,
                            None,
                            Some(3_333),
                        )
                        .unwrap();
                }
            }
            assert_eq!(h.ledger.total(&gnf()), 100_000, "path: {terminal}");
        }
    }

    // ── Guards ─────────────────────────────────────────────────────────

    #[test]
    fn initiate_requires_payer_actor() {
        let h = harness();
        let err = h
            .engine
            .initiate(&actor("receiver"), params("O1", 1_000))
            .unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "initiate", .. }));
    }

    #[test]
    fn initiate_insufficient_funds_keeps_no_record() {
        let h = harness();
        let err = h
            .engine
            .initiate(&actor("payer"), params("O1", 200_000))
            .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InsufficientFunds { required: 200_000, available: 100_000, .. }
        ));
        assert!(h.store.is_empty());
        assert!(h.emitter.kinds().is_empty());
    }

    #[test]
    fn initiate_from_unfunded_wallet_reports_attempted_amount() {
        let h = harness();
        let p = InitiateParams {
            payer_id: party("drifter"),
            ..params("O1", 5_000)
        };
        let err = h.engine.initiate(&actor("drifter"), p).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InsufficientFunds { required: 5_000, available: 0, .. }
        ));
    }

    #[test]
    fn initiate_rejects_duplicate_active_order() {
        let h = harness();
        initiate(&h, "O1", 1_000);
        let err = h
            .engine
            .initiate(&actor("payer"), params("O1", 2_000))
            .unwrap_err();
        assert!(matches!(err, EscrowError::DuplicateActiveEscrow { .. }));
        // Only the first debit stands.
        assert_eq!(h.ledger.balance_of(&party("payer"), &gnf()), 99_000);
    }

    #[test]
    fn release_forbidden_for_receiver() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h.engine.release(&actor("receiver"), &tx.id, None).unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "release", .. }));
    }

    #[test]
    fn refund_forbidden_for_payer() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h.engine.refund(&actor("payer"), &tx.id, None).unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "refund", .. }));
    }

    #[test]
    fn arbitrator_may_release_and_refund() {
        let h = harness();
        let a = initiate(&h, "O1", 1_000);
        let b = initiate(&h, "O2", 1_000);
        assert!(h.engine.release(&actor("arbiter"), &a.id, None).is_ok());
        assert!(h.engine.refund(&actor("arbiter"), &b.id, None).is_ok());
    }

    #[test]
    fn dispute_forbidden_for_stranger() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h
            .engine
            .dispute(&actor("stranger"), &tx.id, "reason".to_string())
            .unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "dispute", .. }));
    }

    #[test]
    fn arbitrator_may_open_dispute() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let disputed = h
            .engine
            .dispute(&actor("arbiter"), &tx.id, "flagged by risk review".to_string())
            .unwrap();
        assert_eq!(disputed.status, EscrowStatus::Dispute);
        let log = h.engine.history(&tx.id).unwrap();
        assert_eq!(log.last().unwrap().performed_by, actor("arbiter"));
    }

    #[test]
    fn system_actor_id_gets_no_dispute_bypass() {
        // The sweep identity is engine-internal; a client supplying it
        // as `performed_by` is just a stranger.
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h
            .engine
            .dispute(
                &actor(EscrowEngine::SYSTEM_ACTOR),
                &tx.id,
                "reason".to_string(),
            )
            .unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "dispute", .. }));
    }

    #[test]
    fn settled_escrow_still_rejects_strangers() {
        let h = harness();
        let released = initiate(&h, "O1", 1_000);
        h.engine.release(&actor("payer"), &released.id, None).unwrap();
        let refunded = initiate(&h, "O2", 1_000);
        h.engine.refund(&actor("receiver"), &refunded.id, None).unwrap();

        // Replays only read as idempotent for actors that could have
        // performed the operation; strangers still get Forbidden.
        let err = h.engine.release(&actor("stranger"), &released.id, None).unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "release", .. }));
        let err = h.engine.refund(&actor("stranger"), &refunded.id, None).unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden { operation: "refund", .. }));
    }

    #[test]
    fn dispute_requires_reason() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h
            .engine
            .dispute(&actor("payer"), &tx.id, "   ".to_string())
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidInput(_)));
    }

    #[test]
    fn resolve_requires_arbitrator() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "reason".to_string())
            .unwrap();
        for who in ["payer", "receiver", "stranger"] {
            let err = h
                .engine
                .resolve(&actor(who), &tx.id, ResolutionDecision::Release, None, None)
                .unwrap_err();
            assert!(matches!(err, EscrowError::Forbidden { operation: "resolve", .. }));
        }
    }

    #[test]
    fn resolve_rejects_out_of_range_portion() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "reason".to_string())
            .unwrap();
        for bad in [0, -5, 1_001] {
            let err = h
                .engine
                .resolve(
                    &actor("arbiter"),
                    &tx.id,
                    ResolutionDecision::Release,
                    None,
                    Some(bad),
                )
                .unwrap_err();
            assert!(matches!(err, EscrowError::InvalidInput(_)), "portion {bad}");
        }
    }

    #[test]
    fn release_on_disputed_escrow_is_invalid_state() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "reason".to_string())
            .unwrap();
        let err = h.engine.release(&actor("payer"), &tx.id, None).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InvalidState {
                current: EscrowStatus::Dispute,
                requested: EscrowStatus::Released,
            }
        ));
    }

    #[test]
    fn resolve_on_held_escrow_is_invalid_state() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let err = h
            .engine
            .resolve(&actor("arbiter"), &tx.id, ResolutionDecision::Refund, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InvalidState {
                current: EscrowStatus::Held,
                requested: EscrowStatus::ResolvedRefunded,
            }
        ));
    }

    #[test]
    fn unknown_escrow_is_not_found() {
        let h = harness();
        let id = EscrowId::new();
        assert!(matches!(
            h.engine.release(&actor("payer"), &id, None),
            Err(EscrowError::NotFound { .. })
        ));
    }

    // ── Idempotency ────────────────────────────────────────────────────

    #[test]
    fn repeated_release_moves_funds_once() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        let again = h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        assert_eq!(again.status, EscrowStatus::Released);
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 9_750);
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 250);
    }

    #[test]
    fn refund_after_release_is_invalid_state() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        let err = h.engine.refund(&actor("receiver"), &tx.id, None).unwrap_err();
        assert!(matches!(err, EscrowError::InvalidState { .. }));
    }

    #[test]
    fn repeated_dispute_is_a_no_op() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "first".to_string())
            .unwrap();
        let again = h
            .engine
            .dispute(&actor("receiver"), &tx.id, "second".to_string())
            .unwrap();
        assert_eq!(again.dispute_reason.as_deref(), Some("first"));
        assert_eq!(h.store.history(&tx.id).len(), 2);
    }

    // ── Concurrency ────────────────────────────────────────────────────

    #[test]
    fn racing_release_and_refund_settle_exactly_once() {
        for _ in 0..20 {
            let h = harness();
            let tx = initiate(&h, "O1", 10_000);
            let engine = Arc::new(h.engine);

            let e1 = Arc::clone(&engine);
            let id = tx.id;
            let releaser =
                std::thread::spawn(move || e1.release(&actor("payer"), &id, None).is_ok());
            let e2 = Arc::clone(&engine);
            let refunder =
                std::thread::spawn(move || e2.refund(&actor("receiver"), &id, None).is_ok());

            let released = releaser.join().unwrap();
            let refunded = refunder.join().unwrap();
            // The loser may observe ConcurrentModification or the
            // winner's terminal state; never both succeed with funds
            // applied twice.
            let total = h.ledger.total(&gnf());
            assert_eq!(total, 100_000);
            let final_status = h.store.get(&tx.id).unwrap().status;
            match final_status {
                EscrowStatus::Released => assert!(released),
                EscrowStatus::Refunded => assert!(refunded),
                other => panic!("unexpected final status {other}"),
            }
        }
    }

    // ── Notifications & Sweep ──────────────────────────────────────────

    #[test]
    fn emitter_failure_does_not_fail_settlement() {
        let h = harness_with_emitter(Arc::new(RecordingEmitter::failing()));
        let tx = initiate(&h, "O1", 10_000);
        let released = h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        assert_eq!(released.status, EscrowStatus::Released);
        assert_eq!(h.ledger.balance_of(&party("receiver"), &gnf()), 9_750);
        // The emitter was still invoked for both events.
        assert_eq!(h.emitter.events.lock().len(), 2);
    }

    #[test]
    fn stale_held_escrows_are_escalated() {
        let h = harness();
        let tx = initiate(&h, "O1", 1_000);
        let fresh = initiate(&h, "O2", 1_000);

        // Age the first record past the threshold.
        {
            let mut aged = h.store.get(&tx.id).unwrap();
            aged.created_at = chrono::Utc::now() - chrono::Duration::days(10);
            let store = MemoryStore::new();
            store.restore(vec![aged, h.store.get(&fresh.id).unwrap()], Vec::new());
            let engine = EscrowEngine::new(
                Arc::new(store),
                Arc::clone(&h.ledger) as Arc<dyn LedgerAdapter>,
                Arc::new(StaticArbitrators::default()),
                Arc::new(RecordingEmitter::default()),
                h.engine.config().clone(),
            );

            let escalated = engine.escalate_stale(chrono::Duration::days(7));
            assert_eq!(escalated, 1);
            let disputed = engine.get(&tx.id).unwrap();
            assert_eq!(disputed.status, EscrowStatus::Dispute);
            assert!(disputed
                .dispute_reason
                .as_deref()
                .unwrap()
                .starts_with("auto-escalated"));
            assert_eq!(engine.get(&fresh.id).unwrap().status, EscrowStatus::Held);
        }
    }

    #[test]
    fn history_records_full_lifecycle() {
        let h = harness();
        let tx = initiate(&h, "O1", 10_000);
        h.engine
            .dispute(&actor("payer"), &tx.id, "reason".to_string())
            .unwrap();
        h.engine
            .resolve(&actor("arbiter"), &tx.id, ResolutionDecision::Refund, None, None)
            .unwrap();

        let history = h.engine.history(&tx.id).unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                EscrowAction::Initiated,
                EscrowAction::DisputeOpened,
                EscrowAction::DisputeResolved,
            ]
        );
        assert_eq!(history[2].performed_by.as_str(), "arbiter");
    }

    #[test]
    fn custom_fee_overrides_default() {
        let h = harness();
        let mut p = params("O1", 10_000);
        p.fee_percent = Some(FeePercent::from_bps(1_000).unwrap());
        let tx = h.engine.initiate(&actor("payer"), p).unwrap();
        assert_eq!(tx.fee_amount, 1_000);
        h.engine.release(&actor("payer"), &tx.id, None).unwrap();
        assert_eq!(h.ledger.balance_of(&party("platform"), &gnf()), 1_000);
    }
}
