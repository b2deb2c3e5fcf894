//! # Escrow Store
//!
//! Authoritative storage for escrow records and the action log, behind
//! the [`EscrowStore`] seam.
//!
//! The one load-bearing operation is [`EscrowStore::transition`]: a
//! guarded compare-and-set on the status column. The caller names the
//! status it read; if the stored status has moved in the meantime the
//! write is refused. Every status change in the system goes through it,
//! together with the matching action-log append, under one lock.
//!
//! [`MemoryStore`] is the in-process implementation. Deployments with a
//! database rehydrate it at startup via [`MemoryStore::restore`] and
//! write through after each commit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use sekur_core::{EscrowId, OrderRef, PartyId};

use crate::error::EscrowError;
use crate::transaction::{ActionLogEntry, EscrowStatus, EscrowTransaction};

// ── Transition ─────────────────────────────────────────────────────────

/// The fields a status transition is allowed to write. Everything else
/// on the record is immutable after insert.
#[derive(Debug, Clone, Default)]
pub struct TransitionChange {
    /// Set when entering `dispute`.
    pub dispute_reason: Option<String>,
    /// Set when leaving `dispute`.
    pub resolution_note: Option<String>,
    /// Set when an arbitrated decision is partial.
    pub resolution_amount: Option<i64>,
}

// ── Trait ──────────────────────────────────────────────────────────────

/// Storage seam for escrow records and their audit trail.
pub trait EscrowStore: Send + Sync {
    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotFound`] if no record exists.
    fn get(&self, id: &EscrowId) -> Result<EscrowTransaction, EscrowError>;

    /// The non-terminal escrow for an order ref, if any. There is at
    /// most one by the insert invariant.
    fn active_by_order_ref(&self, order_ref: &OrderRef) -> Option<EscrowTransaction>;

    /// All escrows where the party is payer or receiver, newest first.
    fn list_by_party(&self, party: &PartyId) -> Vec<EscrowTransaction>;

    /// Escrows in `held` created at or before the cutoff. Feed for the
    /// auto-escalation sweep.
    fn list_held_older_than(&self, cutoff: DateTime<Utc>) -> Vec<EscrowTransaction>;

    /// Insert a new record with its first log entry.
    ///
    /// # Errors
    ///
    /// [`EscrowError::DuplicateActiveEscrow`] if a non-terminal escrow
    /// already exists for the same order ref. The check and the insert
    /// are atomic.
    fn insert(&self, tx: EscrowTransaction, log: ActionLogEntry) -> Result<(), EscrowError>;

    /// Guarded status transition with optimistic concurrency.
    ///
    /// Moves the record from `expected` to `to`, applies `change`, and
    /// appends `log`, all atomically. Stamps `updated_at`, and
    /// `resolved_at` when `to` is terminal.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::NotFound`] if no record exists.
    /// - [`EscrowError::InvalidState`] if `expected → to` is not an
    ///   edge of the status graph.
    /// - [`EscrowError::ConcurrentModification`] if the stored status
    ///   is no longer `expected`.
    fn transition(
        &self,
        id: &EscrowId,
        expected: EscrowStatus,
        to: EscrowStatus,
        change: TransitionChange,
        log: ActionLogEntry,
    ) -> Result<EscrowTransaction, EscrowError>;

    /// The action log for an escrow, oldest first.
    fn history(&self, id: &EscrowId) -> Vec<ActionLogEntry>;
}

// ── In-Memory Implementation ───────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
    escrows: HashMap<EscrowId, EscrowTransaction>,
    /// Order ref → escrow id, for non-terminal escrows only.
    active_by_order: HashMap<String, EscrowId>,
    log: Vec<ActionLogEntry>,
}

/// In-process store. A single mutex over all three maps keeps insert
/// and transition atomic with their index updates and log appends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from persisted records and log entries at startup.
    /// Rebuilds the active-order index from non-terminal records.
    pub fn restore(
        &self,
        records: Vec<EscrowTransaction>,
        entries: Vec<ActionLogEntry>,
    ) {
        let mut inner = self.inner.lock();
        for tx in records {
            if !tx.status.is_terminal() {
                inner
                    .active_by_order
                    .insert(tx.order_ref.as_str().to_string(), tx.id);
            }
            inner.escrows.insert(tx.id, tx);
        }
        inner.log.extend(entries);
        inner.log.sort_by_key(|e| e.created_at);
    }

    /// Count of escrows per status, for the metrics gauge.
    pub fn status_counts(&self) -> HashMap<EscrowStatus, usize> {
        let inner = self.inner.lock();
        let mut counts = HashMap::new();
        for tx in inner.escrows.values() {
            *counts.entry(tx.status).or_insert(0) += 1;
        }
        counts
    }

    /// Sum of amounts currently held in escrow, in minor units.
    /// Counts `held` and `dispute` records — funds the engine still owes
    /// someone.
    pub fn held_minor_total(&self) -> i64 {
        let inner = self.inner.lock();
        inner
            .escrows
            .values()
            .filter(|tx| {
                matches!(tx.status, EscrowStatus::Held | EscrowStatus::Dispute)
            })
            .map(|tx| tx.amount.get())
            .sum()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.inner.lock().escrows.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().escrows.is_empty()
    }
}

impl EscrowStore for MemoryStore {
    fn get(&self, id: &EscrowId) -> Result<EscrowTransaction, EscrowError> {
        self.inner
            .lock()
            .escrows
            .get(id)
            .cloned()
            .ok_or(EscrowError::NotFound { escrow_id: *id })
    }

    fn active_by_order_ref(&self, order_ref: &OrderRef) -> Option<EscrowTransaction> {
        let inner = self.inner.lock();
        let id = inner.active_by_order.get(order_ref.as_str())?;
        inner.escrows.get(id).cloned()
    }

    fn list_by_party(&self, party: &PartyId) -> Vec<EscrowTransaction> {
        let inner = self.inner.lock();
        let mut result: Vec<_> = inner
            .escrows
            .values()
            .filter(|tx| &tx.payer_id == party || &tx.receiver_id == party)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    fn list_held_older_than(&self, cutoff: DateTime<Utc>) -> Vec<EscrowTransaction> {
        let inner = self.inner.lock();
        inner
            .escrows
            .values()
            .filter(|tx| tx.status == EscrowStatus::Held && tx.created_at <= cutoff)
            .cloned()
            .collect()
    }

    fn insert(&self, tx: EscrowTransaction, log: ActionLogEntry) -> Result<(), EscrowError> {
        let mut inner = self.inner.lock();
        if inner.active_by_order.contains_key(tx.order_ref.as_str()) {
            return Err(EscrowError::DuplicateActiveEscrow {
                order_ref: tx.order_ref.clone(),
            });
        }
        inner
            .active_by_order
            .insert(tx.order_ref.as_str().to_string(), tx.id);
        inner.escrows.insert(tx.id, tx);
        inner.log.push(log);
        Ok(())
    }

    fn transition(
        &self,
        id: &EscrowId,
        expected: EscrowStatus,
        to: EscrowStatus,
        change: TransitionChange,
        log: ActionLogEntry,
    ) -> Result<EscrowTransaction, EscrowError> {
        if !expected.valid_transitions().contains(&to) {
            return Err(EscrowError::InvalidState {
                current: expected,
                requested: to,
            });
        }

        let mut inner = self.inner.lock();
        let current = inner
            .escrows
            .get(id)
            .map(|tx| tx.status)
            .ok_or(EscrowError::NotFound { escrow_id: *id })?;
        if current != expected {
            return Err(EscrowError::ConcurrentModification { escrow_id: *id });
        }

        let now = Utc::now();
        let order_key = {
            // Borrow checker: mutate the record first, index after.
            let tx = inner
                .escrows
                .get_mut(id)
                .ok_or(EscrowError::NotFound { escrow_id: *id })?;
            tx.status = to;
            tx.updated_at = now;
            if let Some(reason) = change.dispute_reason {
                tx.dispute_reason = Some(reason);
            }
            if let Some(note) = change.resolution_note {
                tx.resolution_note = Some(note);
            }
            if let Some(amount) = change.resolution_amount {
                tx.resolution_amount = Some(amount);
            }
            if to.is_terminal() {
                tx.resolved_at = Some(now);
            }
            tx.order_ref.as_str().to_string()
        };

        if to.is_terminal() {
            inner.active_by_order.remove(&order_key);
        }
        inner.log.push(log);

        // Re-read for the return value; the record is present by the
        // get_mut above.
        inner
            .escrows
            .get(id)
            .cloned()
            .ok_or(EscrowError::NotFound { escrow_id: *id })
    }

    fn history(&self, id: &EscrowId) -> Vec<ActionLogEntry> {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|e| &e.escrow_id == id)
            .cloned()
            .collect()
    }
}
