//! # sekur-engine — Escrow Settlement Engine
//!
//! The one subsystem of the platform with real invariants: funds are
//! debited from a payer, held, and eventually released, refunded, or
//! arbitrated. Everything here revolves around a single state machine
//! and a single atomic transition primitive.
//!
//! - **Error** ([`error`]): the typed error taxonomy surfaced verbatim
//!   to callers.
//!
//! - **Transaction** ([`transaction`]): the `EscrowTransaction` record,
//!   its status enumeration, and the append-only action log.
//!
//! - **Store** ([`store`]): durable record keeping behind the
//!   `transition` optimistic-concurrency guard, plus the in-memory
//!   reference implementation.
//!
//! - **Ledger** ([`ledger`]): the debit/credit seam against party
//!   balances. Pure dependency; the contract is load-bearing.
//!
//! - **Authorization** ([`authz`]): who may release, refund, dispute,
//!   and arbitrate.
//!
//! - **Notification** ([`notify`]): post-commit, fire-and-forget events
//!   to both parties. A broken notifier never rolls back money.
//!
//! - **Engine** ([`engine`]): the state machine enforcing legal
//!   transitions, fee computation, idempotency, and authorization.
//!
//! - **Resolver** ([`resolver`]): the arbitration layer that converts a
//!   disputed escrow into a final (possibly partial) settlement.

pub mod authz;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod resolver;
pub mod store;
pub mod transaction;

// Re-export primary types for ergonomic imports.

pub use error::EscrowError;

pub use transaction::{
    ActionLogEntry, EscrowAction, EscrowStatus, EscrowTransaction,
};

pub use store::{EscrowStore, MemoryStore, TransitionChange};

pub use ledger::{LedgerAdapter, LedgerError, MemoryLedger};

pub use authz::{AuthorizationProvider, StaticArbitrators};

pub use notify::{EscrowEvent, EventKind, NotificationEmitter, NotifyError, TracingEmitter};

pub use engine::{EngineConfig, EscrowEngine, InitiateParams, ResolutionDecision};

pub use resolver::DisputeResolver;
