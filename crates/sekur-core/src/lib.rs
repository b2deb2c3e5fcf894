//! # sekur-core — Escrow Domain Primitives
//!
//! Domain-primitive newtypes and money arithmetic shared by the escrow
//! engine and its HTTP surface:
//!
//! - **Identity** ([`ident`]): distinct identifier types for escrows,
//!   parties, orders, actors, and currencies. You cannot pass a
//!   [`PartyId`] where an [`OrderRef`] is expected.
//!
//! - **Money** ([`money`]): amounts in minor currency units (`i64`),
//!   fee percentages as basis points, and the round-half-to-even fee
//!   split that guarantees `fee + net == amount` exactly.
//!
//! All monetary arithmetic is integer-only. Floating point never touches
//! an amount.

pub mod error;
pub mod ident;
pub mod money;

pub use error::ValidationError;
pub use ident::{ActorId, CurrencyCode, EscrowId, OrderRef, PartyId};
pub use money::{FeePercent, FeeSplit, MinorAmount};
