//! API route modules.

pub mod escrow;
pub mod wallets;
