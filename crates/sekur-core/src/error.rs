//! Validation errors raised at construction time by the domain newtypes.

use thiserror::Error;

/// Error returned when a domain primitive rejects its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A party identifier was empty or contained control characters.
    #[error("invalid party id: {0:?}")]
    InvalidPartyId(String),

    /// An order reference was empty or too long.
    #[error("invalid order ref: {0:?}")]
    InvalidOrderRef(String),

    /// An actor identifier was empty.
    #[error("invalid actor id: {0:?}")]
    InvalidActorId(String),

    /// A currency code did not match `[A-Z0-9]{3,8}`.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// A monetary amount was zero or negative where a positive amount
    /// is required.
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// A fee percentage was outside `[0, 100)` or had more than two
    /// decimal places.
    #[error("invalid fee percent: {0:?}")]
    InvalidFeePercent(String),
}
