//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the escrow
//! subsystem. Each identifier is a distinct type — you cannot pass a
//! [`PartyId`] where an [`ActorId`] is expected.
//!
//! ## Validation
//!
//! String-based identifiers ([`PartyId`], [`OrderRef`], [`ActorId`],
//! [`CurrencyCode`]) validate at construction time. The UUID-based
//! [`EscrowId`] is always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Helper macro to implement `Deserialize` for string newtypes that must
/// validate their contents. Deserializes as a plain `String`, then routes
/// through the type's `new()` constructor so that invalid values are
/// rejected at deserialization time — not silently accepted.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

/// A unique identifier for an escrow transaction.
///
/// Generated at `initiate` time and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(Uuid);

impl EscrowId {
    /// Create a new random escrow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an escrow identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EscrowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EscrowId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EscrowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow:{}", self.0)
    }
}

impl std::str::FromStr for EscrowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("escrow:").unwrap_or(s);
        Uuid::from_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// String-based identifiers (validated at construction)
// ---------------------------------------------------------------------------

/// Identifier of a party holding a wallet balance (payer, receiver, or
/// the platform fee account).
///
/// Opaque to the engine — the surrounding platform decides what a party
/// id looks like. Must be non-empty, at most 128 bytes, and free of
/// control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PartyId(String);

impl PartyId {
    /// Maximum accepted length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Create a party identifier, validating its format.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if !is_valid_opaque_id(&raw, Self::MAX_LEN) {
            return Err(ValidationError::InvalidPartyId(raw));
        }
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(PartyId);

impl std::fmt::Display for PartyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the commercial transaction an escrow protects (order,
/// ride, or delivery id). At most one active escrow exists per order ref.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderRef(String);

impl OrderRef {
    /// Maximum accepted length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Create an order reference, validating its format.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if !is_valid_opaque_id(&raw, Self::MAX_LEN) {
            return Err(ValidationError::InvalidOrderRef(raw));
        }
        Ok(Self(raw))
    }

    /// The reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(OrderRef);

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The actor performing an operation: a party, an admin/arbitrator, or a
/// system actor such as the auto-escalation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActorId(String);

impl ActorId {
    /// Maximum accepted length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Create an actor identifier, validating its format.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if !is_valid_opaque_id(&raw, Self::MAX_LEN) {
            return Err(ValidationError::InvalidActorId(raw));
        }
        Ok(Self(raw))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this actor is the given party.
    pub fn is_party(&self, party: &PartyId) -> bool {
        self.0 == party.as_str()
    }
}

impl_validating_deserialize!(ActorId);

impl From<PartyId> for ActorId {
    fn from(party: PartyId) -> Self {
        Self(party.0)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO-4217-like currency code, e.g. `GNF`, `USD`, `XOF`.
///
/// Uppercase ASCII letters or digits, 3 to 8 characters. The engine
/// treats the code as opaque beyond equality — no FX conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a currency code, validating its format.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let ok = (3..=8).contains(&raw.len())
            && raw
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !ok {
            return Err(ValidationError::InvalidCurrency(raw));
        }
        Ok(Self(raw))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl_validating_deserialize!(CurrencyCode);

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared validation for opaque string identifiers: non-empty after
/// trimming, bounded length, no control characters.
fn is_valid_opaque_id(s: &str, max_len: usize) -> bool {
    !s.trim().is_empty() && s.len() <= max_len && !s.chars().any(|c| c.is_control())
}
