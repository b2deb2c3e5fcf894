//! # Authorization Provider
//!
//! Answers one question: is this actor an arbitrator? Party-relative
//! permissions (payer may release, receiver may refund) are structural
//! and checked by the engine against the transaction record itself;
//! only the arbitrator role needs an external source of truth.

use std::collections::HashSet;

use sekur_core::ActorId;

/// Role lookup seam for the engine.
pub trait AuthorizationProvider: Send + Sync {
    /// Whether the actor holds the arbitrator role.
    fn is_arbitrator(&self, actor: &ActorId) -> bool;
}

/// Fixed arbitrator set, loaded from configuration at startup.
#[derive(Debug, Default)]
pub struct StaticArbitrators {
    arbitrators: HashSet<String>,
}

impl StaticArbitrators {
    /// Build from a list of actor identifiers.
    pub fn new(actors: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            arbitrators: actors.into_iter().map(|a| a.as_str().to_string()).collect(),
        }
    }

    /// Build from a comma-separated configuration string, skipping
    /// empty segments.
    pub fn from_csv(csv: &str) -> Self {
        Self {
            arbitrators: csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Number of configured arbitrators.
    pub fn len(&self) -> usize {
        self.arbitrators.len()
    }

    /// Whether no arbitrators are configured.
    pub fn is_empty(&self) -> bool {
        self.arbitrators.is_empty()
    }
}

impl AuthorizationProvider for StaticArbitrators {
    fn is_arbitrator(&self, actor: &ActorId) -> bool {
        self.arbitrators.contains(actor.as_str())
    }
}
