//! # Auto-Escalation Sweep
//!
//! Background task that periodically moves `held` escrows older than a
//! configured age into `dispute` under the system actor, through the
//! ordinary dispute operation. Protects payers from counterparties who
//! simply never confirm or contest.
//!
//! Disabled unless `AUTO_ESCALATE_DAYS` is configured.

use std::time::Duration;

use tokio::task::JoinHandle;

use sekur_engine::{EscrowError, EscrowStore};

use crate::state::AppState;

/// How often the sweep wakes up.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the sweep task. Returns `None` when auto-escalation is not
/// configured.
pub fn spawn(state: AppState) -> Option<JoinHandle<()>> {
    let days = state.config.auto_escalate_days?;
    tracing::info!(days, "auto-escalation sweep enabled");
    Some(tokio::spawn(run(state, days)))
}

async fn run(state: AppState, days: i64) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        sweep_once(&state, days).await;
    }
}

/// One sweep pass. An escrow that moves underneath the sweep is
/// skipped, not failed.
pub async fn sweep_once(state: &AppState, days: i64) -> usize {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(days);
    let stale = state.store.list_held_older_than(cutoff);
    if stale.is_empty() {
        return 0;
    }

    let mut escalated = 0;
    for tx in stale {
        let mark = state.log_mark(&tx.id);
        match state.engine.escalate(
            &tx.id,
            format!("auto-escalated: held longer than {days} days"),
        ) {
            Ok(updated) => {
                state.persist_commit(&updated, mark).await;
                escalated += 1;
            }
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
