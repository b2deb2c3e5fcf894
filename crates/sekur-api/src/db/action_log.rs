//! Action log persistence.
//!
//! Append-only: entries are only ever inserted, never updated or
//! deleted. The table is the durable audit trail behind the in-memory
//! log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use sekur_core::{ActorId, EscrowId};
use sekur_engine::{ActionLogEntry, EscrowAction};

/// Append one log entry.
pub async fn insert(pool: &PgPool, entry: &ActionLogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO escrow_action_log
           (escrow_id, action, performed_by, note, metadata, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(entry.escrow_id.as_uuid())
    .bind(entry.action.as_str())
    .bind(entry.performed_by.as_str())
    .bind(&entry.note)
    .bind(&entry.metadata)
    .bind(entry.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the full log, oldest first, for startup hydration. Invalid
/// rows are skipped with a warning.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ActionLogEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ActionLogRow>(
        "SELECT escrow_id, action, performed_by, note, metadata, created_at
         FROM escrow_action_log ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let escrow_id = row.escrow_id;
        match row.into_entry() {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(escrow_id = %escrow_id, error = %e, "skipping invalid log row");
            }
        }
    }
    Ok(entries)
}

#[derive(sqlx::FromRow)]
struct ActionLogRow {
    escrow_id: Uuid,
    action: String,
    performed_by: String,
    note: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ActionLogRow {
    fn into_entry(self) -> Result<ActionLogEntry, String> {
        let action: EscrowAction = self.action.parse()?;
        Ok(ActionLogEntry {
            escrow_id: EscrowId::from_uuid(self.escrow_id),
            action,
            performed_by: ActorId::new(self.performed_by).map_err(|e| e.to_string())?,
            note: self.note,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}
