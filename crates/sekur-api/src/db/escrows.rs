//! Escrow transaction persistence.
//!
//! All functions take a `&PgPool` and operate on the
//! `escrow_transactions` table. Status transitions are enforced at the
//! application layer (the store's guarded `transition`), not in SQL;
//! the table only ever sees already-committed records, so writes are
//! plain upserts.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use sekur_core::{CurrencyCode, EscrowId, FeePercent, MinorAmount, OrderRef, PartyId};
use sekur_engine::{EscrowStatus, EscrowTransaction};

/// Insert or update an escrow record. Called after every in-memory
/// commit, so insert-vs-update is decided by the database.
pub async fn upsert(pool: &PgPool, record: &EscrowTransaction) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO escrow_transactions
           (id, order_ref, payer_id, receiver_id, amount, currency,
            fee_percent_bps, fee_amount, net_amount, status,
            dispute_reason, resolution_note, resolution_amount,
            created_at, updated_at, resolved_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status,
           dispute_reason = EXCLUDED.dispute_reason,
           resolution_note = EXCLUDED.resolution_note,
           resolution_amount = EXCLUDED.resolution_amount,
           updated_at = EXCLUDED.updated_at,
           resolved_at = EXCLUDED.resolved_at",
    )
    .bind(record.id.as_uuid())
    .bind(record.order_ref.as_str())
    .bind(record.payer_id.as_str())
    .bind(record.receiver_id.as_str())
    .bind(record.amount.get())
    .bind(record.currency.as_str())
    .bind(record.fee_percent.as_bps() as i32)
    .bind(record.fee_amount)
    .bind(record.net_amount)
    .bind(record.status.as_str())
    .bind(&record.dispute_reason)
    .bind(&record.resolution_note)
    .bind(record.resolution_amount)
    .bind(record.created_at)
    .bind(record.updated_at)
    .bind(record.resolved_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all escrow records into the in-memory store on startup.
/// Rows that fail domain validation are skipped with a warning rather
/// than aborting the boot.
pub async fn load_all(pool: &PgPool) -> Result<Vec<EscrowTransaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EscrowRow>(
        "SELECT id, order_ref, payer_id, receiver_id, amount, currency,
                fee_percent_bps, fee_amount, net_amount, status,
                dispute_reason, resolution_note, resolution_amount,
                created_at, updated_at, resolved_at
         FROM escrow_transactions ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id;
        match row.into_record() {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "skipping invalid escrow row");
            }
        }
    }
    Ok(records)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct EscrowRow {
    id: Uuid,
    order_ref: String,
    payer_id: String,
    receiver_id: String,
    amount: i64,
    currency: String,
    fee_percent_bps: i32,
    fee_amount: i64,
    net_amount: i64,
    status: String,
    dispute_reason: Option<String>,
    resolution_note: Option<String>,
    resolution_amount: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl EscrowRow {
    fn into_record(self) -> Result<EscrowTransaction, String> {
        let status: EscrowStatus = self.status.parse()?;
        let fee_percent = FeePercent::from_bps(
            u32::try_from(self.fee_percent_bps).map_err(|e| e.to_string())?,
        )
        .map_err(|e| e.to_string())?;

        Ok(EscrowTransaction {
            id: EscrowId::from_uuid(self.id),
            order_ref: OrderRef::new(self.order_ref).map_err(|e| e.to_string())?,
            payer_id: PartyId::new(self.payer_id).map_err(|e| e.to_string())?,
            receiver_id: PartyId::new(self.receiver_id).map_err(|e| e.to_string())?,
            amount: MinorAmount::new(self.amount).map_err(|e| e.to_string())?,
            currency: CurrencyCode::new(self.currency).map_err(|e| e.to_string())?,
            fee_percent,
            fee_amount: self.fee_amount,
            net_amount: self.net_amount,
            status,
            dispute_reason: self.dispute_reason,
            resolution_note: self.resolution_note,
            resolution_amount: self.resolution_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
            resolved_at: self.resolved_at,
        })
    }
}
