//! Wallet balance persistence.
//!
//! One row per `(party, currency)` holding the current balance in
//! minor units. The in-memory ledger is authoritative; after every
//! settlement the balances of the parties it touched are snapshotted
//! here.

use sqlx::PgPool;

use sekur_core::{CurrencyCode, PartyId};

/// Write a party's current balance.
pub async fn upsert_balance(
    pool: &PgPool,
    party: &PartyId,
    currency: &CurrencyCode,
    balance: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallets (party_id, currency, balance, updated_at)
         VALUES ($1, $2, $3, now())
         ON CONFLICT (party_id, currency) DO UPDATE SET
           balance = EXCLUDED.balance,
           updated_at = EXCLUDED.updated_at",
    )
    .bind(party.as_str())
    .bind(currency.as_str())
    .bind(balance)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all wallet balances for startup hydration. Invalid rows are
/// skipped with a warning.
pub async fn load_all(pool: &PgPool) -> Result<Vec<(PartyId, CurrencyCode, i64)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WalletRow>(
        "SELECT party_id, currency, balance FROM wallets",
    )
    .fetch_all(pool)
    .await?;

    let mut balances = Vec::with_capacity(rows.len());
    for row in rows {
        match (PartyId::new(&row.party_id), CurrencyCode::new(&row.currency)) {
            (Ok(party), Ok(currency)) => balances.push((party, currency, row.balance)),
            _ => {
                tracing::warn!(
                    party = row.party_id,
                    currency = row.currency,
                    "skipping invalid wallet row"
                );
            }
        }
    }
    Ok(balances)
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    party_id: String,
    currency: String,
    balance: i64,
}
