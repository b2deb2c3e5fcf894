//! # Database Persistence Layer
//!
//! Optional Postgres durability via SQLx. When `DATABASE_URL` is set,
//! every committed escrow mutation is written through to the
//! `escrow_transactions`, `escrow_action_log`, and `wallets` tables;
//! on startup the tables are replayed into the in-memory stores. When
//! the variable is absent, the API runs in-memory only (development
//! and testing).
//!
//! The in-memory stores stay authoritative: writes are applied there
//! first and persistence failures are logged, never surfaced to the
//! request that triggered them.

pub mod action_log;
pub mod escrows;
pub mod wallets;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration
/// fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
