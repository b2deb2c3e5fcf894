//! # Application State
//!
//! Shared state for all request handlers: the settlement engine and
//! its in-memory stores (authoritative), plus the optional Postgres
//! pool (durability). The in-memory stores serve every read and take
//! every write first; Postgres is written through after each commit
//! and replayed into memory at startup.

use std::sync::Arc;

use sqlx::postgres::PgPool;

use sekur_core::{FeePercent, PartyId};
use sekur_engine::{
    AuthorizationProvider, DisputeResolver, EngineConfig, EscrowEngine, EscrowStore,
    LedgerAdapter, MemoryLedger, MemoryStore, NotificationEmitter, StaticArbitrators,
    TracingEmitter,
};

/// Runtime configuration, read from the environment in `main`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. `None` disables authentication.
    pub auth_token: Option<String>,
    /// Platform account credited with escrow fees.
    pub fee_account: PartyId,
    /// Fee applied when a request names none.
    pub default_fee: FeePercent,
    /// Comma-separated arbitrator actor ids.
    pub arbitrators: String,
    /// Age in days after which held escrows are auto-disputed.
    /// `None` disables the sweep.
    pub auto_escalate_days: Option<i64>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("fee_account", &self.fee_account.as_str())
            .field("default_fee", &self.default_fee.to_string())
            .field("arbitrators", &self.arbitrators)
            .field("auto_escalate_days", &self.auto_escalate_days)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            fee_account: default_fee_account(),
            default_fee: default_fee(),
            arbitrators: String::new(),
            auto_escalate_days: None,
        }
    }
}

fn default_fee_account() -> PartyId {
    PartyId::new("platform:fees").expect("literal is a valid party id")
}

/// 2.5% platform commission.
fn default_fee() -> FeePercent {
    FeePercent::from_bps(250).expect("250 bps is in range")
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `PORT` | HTTP bind port (default 8080) |
    /// | `AUTH_TOKEN` | static bearer token (unset = auth disabled) |
    /// | `FEE_ACCOUNT` | platform fee account id |
    /// | `DEFAULT_FEE_PERCENT` | e.g. `"2.5"` |
    /// | `ARBITRATORS` | comma-separated arbitrator actor ids |
    /// | `AUTO_ESCALATE_DAYS` | sweep age threshold (unset = sweep off) |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            auth_token: std::env::var("AUTH_TOKEN").ok(),
            fee_account: std::env::var("FEE_ACCOUNT")
                .ok()
                .and_then(|v| PartyId::new(v).ok())
                .unwrap_or(defaults.fee_account),
            default_fee: std::env::var("DEFAULT_FEE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_fee),
            arbitrators: std::env::var("ARBITRATORS").unwrap_or_default(),
            auto_escalate_days: std::env::var("AUTO_ESCALATE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Shared application state. Clones are cheap; everything heavy sits
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The settlement engine.
    pub engine: Arc<EscrowEngine>,
    /// Arbitration facade over the engine.
    pub resolver: DisputeResolver,
    /// Concrete store handle, for diagnostics and hydration.
    pub store: Arc<MemoryStore>,
    /// Concrete ledger handle, for wallet endpoints and hydration.
    pub ledger: Arc<MemoryLedger>,
    /// Optional Postgres pool. `None` means in-memory only.
    pub db_pool: Option<PgPool>,
    /// Runtime configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Default state: in-memory only, auth disabled, events to the
    /// structured log. What tests use.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None, Arc::new(TracingEmitter))
    }

    /// Assemble state from configuration, an optional database pool,
    /// and a notification emitter.
    pub fn with_config(
        config: AppConfig,
        db_pool: Option<PgPool>,
        emitter: Arc<dyn NotificationEmitter>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let authz = Arc::new(StaticArbitrators::from_csv(&config.arbitrators));

        let engine = Arc::new(EscrowEngine::new(
            Arc::clone(&store) as Arc<dyn EscrowStore>,
            Arc::clone(&ledger) as Arc<dyn LedgerAdapter>,
            authz as Arc<dyn AuthorizationProvider>,
            emitter,
            EngineConfig {
                fee_account: config.fee_account.clone(),
                default_fee: config.default_fee,
            },
        ));
        let resolver = DisputeResolver::new(Arc::clone(&engine));

        Self {
            engine,
            resolver,
            store,
            ledger,
            db_pool,
            config: Arc::new(config),
        }
    }

    /// Number of log entries currently recorded for an escrow.
    /// Captured before a mutation so [`AppState::persist_commit`]
    /// knows which entries are new. Zero when no database is
    /// configured (nothing to write through).
    pub fn log_mark(&self, id: &sekur_core::EscrowId) -> usize {
        if self.db_pool.is_none() {
            return 0;
        }
        self.store.history(id).len()
    }

    /// Write a committed record, its new log entries, and the touched
    /// wallet balances through to Postgres. Best-effort: failures are
    /// logged, the in-memory commit stands.
    pub async fn persist_commit(
        &self,
        tx: &sekur_engine::EscrowTransaction,
        log_from: usize,
    ) {
        let Some(pool) = &self.db_pool else {
            return;
        };

        if let Err(e) = crate::db::escrows::upsert(pool, tx).await {
            tracing::error!(escrow_id = %tx.id, error = %e, "escrow write-through failed");
        }

        for entry in self.store.history(&tx.id).iter().skip(log_from) {
            if let Err(e) = crate::db::action_log::insert(pool, entry).await {
                tracing::error!(escrow_id = %tx.id, error = %e, "log write-through failed");
            }
        }

        let fee_account = &self.engine.config().fee_account;
        for party in [&tx.payer_id, &tx.receiver_id, fee_account] {
            let balance = self.ledger.balance_of(party, &tx.currency);
            if let Err(e) =
                crate::db::wallets::upsert_balance(pool, party, &tx.currency, balance).await
            {
                tracing::error!(party = party.as_str(), error = %e, "wallet write-through failed");
            }
        }
    }

    /// Replay persisted escrows, action log, and wallet balances into
    /// the in-memory stores. Called once at startup when a database is
    /// configured.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let records = crate::db::escrows::load_all(pool).await?;
        let entries = crate::db::action_log::load_all(pool).await?;
        let balances = crate::db::wallets::load_all(pool).await?;

        let n_records = records.len();
        let n_entries = entries.len();
        self.store.restore(records, entries);
        for (party, currency, balance) in &balances {
            self.ledger.credit(party, currency, *balance);
        }

        tracing::info!(
            escrows = n_records,
            log_entries = n_entries,
            wallets = balances.len(),
            "hydrated in-memory state from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
