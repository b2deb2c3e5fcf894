//! # Wallet API
//!
//! The single funding surface: balances are queried and topped up
//! here; escrow operations move funds between wallets internally.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sekur_core::{CurrencyCode, MinorAmount, PartyId};
use sekur_engine::LedgerAdapter;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to credit a wallet.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DepositRequest {
    /// Currency to credit.
    pub currency: String,
    /// Amount in minor units.
    pub amount: i64,
}

impl Validate for DepositRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err(format!("amount must be positive, got {}", self.amount));
        }
        Ok(())
    }
}

/// A wallet balance.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub party_id: String,
    pub currency: String,
    pub balance: i64,
}

/// Build the wallet router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/wallets/:party/:currency", get(get_balance))
        .route("/v1/wallets/:party/deposit", post(deposit))
}

/// GET /v1/wallets/{party}/{currency} — Current balance. Unknown
/// wallets read as zero.
#[utoipa::path(
    get,
    path = "/v1/wallets/{party}/{currency}",
    params(
        ("party" = String, Path, description = "Party id"),
        ("currency" = String, Path, description = "Currency code"),
    ),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 422, description = "Invalid party or currency", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
async fn get_balance(
    State(state): State<AppState>,
    Path((party, currency)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, AppError> {
    let party = PartyId::new(party)?;
    let currency = CurrencyCode::new(currency)?;
    let balance = state.ledger.balance_of(&party, &currency);
    Ok(Json(BalanceResponse {
        party_id: party.as_str().to_string(),
        currency: currency.as_str().to_string(),
        balance,
    }))
}

/// POST /v1/wallets/{party}/deposit — Credit a wallet, creating it if
/// needed.
#[utoipa::path(
    post,
    path = "/v1/wallets/{party}/deposit",
    params(("party" = String, Path, description = "Party id")),
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Wallet credited", body = BalanceResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
async fn deposit(
    State(state): State<AppState>,
    Path(party): Path<String>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<BalanceResponse>, AppError> {
    let party = PartyId::new(party)?;
    let req = extract_validated_json(body)?;
    let currency = CurrencyCode::new(req.currency)?;
    // MinorAmount re-checks positivity at the domain boundary.
    let amount = MinorAmount::new(req.amount)?;

    state.ledger.credit(&party, &currency, amount.get());
    let balance = state.ledger.balance_of(&party, &currency);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::wallets::upsert_balance(pool, &party, &currency, balance).await
        {
            tracing::error!(party = party.as_str(), error = %e, "wallet write-through failed");
        }
    }

    tracing::info!(
        party = party.as_str(),
        currency = currency.as_str(),
        amount = amount.get(),
        "wallet deposit"
    );
    Ok(Json(BalanceResponse {
        party_id: party.as_str().to_string(),
        currency: currency.as_str().to_string(),
        balance,
    }))
}
