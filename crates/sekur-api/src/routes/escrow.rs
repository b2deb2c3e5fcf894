//! # Escrow Lifecycle API
//!
//! Endpoints for opening an escrow and walking it through its
//! lifecycle: release, refund, dispute, and arbitrated resolution,
//! plus the read queries (by id, by order, by party, audit history).
//!
//! Every request names the acting party or arbitrator in an
//! `actor_id` field; the engine decides whether that actor may perform
//! the operation on that escrow. The bearer-token middleware only
//! gates access to the API surface itself.
//!
//! Mutating handlers write the committed record through to Postgres
//! when a pool is configured. Persistence failures are logged and do
//! not fail the request — the in-memory store is authoritative.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sekur_core::{ActorId, CurrencyCode, EscrowId, FeePercent, MinorAmount, OrderRef, PartyId};
use sekur_engine::{ActionLogEntry, EscrowTransaction, InitiateParams, ResolutionDecision};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Requests ───────────────────────────────────────────────────────────

/// Request to open an escrow.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateEscrowRequest {
    /// The commercial order this escrow protects.
    pub order_ref: String,
    /// Party whose wallet funds the hold. Must match `actor_id`.
    pub payer_id: String,
    /// Party paid on release.
    pub receiver_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Currency code, e.g. "GNF".
    pub currency: String,
    /// Fee percentage as a decimal string, e.g. "2.5". Defaults to the
    /// platform fee when absent.
    pub fee_percent: Option<String>,
    /// The acting party.
    pub actor_id: String,
}

impl Validate for CreateEscrowRequest {
    fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err(format!("amount must be positive, got {}", self.amount));
        }
        if self.payer_id == self.receiver_id {
            return Err("payer_id and receiver_id must differ".into());
        }
        Ok(())
    }
}

/// Request to release or refund a held escrow.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettleRequest {
    /// The acting party or arbitrator.
    pub actor_id: String,
    /// Optional note recorded in the audit trail.
    pub note: Option<String>,
}

impl Validate for SettleRequest {
    fn validate(&self) -> Result<(), String> {
        if self.actor_id.trim().is_empty() {
            return Err("actor_id must be non-empty".into());
        }
        Ok(())
    }
}

/// Request to freeze an escrow pending arbitration.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DisputeRequest {
    /// The acting party.
    pub actor_id: String,
    /// Why the escrow is contested.
    pub reason: String,
}

impl Validate for DisputeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.actor_id.trim().is_empty() {
            return Err("actor_id must be non-empty".into());
        }
        if self.reason.trim().is_empty() {
            return Err("reason must be non-empty".into());
        }
        Ok(())
    }
}

/// Request to apply an arbitration decision.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResolveRequest {
    /// The arbitrator.
    pub actor_id: String,
    /// `"release"` (receiver's favor) or `"refund"` (payer's favor).
    pub decision: String,
    /// Optional arbitration note.
    pub note: Option<String>,
    /// Partial settlement amount in minor units. When present the
    /// favored party receives this and the counterparty the remainder,
    /// with no fee taken.
    pub resolution_amount: Option<i64>,
}

impl Validate for ResolveRequest {
    fn validate(&self) -> Result<(), String> {
        if self.actor_id.trim().is_empty() {
            return Err("actor_id must be non-empty".into());
        }
        if !matches!(self.decision.as_str(), "release" | "refund") {
            return Err(format!(
                "decision must be \"release\" or \"refund\", got {:?}",
                self.decision
            ));
        }
        if let Some(amount) = self.resolution_amount {
            if amount <= 0 {
                return Err(format!("resolution_amount must be positive, got {amount}"));
            }
        }
        Ok(())
    }
}

/// Query parameters for the party dashboard listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    /// Party to list escrows for (payer or receiver side).
    pub party: String,
    /// Optional status filter, e.g. "held" or "dispute".
    pub status: Option<String>,
}

// ── Responses ──────────────────────────────────────────────────────────

/// An escrow transaction as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowResponse {
    pub id: String,
    pub order_ref: String,
    pub payer_id: String,
    pub receiver_id: String,
    pub amount: i64,
    pub currency: String,
    pub fee_percent: String,
    pub fee_amount: i64,
    pub net_amount: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<EscrowTransaction> for EscrowResponse {
    fn from(tx: EscrowTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            order_ref: tx.order_ref.as_str().to_string(),
            payer_id: tx.payer_id.as_str().to_string(),
            receiver_id: tx.receiver_id.as_str().to_string(),
            amount: tx.amount.get(),
            currency: tx.currency.as_str().to_string(),
            fee_percent: tx.fee_percent.to_string(),
            fee_amount: tx.fee_amount,
            net_amount: tx.net_amount,
            status: tx.status.as_str().to_string(),
            dispute_reason: tx.dispute_reason,
            resolution_note: tx.resolution_note,
            resolution_amount: tx.resolution_amount,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
            resolved_at: tx.resolved_at,
        }
    }
}

/// One audit-trail entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionLogResponse {
    pub action: String,
    pub performed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ActionLogEntry> for ActionLogResponse {
    fn from(entry: ActionLogEntry) -> Self {
        Self {
            action: entry.action.as_str().to_string(),
            performed_by: entry.performed_by.as_str().to_string(),
            note: entry.note,
            metadata: entry.metadata,
            created_at: entry.created_at,
        }
    }
}

// ── Router ─────────────────────────────────────────────────────────────

/// Build the escrow lifecycle router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escrows", post(create_escrow).get(list_escrows))
        .route("/v1/escrows/:id", get(get_escrow))
        .route("/v1/escrows/:id/history", get(get_history))
        .route("/v1/escrows/by-order/:order_ref", get(get_by_order))
        .route("/v1/escrows/:id/release", post(release_escrow))
        .route("/v1/escrows/:id/refund", post(refund_escrow))
        .route("/v1/escrows/:id/dispute", post(dispute_escrow))
        .route("/v1/escrows/:id/resolve", post(resolve_escrow))
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Parse an escrow id path parameter. Accepts both the prefixed form
/// (`escrow:<uuid>`) and a bare UUID.
fn parse_escrow_id(raw: &str) -> Result<EscrowId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid escrow id: {raw:?}")))
}

// ── Handlers ───────────────────────────────────────────────────────────

/// POST /v1/escrows — Open an escrow: debit the payer and hold funds.
#[utoipa::path(
    post,
    path = "/v1/escrows",
    request_body = CreateEscrowRequest,
    responses(
        (status = 201, description = "Escrow created and funds held", body = EscrowResponse),
        (status = 409, description = "Duplicate active order or insufficient funds", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn create_escrow(
    State(state): State<AppState>,
    body: Result<Json<CreateEscrowRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    let req = extract_validated_json(body)?;

    let actor = ActorId::new(req.actor_id)?;
    let fee_percent = match req.fee_percent {
        Some(raw) => Some(
            raw.parse::<FeePercent>()
                .map_err(|e| AppError::Validation(e.to_string()))?,
        ),
        None => None,
    };
    let params = InitiateParams {
        order_ref: OrderRef::new(req.order_ref)?,
        payer_id: PartyId::new(req.payer_id)?,
        receiver_id: PartyId::new(req.receiver_id)?,
        amount: MinorAmount::new(req.amount)?,
        currency: CurrencyCode::new(req.currency)?,
        fee_percent,
    };

    let tx = state.engine.initiate(&actor, params)?;
    state.persist_commit(&tx, 0).await;

    Ok((StatusCode::CREATED, Json(tx.into())))
}

/// GET /v1/escrows/{id} — Fetch one escrow.
#[utoipa::path(
    get,
    path = "/v1/escrows/{id}",
    params(("id" = String, Path, description = "Escrow id (escrow:<uuid> or bare UUID)")),
    responses(
        (status = 200, description = "Escrow found", body = EscrowResponse),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn get_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let tx = state.engine.get(&escrow_id)?;
    Ok(Json(tx.into()))
}

/// GET /v1/escrows/{id}/history — Audit trail, oldest first.
#[utoipa::path(
    get,
    path = "/v1/escrows/{id}/history",
    params(("id" = String, Path, description = "Escrow id")),
    responses(
        (status = 200, description = "Action log", body = [ActionLogResponse]),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ActionLogResponse>>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let entries = state.engine.history(&escrow_id)?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// GET /v1/escrows/by-order/{order_ref} — The active escrow protecting
/// an order, if any.
#[utoipa::path(
    get,
    path = "/v1/escrows/by-order/{order_ref}",
    params(("order_ref" = String, Path, description = "Order reference")),
    responses(
        (status = 200, description = "Active escrow", body = EscrowResponse),
        (status = 404, description = "No active escrow for this order", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn get_by_order(
    State(state): State<AppState>,
    Path(order_ref): Path<String>,
) -> Result<Json<EscrowResponse>, AppError> {
    let order_ref = OrderRef::new(order_ref)?;
    let tx = state
        .engine
        .get_active_by_order(&order_ref)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no active escrow for order {}",
                order_ref.as_str()
            ))
        })?;
    Ok(Json(tx.into()))
}

/// GET /v1/escrows?party=...&status=... — Party dashboard: all escrows
/// where the party is payer or receiver, newest first.
#[utoipa::path(
    get,
    path = "/v1/escrows",
    params(
        ("party" = String, Query, description = "Party id to list for"),
        ("status" = Option<String>, Query, description = "Optional status filter"),
    ),
    responses(
        (status = 200, description = "Escrows involving the party", body = [EscrowResponse]),
        (status = 422, description = "Invalid query", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn list_escrows(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EscrowResponse>>, AppError> {
    let party = PartyId::new(query.party)?;
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<sekur_engine::EscrowStatus>()
                .map_err(AppError::Validation)?,
        ),
        None => None,
    };

    let escrows = state
        .engine
        .list_by_party(&party)
        .into_iter()
        .filter(|tx| status.map_or(true, |s| tx.status == s))
        .map(Into::into)
        .collect();
    Ok(Json(escrows))
}

/// POST /v1/escrows/{id}/release — Pay the receiver net of the fee.
#[utoipa::path(
    post,
    path = "/v1/escrows/{id}/release",
    params(("id" = String, Path, description = "Escrow id")),
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Escrow released", body = EscrowResponse),
        (status = 403, description = "Actor may not release", body = crate::error::ErrorBody),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
        (status = 409, description = "Escrow not in a releasable state", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn release_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let req = extract_validated_json(body)?;
    let actor = ActorId::new(req.actor_id)?;

    let mark = state.log_mark(&escrow_id);
    let tx = state.engine.release(&actor, &escrow_id, req.note)?;
    state.persist_commit(&tx, mark).await;

    Ok(Json(tx.into()))
}

/// POST /v1/escrows/{id}/refund — Return the full amount to the payer.
#[utoipa::path(
    post,
    path = "/v1/escrows/{id}/refund",
    params(("id" = String, Path, description = "Escrow id")),
    request_body = SettleRequest,
    responses(
        (status = 200, description = "Escrow refunded", body = EscrowResponse),
        (status = 403, description = "Actor may not refund", body = crate::error::ErrorBody),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
        (status = 409, description = "Escrow not in a refundable state", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn refund_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SettleRequest>, JsonRejection>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let req = extract_validated_json(body)?;
    let actor = ActorId::new(req.actor_id)?;

    let mark = state.log_mark(&escrow_id);
    let tx = state.engine.refund(&actor, &escrow_id, req.note)?;
    state.persist_commit(&tx, mark).await;

    Ok(Json(tx.into()))
}

/// POST /v1/escrows/{id}/dispute — Freeze a held escrow.
#[utoipa::path(
    post,
    path = "/v1/escrows/{id}/dispute",
    params(("id" = String, Path, description = "Escrow id")),
    request_body = DisputeRequest,
    responses(
        (status = 200, description = "Escrow frozen pending arbitration", body = EscrowResponse),
        (status = 403, description = "Actor is not a party to this escrow", body = crate::error::ErrorBody),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
        (status = 409, description = "Escrow not in a disputable state", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn dispute_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<DisputeRequest>, JsonRejection>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let req = extract_validated_json(body)?;
    let actor = ActorId::new(req.actor_id)?;

    let mark = state.log_mark(&escrow_id);
    let tx = state.engine.dispute(&actor, &escrow_id, req.reason)?;
    state.persist_commit(&tx, mark).await;

    Ok(Json(tx.into()))
}

/// POST /v1/escrows/{id}/resolve — Apply an arbitration decision.
#[utoipa::path(
    post,
    path = "/v1/escrows/{id}/resolve",
    params(("id" = String, Path, description = "Escrow id")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = EscrowResponse),
        (status = 403, description = "Actor is not an arbitrator", body = crate::error::ErrorBody),
        (status = 404, description = "No such escrow", body = crate::error::ErrorBody),
        (status = 409, description = "Escrow is not in dispute", body = crate::error::ErrorBody),
    ),
    tag = "escrow"
)]
async fn resolve_escrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<EscrowResponse>, AppError> {
    let escrow_id = parse_escrow_id(&id)?;
    let req = extract_validated_json(body)?;
    let actor = ActorId::new(req.actor_id)?;
    let decision = match req.decision.as_str() {
        "release" => ResolutionDecision::Release,
        _ => ResolutionDecision::Refund,
    };

    let mark = state.log_mark(&escrow_id);
    let tx = state
        .engine
        .resolve(&actor, &escrow_id, decision, req.note, req.resolution_amount)?;
    state.persist_commit(&tx, mark).await;

    Ok(Json(tx.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_non_positive_amount() {
        let req = CreateEscrowRequest {
            order_ref: "O1".into(),
            payer_id: "a".into(),
            receiver_id: "b".into(),
            amount: 0,
            currency: "GNF".into(),
            fee_percent: None,
            actor_id: "a".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn create_request_rejects_same_parties() {
        let req = CreateEscrowRequest {
            order_ref: "O1".into(),
            payer_id: "a".into(),
            receiver_id: "a".into(),
            amount: 100,
            currency: "GNF".into(),
            fee_percent: None,
            actor_id: "a".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn resolve_request_rejects_unknown_decision() {
        let req = ResolveRequest {
            actor_id: "arb".into(),
            decision: "split".into(),
            note: None,
            resolution_amount: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn resolve_request_rejects_non_positive_amount() {
        let req = ResolveRequest {
            actor_id: "arb".into(),
            decision: "release".into(),
            note: None,
            resolution_amount: Some(0),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn parse_escrow_id_accepts_both_forms() {
        let id = EscrowId::new();
        assert_eq!(parse_escrow_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_escrow_id(&id.as_uuid().to_string()).unwrap(), id);
        assert!(parse_escrow_id("not-an-id").is_err());
    }
}
