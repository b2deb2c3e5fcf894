//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec.
//! Serves at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
///
/// Registers all utoipa-documented routes, schemas, tags, and security
/// definitions. Serves as the single source of truth for integrators.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sekur API — Escrow Settlement Engine",
        version = "0.3.2",
        description = "Escrow-held payment settlement over an internal ledger.\n\nProvides:\n- **Escrow lifecycle** — fund, release, refund, dispute, and arbitrated resolution\n- **Audit trail** — append-only action log per escrow\n- **Wallets** — ledger balance queries and deposits\n\nAuthentication: Bearer token via `Authorization: Bearer <token>` header.\nAll `/v1/*` endpoints require authentication. Health probes (`/health/*`) and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Escrow lifecycle ─────────────────────────────────────────────
        crate::routes::escrow::create_escrow,
        crate::routes::escrow::get_escrow,
        crate::routes::escrow::get_history,
        crate::routes::escrow::get_by_order,
        crate::routes::escrow::list_escrows,
        crate::routes::escrow::release_escrow,
        crate::routes::escrow::refund_escrow,
        crate::routes::escrow::dispute_escrow,
        crate::routes::escrow::resolve_escrow,
        // ── Wallets ──────────────────────────────────────────────────────
        crate::routes::wallets::get_balance,
        crate::routes::wallets::deposit,
    ),
    components(
        schemas(
            // ── Error types ─────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Escrow DTOs ─────────────────────────────────────────────
            crate::routes::escrow::CreateEscrowRequest,
            crate::routes::escrow::SettleRequest,
            crate::routes::escrow::DisputeRequest,
            crate::routes::escrow::ResolveRequest,
            crate::routes::escrow::ListQuery,
            crate::routes::escrow::EscrowResponse,
            crate::routes::escrow::ActionLogResponse,
            // ── Wallet DTOs ─────────────────────────────────────────────
            crate::routes::wallets::DepositRequest,
            crate::routes::wallets::BalanceResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "escrow", description = "Escrow lifecycle — initiation, release, refund, dispute, arbitrated resolution, and audit history"),
        (name = "wallets", description = "Ledger wallets — balance queries and deposits"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
///
/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Sekur API — Escrow Settlement Engine");
        assert_eq!(spec.info.version, "0.3.2");
    }

    #[test]
    fn test_openapi_spec_includes_escrow_paths() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/v1/escrows"));
        assert!(spec.paths.paths.contains_key("/v1/escrows/{id}/resolve"));
        assert!(spec.paths.paths.contains_key("/v1/wallets/{party}/deposit"));
    }
}
