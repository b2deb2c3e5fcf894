//! # Authentication Middleware
//!
//! Static bearer-token authentication for the service surface. The
//! engine's party-level authorization (who may release, refund,
//! dispute, arbitrate) lives in sekur-engine; this layer only gates
//! access to the HTTP API itself.
//!
//! When no token is configured, all requests are allowed (development
//! mode). Health probes and `/metrics` are mounted outside this
//! middleware and never require credentials.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use crate::error::{ErrorBody, ErrorDetail};

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token to keep credentials out of logs.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time comparison of bearer tokens.
///
/// When lengths differ, a dummy comparison keeps timing independent of
/// where the mismatch occurred.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

fn unauthorized(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Validate the `Authorization: Bearer <token>` header against the
/// configured token. Disabled (all requests pass) when no token is set.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned();

    match config {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let provided = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "));

            match provided {
                Some(token) if constant_time_token_eq(token, expected) => {
                    next.run(request).await
                }
                Some(_) => unauthorized("invalid bearer token"),
                None => unauthorized("missing Authorization: Bearer header"),
            }
        }
        // No token configured: auth disabled.
        _ => next.run(request).await,
    }
}
