//! HTTP authentication middleware.
//!
//! Two independent checks guard two disjoint route groups:
//! - [`require_api_token`] resolves the caller's bearer token against
//!   `config.auth.users` and attaches an [`AuthedUser`] extension. Used on
//!   every public `/bots` route.
//! - [`require_internal_secret`] compares an `X-Internal-Secret` header
//!   against a single shared secret read once at startup. Used on the
//!   `/bots/internal/callback/*` routes the bot process calls back into.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::{AppState, AuthedUser};

fn unauthorized(message: &str) -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        axum::Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Resolves `Authorization: Bearer <token>` against `state.api_users`.
/// A token that matches no configured user is rejected with 401; if no
/// users are configured at all, every request is rejected (there is no
/// "dev mode" bypass for the public API, unlike the internal secret).
pub async fn require_api_token(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    match state.api_users.get(provided) {
        Some(user) => {
            req.extensions_mut().insert(AuthedUser {
                user_id: user.user_id,
                max_concurrent_bots: user.max_concurrent_bots,
                token: provided.to_owned(),
            });
            next.run(req).await
        }
        None => unauthorized("invalid or missing API token"),
    }
}

/// Compares `X-Internal-Secret` against the hash computed at startup from
/// `config.auth.internal_secret_env`. `None` hash means the env var was
/// unset at startup (dev mode): the check is skipped entirely.
pub async fn require_internal_secret(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.internal_secret_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("x-internal-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return unauthorized("invalid or missing internal secret");
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_response_has_expected_status() {
        let resp = unauthorized("nope");
        assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
