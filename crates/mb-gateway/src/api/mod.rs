pub mod auth;
pub mod bots;
pub mod platform_url;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes split into **public** bot-lifecycle endpoints (gated behind the
/// per-user bearer token) and **internal** bot callbacks (gated behind the
/// shared internal secret). There is no unauthenticated route in this
/// service — unlike a dashboard gateway, nothing here is safe to expose
/// without a credential.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/bots", post(bots::request_bot))
        .route("/bots/status", get(bots::list_running_bots))
        .route("/bots/:platform/:native_meeting_id", delete(bots::stop_bot))
        .route("/bots/:platform/:native_meeting_id/config", put(bots::update_bot_config))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_token));

    let internal = Router::new()
        .route("/bots/internal/callback/joining", post(bots::callback_joining))
        .route(
            "/bots/internal/callback/awaiting_admission",
            post(bots::callback_awaiting_admission),
        )
        .route("/bots/internal/callback/started", post(bots::callback_started))
        .route("/bots/internal/callback/exited", post(bots::callback_exited))
        .route_layer(middleware::from_fn_with_state(state, auth::require_internal_secret));

    public.merge(internal).layer(tower_http::trace::TraceLayer::new_for_http())
}
