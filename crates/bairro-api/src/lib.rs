//! HTTP surface of the neighbourhood reporting service: sessions, report
//! submission and listing, votes and taxonomy lookups.

pub mod auth;
pub mod error;
pub mod feedback;
pub mod middleware;
pub mod moderation;
pub mod reports;
pub mod session;
pub mod taxonomy;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use auth::{AppState, AppStateInner, Policy};
pub use error::ApiError;
pub use moderation::ProfanityFilter;

/// All routes, with the session gate applied to the protected ones.
/// Outer layers (CORS, tracing, body limits) are left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/authenticate/login", post(auth::login))
        .route("/authenticate/register", post(auth::register))
        .route("/authenticate/logout", post(auth::logout))
        .route("/authenticate/{public_token}", get(auth::get_session))
        .route("/reports", get(reports::list_reports))
        .route("/reports/{id}", get(reports::get_report))
        .route("/taxonomy", get(taxonomy::get_taxonomy))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/reports", post(reports::submit_report))
        .route("/reports/{id}/feedback", post(feedback::vote_report))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}
