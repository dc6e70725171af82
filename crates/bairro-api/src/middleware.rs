use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::session;

/// Resolve the caller's session (cookie first, then bearer header) and make
/// it available to handlers as `Extension<Session>`. Expired sessions are
/// rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = req.headers().clone();
    let session =
        blocking(&state, move |s| session::resolve_from_request(&s.db, &headers, true)).await?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
