use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use tracing::error;

use bairro_db::Database;
use bairro_types::api::{LoginRequest, RegisterRequest};
use bairro_types::models::Session;

use crate::error::ApiError;
use crate::moderation::ProfanityFilter;
use crate::session::{self, PRIVATE_TOKEN_NAME, PUBLIC_TOKEN_NAME};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub policy: Policy,
    pub profanity: ProfanityFilter,
}

/// Tunables for sessions, submission throttling and cookies.
#[derive(Debug, Clone)]
pub struct Policy {
    pub session_ttl: chrono::Duration,
    /// A user may create at most `rate_limit_max` reports per window.
    pub rate_limit_window: chrono::Duration,
    pub rate_limit_max: i64,
    pub cookie_secure: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            session_ttl: chrono::Duration::days(30),
            rate_limit_window: chrono::Duration::minutes(10),
            rate_limit_max: 1,
            cookie_secure: false,
        }
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
}

/// POST /authenticate/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let session = blocking(&state, move |s| {
        session::login(&s.db, &s.policy, &req.username, &req.password)
    })
    .await?;

    let jar = set_session_cookies(jar, &session, state.policy.cookie_secure);
    Ok((jar, Json(session)))
}

/// POST /authenticate/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let session = blocking(&state, move |s| {
        session::register(
            &s.db,
            &s.policy,
            &req.username,
            &req.password,
            &req.confirm_password,
        )
    })
    .await?;

    let jar = set_session_cookies(jar, &session, state.policy.cookie_secure);
    Ok((jar, Json(session)))
}

/// POST /authenticate/logout
///
/// Outside the session gate so an expired session can still end. The
/// cookies are cleared whatever the outcome.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let result = blocking(&state, move |s| {
        let session = session::resolve_from_request(&s.db, &headers, false)?;
        session::logout(&s.db, &session)
    })
    .await;

    let jar = clear_session_cookies(jar);
    match result {
        Ok(()) => (jar, StatusCode::NO_CONTENT).into_response(),
        Err(err) => (jar, err).into_response(),
    }
}

/// GET /authenticate/{public_token}, polled by clients to check login state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(public_token): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session =
        blocking(&state, move |s| session::get_by_public_token(&s.db, &public_token)).await?;
    Ok(Json(session))
}

fn set_session_cookies(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let max_age = time::Duration::seconds((session.expires_at - Utc::now()).num_seconds().max(0));
    let expires = time::OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp()).ok();

    let private = Cookie::build((
        PRIVATE_TOKEN_NAME,
        session.private_token.clone().unwrap_or_default(),
    ))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Strict)
    .secure(secure)
    .max_age(max_age)
    .expires(expires);

    let public = Cookie::build((PUBLIC_TOKEN_NAME, session.public_token.clone()))
        .path("/")
        .http_only(false)
        .secure(secure)
        .max_age(max_age)
        .expires(expires);

    jar.add(private).add(public)
}

fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(PRIVATE_TOKEN_NAME).path("/"))
        .remove(Cookie::build(PUBLIC_TOKEN_NAME).path("/"))
}
