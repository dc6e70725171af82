//! Session store: login, registration, logout and session lookups.

use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{error, info};

use bairro_crypto::{DEFAULT_TOKEN_BYTES, hash_secret, random_token};
use bairro_db::Database;
use bairro_db::models::{NewSession, SessionRow, UserRow};
use bairro_types::error::FieldError;
use bairro_types::models::{RecordStatus, Session, UserSummary};

use crate::auth::Policy;
use crate::error::ApiError;

/// Cookie carrying the private (credential) token. HttpOnly.
pub const PRIVATE_TOKEN_NAME: &str = "token";
/// Cookie carrying the public token, readable by client scripts.
pub const PUBLIC_TOKEN_NAME: &str = "token_key";

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

pub fn login(db: &Database, policy: &Policy, username: &str, password: &str) -> Result<Session, ApiError> {
    let mut missing = Vec::new();
    if username.trim().is_empty() {
        missing.push(FieldError::new("username", "Username is required"));
    }
    if password.is_empty() {
        missing.push(FieldError::new("password", "Password is required"));
    }
    if !missing.is_empty() {
        return Err(ApiError::validation("Invalid payload", missing));
    }

    let user = db.get_user_by_username(username.trim())?.ok_or_else(|| {
        ApiError::not_found("User not found").with_field("username", "User not found")
    })?;

    if RecordStatus::from_code(&user.status) != Some(RecordStatus::Active) {
        return Err(ApiError::not_allowed("User is inactive").with_field("username", "User is inactive"));
    }

    if user.password != hash_secret(password)? {
        return Err(ApiError::not_allowed("Invalid password").with_field("password", "Invalid password"));
    }

    open_session(db, policy, &user)
}

pub fn register(
    db: &Database,
    policy: &Policy,
    username: &str,
    password: &str,
    confirm_password: &str,
) -> Result<Session, ApiError> {
    let username = username.trim();
    let mut fields = Vec::new();

    let name_len = username.chars().count();
    if username.is_empty() {
        fields.push(FieldError::new("username", "Username is required"));
    } else if !(USERNAME_MIN..=USERNAME_MAX).contains(&name_len) {
        fields.push(FieldError::new(
            "username",
            format!("Username must have between {USERNAME_MIN} and {USERNAME_MAX} characters"),
        ));
    } else if db.get_user_by_username(username)?.is_some() {
        fields.push(FieldError::new("username", "Username already taken"));
    }

    if password.is_empty() {
        fields.push(FieldError::new("password", "Password is required"));
    } else if password.chars().count() < PASSWORD_MIN {
        fields.push(FieldError::new(
            "password",
            format!("Password must have at least {PASSWORD_MIN} characters"),
        ));
    }

    if confirm_password.is_empty() {
        fields.push(FieldError::new("confirm_password", "Password confirmation is required"));
    } else if confirm_password != password {
        fields.push(FieldError::new("confirm_password", "Passwords do not match"));
    }

    if !fields.is_empty() {
        return Err(ApiError::validation("Invalid payload", fields));
    }

    let digest = hash_secret(password)?;
    let user = match db.create_user(username, &digest, false) {
        Ok(user) => user,
        Err(e) => {
            // Lost a race against a concurrent registration of the same name.
            if db.get_user_by_username(username)?.is_some() {
                return Err(ApiError::validation(
                    "Invalid payload",
                    vec![FieldError::new("username", "Username already taken")],
                ));
            }
            return Err(e.into());
        }
    };

    info!("User {} registered (id {})", user.username, user.id);
    open_session(db, policy, &user)
}

fn open_session(db: &Database, policy: &Policy, user: &UserRow) -> Result<Session, ApiError> {
    let now = Utc::now();
    let Some(expires_at) = now.checked_add_signed(policy.session_ttl) else {
        error!("Session TTL {} overflows the clock", policy.session_ttl);
        return Err(ApiError::internal());
    };
    let public_token = random_token(DEFAULT_TOKEN_BYTES)?;
    let private_token = random_token(DEFAULT_TOKEN_BYTES)?;

    let row = db.create_session(&NewSession {
        user_id: user.id,
        public_token: &public_token,
        private_token: &private_token,
        created_at: now,
        expires_at,
    })?;

    info!("User {} logged in (session {})", user.username, row.id);
    Ok(session_view(&row, Some(user), true))
}

/// Idempotent: logging out an inactive session changes nothing.
pub fn logout(db: &Database, session: &Session) -> Result<(), ApiError> {
    if db.deactivate_session(session.id, Utc::now())? {
        info!("Session {} logged out", session.id);
    }
    Ok(())
}

/// Live session behind a public token. The private token is left out.
pub fn get_by_public_token(db: &Database, public_token: &str) -> Result<Session, ApiError> {
    let row = db
        .get_live_session_by_public_token(public_token, Utc::now())?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    let user = load_owner(db, &row)?;
    Ok(session_view(&row, user.as_ref(), false))
}

/// Private token from the `token` cookie, falling back to a bearer header.
pub fn extract_private_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = CookieJar::from_headers(headers)
        .get(PRIVATE_TOKEN_NAME)
        .map(|c| c.value().trim().to_string())
        .filter(|t| !t.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// Gate for protected endpoints.
pub fn resolve_from_request(
    db: &Database,
    headers: &HeaderMap,
    validate_expiry: bool,
) -> Result<Session, ApiError> {
    let token =
        extract_private_token(headers).ok_or_else(|| ApiError::unauthorized("Token not found"))?;

    let row = db
        .get_session_by_private_token(&token)?
        .ok_or_else(|| ApiError::unauthorized("Session not found"))?;

    if RecordStatus::from_code(&row.status) != Some(RecordStatus::Active) {
        return Err(ApiError::unauthorized("Session is inactive"));
    }
    if validate_expiry && row.expires_at < Utc::now() {
        return Err(ApiError::unauthorized("Session expired"));
    }

    let user = load_owner(db, &row)?;
    Ok(session_view(&row, user.as_ref(), true))
}

fn load_owner(db: &Database, row: &SessionRow) -> Result<Option<UserRow>, ApiError> {
    match row.user_id {
        Some(id) => Ok(db.get_user_by_id(id)?),
        None => Ok(None),
    }
}

fn session_view(row: &SessionRow, user: Option<&UserRow>, with_private: bool) -> Session {
    Session {
        id: row.id,
        user: user.map(|u| UserSummary {
            id: u.id,
            username: u.username.clone(),
            admin: u.admin,
        }),
        public_token: row.public_token.clone(),
        private_token: with_private.then(|| row.private_token.clone()),
        expires_at: row.expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use bairro_types::error::ErrorKind;
    use chrono::Duration;

    fn setup() -> (Database, Policy) {
        let db = Database::open_in_memory().unwrap();
        let policy = Policy::default();
        register(&db, &policy, "ana", "segredo123", "segredo123").unwrap();
        (db, policy)
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{PRIVATE_TOKEN_NAME}={token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn login_issues_fresh_token_pair() {
        let (db, policy) = setup();
        let a = login(&db, &policy, "ana", "segredo123").unwrap();
        let b = login(&db, &policy, "ana", "segredo123").unwrap();

        assert_eq!(a.public_token.len(), 64);
        assert_eq!(a.private_token.as_ref().map(String::len), Some(64));
        assert_ne!(a.public_token, b.public_token);
        assert_ne!(a.private_token, b.private_token);
        assert_eq!(a.user.as_ref().unwrap().username, "ana");
        assert!(a.expires_at > Utc::now() + Duration::days(29));
    }

    #[test]
    fn unrepresentable_expiry_is_an_internal_error() {
        let (db, _) = setup();
        let policy = Policy {
            session_ttl: chrono::TimeDelta::MAX,
            ..Policy::default()
        };

        let err = login(&db, &policy, "ana", "segredo123").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalServerError);
    }

    #[test]
    fn wrong_password_is_not_allowed() {
        let (db, policy) = setup();
        let err = login(&db, &policy, "ana", "errada").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAllowed);
        assert_eq!(err.fields[0].field, "password");
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (db, policy) = setup();
        let err = login(&db, &policy, "bruno", "segredo123").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.fields[0].field, "username");
    }

    #[test]
    fn inactive_user_is_not_allowed() {
        let (db, policy) = setup();
        let user = db.get_user_by_username("ana").unwrap().unwrap();
        db.set_user_status(user.id, "I").unwrap();

        let err = login(&db, &policy, "ana", "segredo123").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAllowed);
        assert_eq!(err.fields[0].field, "username");
    }

    #[test]
    fn missing_credentials_are_reported_together() {
        let (db, policy) = setup();
        let err = login(&db, &policy, "", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
        assert_eq!(err.fields.len(), 2);
    }

    #[test]
    fn register_collects_every_field_problem() {
        let (db, policy) = setup();
        let err = register(&db, &policy, "ana", "curta", "outra").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
        let fields: Vec<&str> = err.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["username", "password", "confirm_password"]);
    }

    #[test]
    fn public_lookup_hides_private_token() {
        let (db, policy) = setup();
        let session = login(&db, &policy, "ana", "segredo123").unwrap();

        let found = get_by_public_token(&db, &session.public_token).unwrap();
        assert_eq!(found.id, session.id);
        assert!(found.private_token.is_none());

        logout(&db, &found).unwrap();
        logout(&db, &found).unwrap();
        let err = get_by_public_token(&db, &session.public_token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = cookie_headers("from-cookie");
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_private_token(&headers).as_deref(), Some("from-cookie"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_private_token(&headers).as_deref(), Some("from-header"));

        assert!(extract_private_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn resolve_rejects_missing_unknown_and_inactive() {
        let (db, policy) = setup();

        let err = resolve_from_request(&db, &HeaderMap::new(), true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        let err = resolve_from_request(&db, &cookie_headers("nope"), true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        let session = login(&db, &policy, "ana", "segredo123").unwrap();
        let headers = cookie_headers(session.private_token.as_deref().unwrap());
        let resolved = resolve_from_request(&db, &headers, true).unwrap();
        assert_eq!(resolved.user.unwrap().username, "ana");

        logout(&db, &session).unwrap();
        let err = resolve_from_request(&db, &headers, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, "Session is inactive");
    }

    #[test]
    fn expiry_check_is_optional() {
        let (db, _) = setup();
        let user = db.get_user_by_username("ana").unwrap().unwrap();
        let past = Utc::now() - Duration::days(40);
        db.create_session(&NewSession {
            user_id: user.id,
            public_token: "old-public",
            private_token: "old-private",
            created_at: past,
            expires_at: past + Duration::days(30),
        })
        .unwrap();

        let headers = cookie_headers("old-private");
        let err = resolve_from_request(&db, &headers, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(err.message, "Session expired");

        let session = resolve_from_request(&db, &headers, false).unwrap();
        assert_eq!(session.user.unwrap().id, user.id);
    }
}
