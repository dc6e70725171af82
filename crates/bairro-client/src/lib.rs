//! Typed HTTP client for the Bairro API.
//!
//! Holds the private session token after `login`/`register` and sends it as a
//! bearer header on protected calls. Requests are bounded by a timeout and are
//! never retried.

pub mod error;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use bairro_types::api::{
    FeedbackRequest, FeedbackResponse, LoginRequest, RegisterRequest, ReportFilters,
    SubmitReportRequest,
};
use bairro_types::error::ErrorBody;
use bairro_types::models::{Page, Report, ReportView, Session, Taxonomy, VoteDirection};

pub use error::ClientError;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// `BAIRRO_API_URL` and `BAIRRO_API_TIMEOUT_MS`; unparsable values fall
    /// back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("BAIRRO_API_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_ms = lookup("BAIRRO_API_TIMEOUT_MS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

pub struct BairroClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl BairroClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Private token of the current session, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Reuse a private token obtained elsewhere.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    // -- Auth --

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session, ClientError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let session: Session = decode(
            self.http
                .post(self.url("/authenticate/login"))
                .json(&req)
                .send()
                .await?,
        )
        .await?;
        self.token = session.private_token.clone();
        Ok(session)
    }

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Session, ClientError> {
        let req = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
        };
        let session: Session = decode(
            self.http
                .post(self.url("/authenticate/register"))
                .json(&req)
                .send()
                .await?,
        )
        .await?;
        self.token = session.private_token.clone();
        Ok(session)
    }

    /// Ends the server-side session and forgets the local token.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let resp = self
            .authed(self.http.post(self.url("/authenticate/logout")))
            .send()
            .await?;
        expect_success(resp).await?;
        self.token = None;
        Ok(())
    }

    /// Poll a session by its public token.
    pub async fn load_session(&self, public_token: &str) -> Result<Session, ClientError> {
        let url = self.url(&format!("/authenticate/{public_token}"));
        decode(self.http.get(url).send().await?).await
    }

    // -- Reports --

    pub async fn list_reports(&self, filters: &ReportFilters) -> Result<Page<ReportView>, ClientError> {
        decode(self.http.get(self.url("/reports")).query(filters).send().await?).await
    }

    pub async fn get_report(&self, id: i64) -> Result<ReportView, ClientError> {
        decode(self.http.get(self.url(&format!("/reports/{id}"))).send().await?).await
    }

    pub async fn submit_report(&self, report: &SubmitReportRequest) -> Result<Report, ClientError> {
        let req = self.authed(self.http.post(self.url("/reports"))).json(report);
        decode(req.send().await?).await
    }

    /// Returns the report's vote total after the vote.
    pub async fn vote(&self, report_id: i64, direction: VoteDirection) -> Result<i64, ClientError> {
        let body = FeedbackRequest {
            vote: direction.as_str().to_string(),
        };
        let req = self
            .authed(self.http.post(self.url(&format!("/reports/{report_id}/feedback"))))
            .json(&body);
        let resp: FeedbackResponse = decode(req.send().await?).await?;
        Ok(resp.votes)
    }

    pub async fn taxonomy(&self) -> Result<Taxonomy, ClientError> {
        decode(self.http.get(self.url("/taxonomy")).send().await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let resp = expect_success(resp).await?;
    Ok(resp.json().await?)
}

async fn expect_success(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let bytes = resp.bytes().await?;
    debug!("API call failed with {}", status);
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(ClientError::Api {
            status: status.as_u16(),
            body,
        }),
        Err(_) => Err(ClientError::Decode {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ClientConfig {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        ClientConfig::from_lookup(|k| map.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn config_defaults() {
        assert_eq!(config(&[]), ClientConfig::default());
        assert_eq!(ClientConfig::default().timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_overrides() {
        let cfg = config(&[
            ("BAIRRO_API_URL", "https://bairro.example/api/"),
            ("BAIRRO_API_TIMEOUT_MS", "2500"),
        ]);
        assert_eq!(cfg.base_url, "https://bairro.example/api");
        assert_eq!(cfg.timeout, Duration::from_millis(2500));

        let cfg = config(&[("BAIRRO_API_TIMEOUT_MS", "soon")]);
        assert_eq!(cfg.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }
}
