//! Shared helpers for the HTTP-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bairro_api::{AppState, AppStateInner, Policy, ProfanityFilter, router};
use bairro_db::Database;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn test_app() -> TestApp {
    test_app_with(Policy::default())
}

pub fn test_app_with(policy: Policy) -> TestApp {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory db"),
        policy,
        profanity: ProfanityFilter::default(),
    });
    TestApp {
        router: router(state.clone()),
        state,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn error_name(&self) -> &str {
        self.body["name"].as_str().unwrap_or_default()
    }

    pub fn error_fields(&self) -> Vec<String> {
        self.body["fields"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// JSON POST, authenticated with a bearer token when one is given.
    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Registers `username` and returns the private token.
    pub async fn register(&self, username: &str) -> String {
        let res = self
            .post(
                "/authenticate/register",
                json!({
                    "username": username,
                    "password": "segredo123",
                    "confirm_password": "segredo123",
                }),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "register failed: {}", res.body);
        res.body["private_token"].as_str().unwrap().to_string()
    }

    pub async fn submit(&self, token: &str, body: &str, city: &str, district: &str) -> TestResponse {
        self.post(
            "/reports",
            json!({
                "body": body,
                "medias": [],
                "city": city,
                "district": district,
                "category": "ROADS",
            }),
            Some(token),
        )
        .await
    }
}

pub fn unlimited() -> Policy {
    Policy {
        rate_limit_max: 100,
        ..Policy::default()
    }
}
