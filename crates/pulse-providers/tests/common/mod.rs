// ABOUTME: Shared mock OAuth token endpoint and cloud fitness API for provider tests
// ABOUTME: Runs an axum server on an ephemeral port and counts the calls it receives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use pulse_core::models::ProviderId;
use pulse_providers::OAuthClientConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Knobs and counters for the mock server
#[derive(Debug)]
pub struct MockState {
    /// Access token the API accepts
    pub valid_access_token: Mutex<String>,
    /// Access token handed out on refresh
    pub refreshed_access_token: Mutex<String>,
    /// Refresh token issued on code exchange
    pub issued_refresh_token: Option<String>,
    /// Status every API call fails with, when set
    pub api_failure: Mutex<Option<u16>>,
    /// Token endpoint refresh calls
    pub refresh_calls: AtomicU32,
    /// Token endpoint code exchanges
    pub exchange_calls: AtomicU32,
    /// API calls of any kind
    pub api_calls: AtomicU32,
}

impl MockState {
    /// State accepting `valid` and refreshing to `refreshed`
    pub fn new(valid: &str, refreshed: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_access_token: Mutex::new(valid.to_owned()),
            refreshed_access_token: Mutex::new(refreshed.to_owned()),
            issued_refresh_token: Some("refresh-1".to_owned()),
            api_failure: Mutex::new(None),
            refresh_calls: AtomicU32::new(0),
            exchange_calls: AtomicU32::new(0),
            api_calls: AtomicU32::new(0),
        })
    }

    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> u32 {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn api_hits(&self) -> u32 {
        self.api_calls.load(Ordering::SeqCst)
    }
}

/// Start the mock and return its base URL
pub async fn spawn_mock(state: Arc<MockState>) -> String {
    let app = Router::new()
        .route("/token", post(token_endpoint))
        .fallback(api_endpoint)
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// OAuth client pointed at the mock
pub fn oauth_client(base: &str) -> OAuthClientConfig {
    OAuthClientConfig {
        provider: ProviderId::CloudFitness,
        client_id: "test-client".to_owned(),
        client_secret: "test-secret".to_owned(),
        redirect_uri: "http://localhost:3000/oauth/callback".to_owned(),
        auth_url: format!("{base}/auth"),
        token_url: format!("{base}/token"),
        scopes: vec!["fitness.activity.read".to_owned()],
    }
}

async fn token_endpoint(
    State(state): State<Arc<MockState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if params.get("client_id").map(String::as_str) != Some("test-client") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response();
    }
    match params.get("grant_type").map(String::as_str) {
        Some("authorization_code") => {
            state.exchange_calls.fetch_add(1, Ordering::SeqCst);
            match params.get("code").map(String::as_str) {
                Some("good-code") => {
                    let access = state.valid_access_token.lock().unwrap().clone();
                    Json(json!({
                        "access_token": access,
                        "refresh_token": state.issued_refresh_token,
                        "expires_in": 3600,
                        "token_type": "Bearer"
                    }))
                    .into_response()
                }
                Some("garbage-code") => (StatusCode::OK, "not json").into_response(),
                _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                    .into_response(),
            }
        }
        Some("refresh_token") => {
            state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if params.get("refresh_token").map(String::as_str) != Some("refresh-1") {
                return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})))
                    .into_response();
            }
            let access = state.refreshed_access_token.lock().unwrap().clone();
            Json(json!({"access_token": access, "expires_in": 3600})).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn api_endpoint(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = *state.api_failure.lock().unwrap() {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    let expected = format!("Bearer {}", state.valid_access_token.lock().unwrap());
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if uri.path().ends_with("/sessions") {
        return Json(json!({
            "session": [{
                "id": "run-1",
                "name": "Morning run",
                "activityType": 8,
                "startTimeMillis": "1700000000000",
                "endTimeMillis": "1700001800000"
            }]
        }))
        .into_response();
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let data_type = request["aggregateBy"][0]["dataTypeName"]
        .as_str()
        .unwrap_or_default()
        .to_owned();
    let value = match data_type.as_str() {
        "com.google.heart_rate.bpm" => json!({"fpVal": 72.0}),
        "com.google.step_count.delta" => json!({"intVal": 500}),
        _ => json!({"fpVal": 200.0}),
    };
    Json(json!({
        "bucket": [{
            "startTimeMillis": "1700000000000",
            "endTimeMillis": "1700000300000",
            "dataset": [{
                "point": [{
                    "startTimeNanos": "1700000000000000000",
                    "endTimeNanos": "1700000300000000000",
                    "dataTypeName": data_type,
                    "value": [value]
                }]
            }]
        }]
    }))
    .into_response()
}
