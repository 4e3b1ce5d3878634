// ABOUTME: Cloud fitness REST adapter authenticating with OAuth and fetching bucketed aggregates
// ABOUTME: Issues heart rate, steps, calories and sessions requests concurrently per fetch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Cloud Fitness Provider
//!
//! `connect()` reuses a stored token when one exists. Otherwise it registers a
//! pending flow with the callback hub, hands the authorization URL to the
//! launcher and waits for the redirect to post back a code.
//!
//! `fetch_sample()` asks for the trailing 24 hours in 5 minute buckets. The
//! four requests share one access token and run concurrently; a 401 from any
//! of them triggers a single refresh and a single retry of the whole window.

/// REST request and response shapes
pub mod wire;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::core::{ConnectionHandle, RawProviderPayload, WearableProvider};
use crate::http_client::shared_client;
use crate::oauth_callback::{AuthorizationGrant, AuthorizationLauncher, OAuthCallbackHub};
use crate::reauth::with_single_reauth;
use crate::registry::ProviderCapabilities;
use crate::token_store::TokenStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use pulse_core::constants::cloud_fitness::{
    AGGREGATE_PATH, API_BASE_URL, BUCKET_DURATION_MILLIS, CALORIES_DATA_TYPE,
    HEART_RATE_DATA_TYPE, SESSIONS_PATH, STEP_COUNT_DATA_TYPE, TRAILING_WINDOW_HOURS,
};
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::{ProviderId, TokenRecord};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use wire::{AggregateRequest, AggregateResponse, CloudFitnessPayload, SessionListResponse};

const PROVIDER: ProviderId = ProviderId::CloudFitness;

/// OAuth-backed cloud fitness adapter
pub struct CloudFitnessProvider {
    tokens: Arc<TokenStore>,
    callbacks: OAuthCallbackHub,
    launcher: Arc<dyn AuthorizationLauncher>,
    api_base_url: String,
    http: Client,
    circuit_breaker: CircuitBreaker,
    connected: AtomicBool,
}

impl CloudFitnessProvider {
    /// Adapter against the public API endpoint
    #[must_use]
    pub fn new(
        tokens: Arc<TokenStore>,
        callbacks: OAuthCallbackHub,
        launcher: Arc<dyn AuthorizationLauncher>,
    ) -> Self {
        Self {
            tokens,
            callbacks,
            launcher,
            api_base_url: API_BASE_URL.to_owned(),
            http: shared_client().clone(),
            circuit_breaker: CircuitBreaker::new(PROVIDER),
            connected: AtomicBool::new(false),
        }
    }

    /// Point the adapter at a different API root
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Use a specific HTTP client
    #[must_use]
    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Replace the circuit breaker thresholds
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = CircuitBreaker::with_config(PROVIDER, config);
        self
    }

    /// Circuit breaker guarding the API
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn authorize(&self) -> ProviderResult<TokenRecord> {
        let client = self.tokens.client_config(PROVIDER)?;
        let pending = self.callbacks.begin(PROVIDER);
        let url = client.authorization_url(&pending.state())?;
        self.launcher.launch(PROVIDER, &url).await?;

        match pending.wait().await? {
            AuthorizationGrant::Code(code) => {
                self.tokens
                    .exchange_authorization_code(PROVIDER, &code)
                    .await
            }
            AuthorizationGrant::Token(token) => {
                self.tokens
                    .store_token(TokenRecord::new(PROVIDER, token, None))
                    .await
            }
        }
    }

    async fn fetch_window(
        &self,
        access_token: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ProviderResult<CloudFitnessPayload> {
        self.circuit_breaker.guard()?;
        let outcome = self.fetch_window_unguarded(&access_token, start, end).await;
        self.circuit_breaker.observe(&outcome);
        outcome
    }

    async fn fetch_window_unguarded(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ProviderResult<CloudFitnessPayload> {
        let (heart_rate, steps, calories, sessions) = tokio::try_join!(
            self.aggregate(access_token, HEART_RATE_DATA_TYPE, start, end),
            self.aggregate(access_token, STEP_COUNT_DATA_TYPE, start, end),
            self.aggregate(access_token, CALORIES_DATA_TYPE, start, end),
            self.sessions(access_token, start, end),
        )?;
        Ok(CloudFitnessPayload {
            heart_rate,
            steps,
            calories,
            sessions: sessions.session,
        })
    }

    async fn aggregate(
        &self,
        access_token: &str,
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ProviderResult<AggregateResponse> {
        let url = format!("{}/{AGGREGATE_PATH}", self.api_base_url);
        let body = AggregateRequest::new(data_type, start, end, BUCKET_DURATION_MILLIS);
        debug!(data_type, "Requesting aggregate");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER.as_str(), e.to_string()))?;
        Self::decode(response).await
    }

    async fn sessions(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ProviderResult<SessionListResponse> {
        let url = format!("{}/{SESSIONS_PATH}", self.api_base_url);
        let query = [
            ("startTime", start.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("endTime", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ];

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::network(PROVIDER.as_str(), e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                PROVIDER.as_str(),
                status.as_u16(),
                &body,
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(PROVIDER.as_str(), e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::malformed(PROVIDER.as_str(), e.to_string()))
    }
}

#[async_trait]
impl WearableProvider for CloudFitnessProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::OAUTH
            | ProviderCapabilities::HEART_RATE
            | ProviderCapabilities::ACTIVITY
            | ProviderCapabilities::SLEEP
    }

    #[instrument(skip(self), fields(provider = %PROVIDER))]
    async fn connect(&self) -> ProviderResult<ConnectionHandle> {
        if self.tokens.get_token(PROVIDER).await?.is_some() {
            debug!("Reusing stored access token");
        } else {
            info!("No stored token, starting authorization flow");
            self.authorize().await?;
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(ConnectionHandle::new(PROVIDER, None))
    }

    #[instrument(skip(self), fields(provider = %PROVIDER))]
    async fn fetch_sample(&self) -> ProviderResult<RawProviderPayload> {
        let token = self
            .tokens
            .get_token(PROVIDER)
            .await?
            .ok_or_else(|| ProviderError::AuthExpired {
                provider: PROVIDER.to_string(),
            })?;

        let end = Utc::now();
        let start = end - Duration::hours(TRAILING_WINDOW_HOURS);
        let payload = with_single_reauth(
            PROVIDER,
            token.access_token,
            |access_token| self.fetch_window(access_token, start, end),
            || async {
                self.tokens
                    .refresh(PROVIDER)
                    .await
                    .map(|record| record.access_token)
            },
        )
        .await?;

        debug!(
            heart_rate_buckets = payload.heart_rate.bucket.len(),
            step_buckets = payload.steps.bucket.len(),
            sessions = payload.sessions.len(),
            "Fetched cloud fitness window"
        );
        Ok(RawProviderPayload::CloudFitness(payload))
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
