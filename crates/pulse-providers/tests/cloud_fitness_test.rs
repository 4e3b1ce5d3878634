// ABOUTME: Cloud fitness adapter tests against a mock REST API and token endpoint
// ABOUTME: Covers authorization via callback, token reuse, and the single refresh-and-retry rule
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs, clippy::unwrap_used, clippy::panic)]

mod common;

use async_trait::async_trait;
use common::{oauth_client, spawn_mock, MockState};
use pulse_core::models::{ProviderId, TokenRecord};
use pulse_providers::{
    AuthorizationLauncher, CallbackDisposition, CallbackEnvelope, CircuitBreakerConfig,
    CloudFitnessProvider, InMemoryTokenStorage, OAuthCallbackHub, OAuthCallbackMessage,
    ProviderError, ProviderResult, RawProviderPayload, TokenStorage, TokenStore,
    WearableProvider,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const APP_ORIGIN: &str = "http://localhost:3000";

/// Launcher that completes the flow by posting a callback straight to the hub
struct CallbackLauncher {
    hub: OAuthCallbackHub,
    message: Option<OAuthCallbackMessage>,
    launches: AtomicU32,
}

#[async_trait]
impl AuthorizationLauncher for CallbackLauncher {
    async fn launch(&self, _provider: ProviderId, url: &str) -> ProviderResult<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let state = Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        assert!(state.starts_with("cloud_fitness:"));
        if let Some(message) = &self.message {
            let message = message.clone().with_state(state);
            let envelope = CallbackEnvelope {
                origin: APP_ORIGIN.to_owned(),
                data: serde_json::to_value(&message).unwrap(),
            };
            assert_eq!(self.hub.deliver(&envelope), CallbackDisposition::Delivered);
        }
        Ok(())
    }
}

struct Harness {
    provider: CloudFitnessProvider,
    storage: Arc<InMemoryTokenStorage>,
    launcher: Arc<CallbackLauncher>,
    state: Arc<MockState>,
}

async fn harness(
    state: Arc<MockState>,
    callback: Option<OAuthCallbackMessage>,
    callback_timeout: Duration,
) -> Harness {
    let base = spawn_mock(Arc::clone(&state)).await;
    let storage = Arc::new(InMemoryTokenStorage::new());
    let tokens = Arc::new(
        TokenStore::new(Arc::clone(&storage) as Arc<dyn TokenStorage>)
            .with_oauth_client(oauth_client(&base)),
    );
    let hub = OAuthCallbackHub::new(APP_ORIGIN, callback_timeout).unwrap();
    let launcher = Arc::new(CallbackLauncher {
        hub: hub.clone(),
        message: callback,
        launches: AtomicU32::new(0),
    });
    let provider = CloudFitnessProvider::new(
        tokens,
        hub,
        Arc::clone(&launcher) as Arc<dyn AuthorizationLauncher>,
    )
    .with_api_base_url(format!("{base}/fitness/v1/users/me"));
    Harness {
        provider,
        storage,
        launcher,
        state,
    }
}

async fn seed_token(storage: &InMemoryTokenStorage, access: &str) {
    storage
        .save(&TokenRecord::new(
            ProviderId::CloudFitness,
            access.to_owned(),
            Some("refresh-1".to_owned()),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_runs_authorization_flow_and_exchanges_code() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        Some(OAuthCallbackMessage::with_code(
            ProviderId::CloudFitness,
            "good-code",
        )),
        Duration::from_secs(5),
    )
    .await;

    let handle = h.provider.connect().await.unwrap();
    assert_eq!(handle.provider, ProviderId::CloudFitness);
    assert!(h.provider.is_connected().await);
    assert_eq!(h.launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(h.state.exchanges(), 1);

    let stored = h
        .storage
        .load(ProviderId::CloudFitness)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-1");
}

#[tokio::test]
async fn test_connect_reuses_stored_token() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        None,
        Duration::from_secs(5),
    )
    .await;
    seed_token(&h.storage, "access-1").await;

    h.provider.connect().await.unwrap();
    assert_eq!(h.launcher.launches.load(Ordering::SeqCst), 0);
    assert_eq!(h.state.exchanges(), 0);
}

#[tokio::test]
async fn test_denied_authorization_surfaces_error() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        Some(OAuthCallbackMessage::denied(
            ProviderId::CloudFitness,
            "access_denied",
        )),
        Duration::from_secs(5),
    )
    .await;

    assert!(matches!(
        h.provider.connect().await,
        Err(ProviderError::AuthorizationDenied { .. })
    ));
    assert!(!h.provider.is_connected().await);
}

#[tokio::test]
async fn test_abandoned_authorization_times_out() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        None,
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(
        h.provider.connect().await,
        Err(ProviderError::AuthorizationTimeout { .. })
    ));
}

#[tokio::test]
async fn test_fetch_returns_all_three_aggregates_and_sessions() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        None,
        Duration::from_secs(5),
    )
    .await;
    seed_token(&h.storage, "access-1").await;

    let RawProviderPayload::CloudFitness(payload) = h.provider.fetch_sample().await.unwrap()
    else {
        panic!("expected cloud fitness payload");
    };
    assert_eq!(payload.heart_rate.bucket.len(), 1);
    assert_eq!(payload.steps.bucket.len(), 1);
    assert_eq!(payload.calories.bucket.len(), 1);
    assert_eq!(payload.sessions.len(), 1);
    assert_eq!(h.state.api_hits(), 4);
    assert_eq!(h.state.refreshes(), 0);
}

#[tokio::test]
async fn test_single_401_refreshes_once_and_retries_once() {
    let h = harness(
        MockState::new("access-2", "access-2"),
        None,
        Duration::from_secs(5),
    )
    .await;
    seed_token(&h.storage, "stale").await;

    let payload = h.provider.fetch_sample().await.unwrap();
    assert!(matches!(payload, RawProviderPayload::CloudFitness(_)));
    assert_eq!(h.state.refreshes(), 1);

    let stored = h
        .storage
        .load(ProviderId::CloudFitness)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-2");
}

#[tokio::test]
async fn test_second_401_is_auth_expired() {
    let h = harness(
        MockState::new("never-issued", "still-wrong"),
        None,
        Duration::from_secs(5),
    )
    .await;
    seed_token(&h.storage, "stale").await;

    let result = h.provider.fetch_sample().await;
    assert!(matches!(result, Err(ProviderError::AuthExpired { .. })));
    assert!(result.unwrap_err().requires_reauthorization());
    assert_eq!(h.state.refreshes(), 1);
}

#[tokio::test]
async fn test_fetch_without_token_is_auth_expired() {
    let h = harness(
        MockState::new("access-1", "access-2"),
        None,
        Duration::from_secs(5),
    )
    .await;
    assert!(matches!(
        h.provider.fetch_sample().await,
        Err(ProviderError::AuthExpired { .. })
    ));
    assert_eq!(h.state.api_hits(), 0);
}

#[tokio::test]
async fn test_server_errors_trip_circuit_without_refresh() {
    let state = MockState::new("access-1", "access-2");
    *state.api_failure.lock().unwrap() = Some(503);
    let mut h = harness(state, None, Duration::from_secs(5)).await;
    h.provider = h.provider.with_circuit_breaker(CircuitBreakerConfig {
        failure_threshold: 1,
        recovery_timeout: Duration::from_secs(60),
        success_threshold: 1,
    });
    seed_token(&h.storage, "access-1").await;

    let first = h.provider.fetch_sample().await.unwrap_err();
    assert!(first.is_retryable());
    assert!(matches!(
        h.provider.fetch_sample().await,
        Err(ProviderError::CircuitBreakerOpen { .. })
    ));
    assert_eq!(h.state.refreshes(), 0);
}
