// ABOUTME: Wires configuration into the token store, providers, metrics store and sync engine
// ABOUTME: Single construction point shared by the CLI and integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::config::SyncConfig;
use crate::metrics_store::MetricsStore;
use crate::remote_sync::{DocumentStore, RemoteSyncBridge};
use crate::sync_engine::SyncEngine;
use pulse_core::errors::AppResult;
use pulse_providers::{
    initialize_shared_client, ActivityServiceProvider, AuthorizationLauncher, BluetoothProvider,
    CloudFitnessProvider, FileTokenStorage, OAuthCallbackHub, ProviderRegistry,
    SimulatedHeartRateSensor, TokenStore,
};
use std::sync::Arc;
use tracing::info;

/// Every long-lived component of one sync session
pub struct Pipeline {
    /// Effective configuration
    pub config: SyncConfig,
    /// OAuth token persistence and exchange
    pub tokens: Arc<TokenStore>,
    /// Delivery point for OAuth callback messages
    pub callbacks: OAuthCallbackHub,
    /// Remote latest-record bridge
    pub bridge: RemoteSyncBridge,
    /// Sync engine over every registered provider
    pub engine: SyncEngine,
}

impl Pipeline {
    /// Validate `config` and build every component
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for an unusable configuration, or a storage
    /// error when the metrics mirror cannot be restored.
    pub fn build(
        config: SyncConfig,
        launcher: Arc<dyn AuthorizationLauncher>,
        documents: Arc<dyn DocumentStore>,
    ) -> AppResult<Self> {
        config.validate()?;
        initialize_shared_client(config.http.timeout_secs, config.http.connect_timeout_secs);

        let mut tokens = TokenStore::new(Arc::new(FileTokenStorage::new(
            config.token_store_path.clone(),
        )));
        if config.cloud_fitness.is_configured() {
            tokens = tokens.with_oauth_client(config.cloud_fitness.client_config()?);
        }
        let tokens = Arc::new(tokens);
        let callbacks = OAuthCallbackHub::new(&config.app_origin, config.oauth_callback_timeout)?;

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(
            CloudFitnessProvider::new(Arc::clone(&tokens), callbacks.clone(), launcher)
                .with_api_base_url(config.cloud_fitness.api_base_url.clone()),
        ));
        registry.register(Arc::new(BluetoothProvider::new(Arc::new(
            SimulatedHeartRateSensor::new(rand::random()),
        ))));
        registry.register(Arc::new(ActivityServiceProvider::new(rand::random())));

        let store = Arc::new(match &config.metrics_mirror_path {
            Some(path) => MetricsStore::with_mirror(config.history_capacity, path)?,
            None => MetricsStore::with_capacity(config.history_capacity),
        });
        let bridge = RemoteSyncBridge::new(documents);
        let engine = SyncEngine::builder(registry, store)
            .options(config.engine_options())
            .remote(bridge.clone(), config.account_id.clone())
            .build();

        info!(
            providers = ?engine.registry().supported(),
            account_id = %config.account_id,
            "Sync pipeline ready"
        );
        Ok(Self {
            config,
            tokens,
            callbacks,
            bridge,
            engine,
        })
    }
}
