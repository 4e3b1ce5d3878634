// ABOUTME: Wearable data provider adapters for cloud fitness, bluetooth, and activity sources
// ABOUTME: Token store, OAuth callback hub, single re-auth retry, circuit breaker, and registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Wearable data provider adapters and the credential plumbing they share.
//!
//! Each adapter knows how to authenticate against its source and fetch the
//! most recent window of raw samples. Normalization into the canonical record
//! happens downstream in the aggregator.

pub use pulse_core::constants;
pub use pulse_core::errors;
pub use pulse_core::models;

/// Activity-tracking service adapter (synthesized samples)
pub mod activity_service;
/// Bluetooth heart-rate sensor adapter and GATT measurement decoding
pub mod bluetooth;
/// Circuit breaker for networked adapters
pub mod circuit_breaker;
/// Cloud fitness REST adapter and its wire types
pub mod cloud_fitness;
/// Provider trait, raw payload and connection handle
pub mod core;
/// Shared HTTP client for provider API calls
pub mod http_client;
/// Cross-context OAuth callback delivery
pub mod oauth_callback;
/// Single refresh-and-retry wrapper for 401 responses
pub mod reauth;
/// Provider registry with capability flags
pub mod registry;
/// Random sample synthesis for providers without a real data source
pub mod synthetic;
/// OAuth token persistence, exchange and refresh
pub mod token_store;

pub use activity_service::ActivityServiceProvider;
pub use bluetooth::{BluetoothProvider, HeartRateSensor, SimulatedHeartRateSensor};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cloud_fitness::CloudFitnessProvider;
pub use core::{ConnectionHandle, RawProviderPayload, RawSample, WearableProvider};
pub use http_client::{initialize_shared_client, shared_client};
pub use oauth_callback::{
    AuthorizationGrant, AuthorizationLauncher, CallbackDisposition, CallbackEnvelope,
    LoggingLauncher, OAuthCallbackHub, OAuthCallbackMessage, PendingAuthorization,
};
pub use pulse_core::errors::provider::{ProviderError, ProviderResult};
pub use reauth::with_single_reauth;
pub use registry::{ProviderCapabilities, ProviderRegistry};
pub use synthetic::RandomSampleGenerator;
pub use token_store::{
    FileTokenStorage, InMemoryTokenStorage, OAuthClientConfig, TokenStorage, TokenStore,
};
