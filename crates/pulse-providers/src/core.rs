// ABOUTME: Provider trait shared by every wearable data source adapter
// ABOUTME: Defines the raw payload shapes handed to the aggregator and the connection handle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Provider Capability Surface
//!
//! Every adapter exposes the same three operations:
//!
//! - `connect()` authenticates (OAuth flow or device pairing) and yields a
//!   `ConnectionHandle`
//! - `fetch_sample()` retrieves the most recent window of raw data
//! - `disconnect()` drops provider-held handles; it is idempotent and never
//!   revokes remote tokens
//!
//! Adapters return provider-shaped payloads. Mapping them onto the canonical
//! record is the aggregator's job, driven by per-provider normalization tables.

use crate::cloud_fitness::wire::CloudFitnessPayload;
use crate::registry::ProviderCapabilities;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_core::errors::ProviderResult;
use pulse_core::models::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Proof of a successful `connect()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHandle {
    /// Provider that was connected
    pub provider: ProviderId,
    /// Unique id of this connection
    pub session_id: Uuid,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Paired device name, for device-backed providers
    pub device_name: Option<String>,
}

impl ConnectionHandle {
    /// New handle stamped now
    #[must_use]
    pub fn new(provider: ProviderId, device_name: Option<String>) -> Self {
        Self {
            provider,
            session_id: Uuid::new_v4(),
            connected_at: Utc::now(),
            device_name,
        }
    }
}

/// Flat key/value sample produced by device-backed and synthesized providers
///
/// Keys are provider-specific raw names; the aggregator's normalization table
/// for the provider decides which canonical field each key feeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Instant the sample was captured
    pub captured_at: DateTime<Utc>,
    /// Raw numeric readings keyed by provider field name
    pub fields: BTreeMap<String, f64>,
    /// Activity names in provider order
    pub activities: Vec<String>,
}

impl RawSample {
    /// Empty sample captured at `captured_at`
    #[must_use]
    pub const fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            fields: BTreeMap::new(),
            activities: Vec::new(),
        }
    }

    /// Builder-style field insertion
    #[must_use]
    pub fn with_field(mut self, key: &str, value: f64) -> Self {
        self.fields.insert(key.to_owned(), value);
        self
    }
}

/// Raw result of one `fetch_sample()` call
#[derive(Debug, Clone, PartialEq)]
pub enum RawProviderPayload {
    /// Bucketed aggregate responses from the cloud fitness API
    CloudFitness(CloudFitnessPayload),
    /// Single flat sample
    Sample(RawSample),
}

/// Common capability surface of every wearable data source
#[async_trait]
pub trait WearableProvider: Send + Sync {
    /// Provider identity
    fn id(&self) -> ProviderId;

    /// Features this provider offers
    fn capabilities(&self) -> ProviderCapabilities;

    /// Authenticate or pair
    ///
    /// OAuth providers open an external authorization flow and resolve when
    /// its callback arrives. Device providers pair synchronously.
    async fn connect(&self) -> ProviderResult<ConnectionHandle>;

    /// Retrieve the most recent window of data
    async fn fetch_sample(&self) -> ProviderResult<RawProviderPayload>;

    /// Drop provider-held handles; idempotent
    async fn disconnect(&self) -> ProviderResult<()>;

    /// Whether the provider currently holds a live connection
    async fn is_connected(&self) -> bool;
}
