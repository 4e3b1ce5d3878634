// ABOUTME: Registry of configured wearable providers keyed by provider id
// ABOUTME: Capability flags let callers find OAuth, heart-rate and sleep capable sources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::core::WearableProvider;
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::ProviderId;
use std::collections::BTreeMap;
use std::sync::Arc;

bitflags::bitflags! {
    /// Features a provider offers
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ProviderCapabilities: u8 {
        /// Connect goes through an OAuth authorization flow
        const OAUTH = 0b0000_0001;
        /// Reports heart rate
        const HEART_RATE = 0b0000_0010;
        /// Reports steps, calories and activities
        const ACTIVITY = 0b0000_0100;
        /// Reports sleep
        const SLEEP = 0b0000_1000;
        /// Readings are synthesized rather than measured
        const SYNTHETIC = 0b0001_0000;
    }
}

impl ProviderCapabilities {
    /// Whether connecting requires user authorization
    #[must_use]
    pub const fn requires_oauth(&self) -> bool {
        self.contains(Self::OAUTH)
    }

    /// Whether sleep is reported
    #[must_use]
    pub const fn supports_sleep(&self) -> bool {
        self.contains(Self::SLEEP)
    }
}

/// Configured providers, at most one per id
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderId, Arc<dyn WearableProvider>>,
}

impl ProviderRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the provider for its id
    pub fn register(&mut self, provider: Arc<dyn WearableProvider>) {
        self.providers.insert(provider.id(), provider);
    }

    /// Provider registered for `id`
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedProvider` if nothing is registered for `id`.
    pub fn get(&self, id: ProviderId) -> ProviderResult<Arc<dyn WearableProvider>> {
        self.providers
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::UnsupportedProvider {
                provider: id.to_string(),
            })
    }

    /// Whether a provider is registered for `id`
    #[must_use]
    pub fn is_supported(&self, id: ProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    /// Registered ids in stable order
    #[must_use]
    pub fn supported(&self) -> Vec<ProviderId> {
        self.providers.keys().copied().collect()
    }

    /// Capabilities of the provider registered for `id`
    #[must_use]
    pub fn capabilities(&self, id: ProviderId) -> Option<ProviderCapabilities> {
        self.providers.get(&id).map(|p| p.capabilities())
    }

    /// Ids whose capabilities contain every flag in `required`
    #[must_use]
    pub fn with_capabilities(&self, required: ProviderCapabilities) -> Vec<ProviderId> {
        self.providers
            .iter()
            .filter(|(_, p)| p.capabilities().contains(required))
            .map(|(id, _)| *id)
            .collect()
    }
}
