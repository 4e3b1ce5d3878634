// ABOUTME: Activity-tracking service adapter returning synthesized readings
// ABOUTME: Connects without authorization and emits one sample per fetch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::core::{ConnectionHandle, RawProviderPayload, WearableProvider};
use crate::registry::ProviderCapabilities;
use crate::synthetic::RandomSampleGenerator;
use async_trait::async_trait;
use chrono::Utc;
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::ProviderId;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Activity-tracking service adapter
///
/// The service has no public API, so readings come from a seeded generator.
/// Fetching before `connect()` fails with `DeviceNotFound`.
#[derive(Debug)]
pub struct ActivityServiceProvider {
    generator: Mutex<RandomSampleGenerator>,
    connected: AtomicBool,
}

impl ActivityServiceProvider {
    /// Adapter with a fixed seed
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_generator(RandomSampleGenerator::new(seed))
    }

    /// Adapter over an existing generator
    #[must_use]
    pub fn with_generator(generator: RandomSampleGenerator) -> Self {
        Self {
            generator: Mutex::new(generator),
            connected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WearableProvider for ActivityServiceProvider {
    fn id(&self) -> ProviderId {
        ProviderId::ActivityService
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::HEART_RATE
            | ProviderCapabilities::ACTIVITY
            | ProviderCapabilities::SLEEP
            | ProviderCapabilities::SYNTHETIC
    }

    async fn connect(&self) -> ProviderResult<ConnectionHandle> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(ConnectionHandle::new(ProviderId::ActivityService, None))
    }

    async fn fetch_sample(&self) -> ProviderResult<RawProviderPayload> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ProviderError::DeviceNotFound {
                provider: ProviderId::ActivityService.to_string(),
                details: "not connected".to_owned(),
            });
        }
        let sample = self.generator.lock().await.activity_sample(Utc::now());
        debug!(fields = sample.fields.len(), "Synthesized activity sample");
        Ok(RawProviderPayload::Sample(sample))
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
