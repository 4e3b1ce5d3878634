// ABOUTME: Scripted wearable provider and engine helpers shared by sync pipeline tests
// ABOUTME: Counts connect, fetch and disconnect calls and replays a queue of fetch outcomes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use pulse_providers::{
    ConnectionHandle, ProviderCapabilities, ProviderRegistry, RawProviderPayload, RawSample,
    WearableProvider,
};
use pulse_sync::errors::{ProviderError, ProviderResult};
use pulse_sync::metrics_store::MetricsStore;
use pulse_sync::models::{CanonicalMetricsRecord, ProviderId};
use pulse_sync::sync_engine::{EngineOptions, SyncEngine, SyncState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// One scripted `fetch_sample` outcome
#[derive(Debug, Clone, Copy)]
pub enum FetchStep {
    /// Sample carrying this heart rate
    Sample(u16),
    /// Transient transport failure
    Network,
    /// Access rejected after refresh and retry
    AuthExpired,
    /// No refresh token stored
    NoRefreshToken,
}

/// Wearable provider whose fetch results are scripted by the test
pub struct ScriptedProvider {
    id: ProviderId,
    steps: Mutex<VecDeque<FetchStep>>,
    default_heart_rate: u16,
    fetch_delay: Option<Duration>,
    fail_connect: AtomicBool,
    base: DateTime<Utc>,
    pub connects: AtomicU32,
    pub fetches: AtomicU32,
    pub disconnects: AtomicU32,
}

impl ScriptedProvider {
    /// Provider answering every fetch with `default_heart_rate`
    pub fn new(id: ProviderId, default_heart_rate: u16) -> Self {
        Self {
            id,
            steps: Mutex::new(VecDeque::new()),
            default_heart_rate,
            fetch_delay: None,
            fail_connect: AtomicBool::new(false),
            base: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            connects: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        }
    }

    /// Sleep this long inside every fetch
    pub const fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Replay `steps` before falling back to the default sample
    pub fn with_steps(self, steps: impl IntoIterator<Item = FetchStep>) -> Self {
        self.steps.lock().unwrap().extend(steps);
        self
    }

    /// Make `connect()` fail with `DeviceNotFound`
    pub fn failing_connect(self) -> Self {
        self.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn sample(&self, index: u32, heart_rate: u16) -> RawSample {
        let captured_at = self.base + ChronoDuration::seconds(i64::from(index) * 5);
        let key = match self.id {
            ProviderId::Bluetooth => "bpm",
            _ => "heart_rate",
        };
        RawSample::new(captured_at).with_field(key, f64::from(heart_rate))
    }
}

#[async_trait]
impl WearableProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::HEART_RATE | ProviderCapabilities::SYNTHETIC
    }

    async fn connect(&self) -> ProviderResult<ConnectionHandle> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ProviderError::DeviceNotFound {
                provider: self.id.to_string(),
                details: "scripted failure".to_owned(),
            });
        }
        Ok(ConnectionHandle::new(self.id, None))
    }

    async fn fetch_sample(&self) -> ProviderResult<RawProviderPayload> {
        let index = self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let provider = self.id.to_string();
        match step.unwrap_or(FetchStep::Sample(self.default_heart_rate)) {
            FetchStep::Sample(bpm) => Ok(RawProviderPayload::Sample(self.sample(index, bpm))),
            FetchStep::Network => Err(ProviderError::Network {
                provider,
                message: "connection reset".to_owned(),
            }),
            FetchStep::AuthExpired => Err(ProviderError::AuthExpired { provider }),
            FetchStep::NoRefreshToken => Err(ProviderError::NoRefreshToken { provider }),
        }
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connects.load(Ordering::SeqCst) > self.disconnects.load(Ordering::SeqCst)
    }
}

/// Engine over the given providers with a fresh store
pub fn engine_with(providers: &[Arc<ScriptedProvider>], options: EngineOptions) -> SyncEngine {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::clone(provider) as Arc<dyn WearableProvider>);
    }
    SyncEngine::builder(registry, Arc::new(MetricsStore::new()))
        .options(options)
        .build()
}

/// Options with a period long enough that only the immediate first tick fires
pub const fn single_tick_options() -> EngineOptions {
    EngineOptions {
        poll_interval: Duration::from_secs(3600),
        skip_overlapping_ticks: false,
    }
}

/// Collect states until `until` is seen or a second passes
pub async fn collect_states_until(
    states: &mut broadcast::Receiver<SyncState>,
    until: SyncState,
) -> Vec<SyncState> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        while let Ok(state) = states.recv().await {
            seen.push(state);
            if state == until {
                break;
            }
        }
    })
    .await;
    seen
}

/// Record at `secs` past the Unix epoch with the given heart rate
pub fn record_at(secs: i64, heart_rate: u16) -> CanonicalMetricsRecord {
    let mut record = CanonicalMetricsRecord::at(Utc.timestamp_opt(secs, 0).unwrap());
    record.heart_rate = heart_rate;
    record
}
