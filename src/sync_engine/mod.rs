// ABOUTME: Sync engine driving the single active provider through connect, poll and teardown
// ABOUTME: Fixed-cadence polling feeds the aggregator, metrics store and remote sync bridge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Sync Engine
//!
//! At most one provider is active. Connecting to another provider first
//! takes the current one through `Disconnecting` back to `Idle`.
//!
//! While `Active`, a timer fires every poll period and each firing spawns an
//! independent tick, so a slow fetch never delays the next one and ticks may
//! overlap unless `skip_overlapping_ticks` is set. A tick error is logged and
//! polling continues, except for errors that need a new authorization flow,
//! which move the engine through `Degraded` to `Idle`.
//!
//! Cancelling a session stops future ticks but not fetches already in
//! flight. Their results carry the session generation and are dropped when
//! that session is no longer the active one.

/// State machine states and engine options
pub mod state;

pub use state::{EngineOptions, SyncState};

use crate::aggregator;
use crate::metrics_store::MetricsStore;
use crate::remote_sync::{RemoteSyncBridge, Subscription};
use chrono::Utc;
use pulse_core::constants::sync::STATE_CHANNEL_CAPACITY;
use pulse_core::errors::{AppError, AppResult, ProviderError};
use pulse_core::models::{CanonicalMetricsRecord, DeviceConnection, ProviderId};
use pulse_providers::{ConnectionHandle, ProviderRegistry};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

struct RemoteTarget {
    bridge: RemoteSyncBridge,
    account_id: String,
}

struct ActiveSession {
    provider: ProviderId,
    generation: u64,
    cancel: CancellationToken,
}

struct SessionSlot {
    state: SyncState,
    active: Option<ActiveSession>,
}

struct EngineInner {
    registry: ProviderRegistry,
    store: Arc<MetricsStore>,
    remote: Option<RemoteTarget>,
    options: EngineOptions,
    /// Serializes connect, disconnect and degrade
    lifecycle: tokio::sync::Mutex<()>,
    slot: Mutex<SessionSlot>,
    states: broadcast::Sender<SyncState>,
    generations: AtomicU64,
    connections: Mutex<BTreeMap<ProviderId, DeviceConnection>>,
    remote_subscription: Mutex<Option<Subscription>>,
}

/// Builder for [`SyncEngine`]
pub struct SyncEngineBuilder {
    registry: ProviderRegistry,
    store: Arc<MetricsStore>,
    remote: Option<RemoteTarget>,
    options: EngineOptions,
}

impl SyncEngineBuilder {
    /// Override the default poll cadence and overlap policy
    #[must_use]
    pub const fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Push every tick's result to `account_id`'s remote record
    #[must_use]
    pub fn remote(mut self, bridge: RemoteSyncBridge, account_id: impl Into<String>) -> Self {
        self.remote = Some(RemoteTarget {
            bridge,
            account_id: account_id.into(),
        });
        self
    }

    /// Engine in the `Idle` state
    #[must_use]
    pub fn build(self) -> SyncEngine {
        let connections = self
            .registry
            .supported()
            .into_iter()
            .map(|id| (id, DeviceConnection::disconnected(id)))
            .collect();
        let (states, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        SyncEngine {
            inner: Arc::new(EngineInner {
                registry: self.registry,
                store: self.store,
                remote: self.remote,
                options: self.options,
                lifecycle: tokio::sync::Mutex::new(()),
                slot: Mutex::new(SessionSlot {
                    state: SyncState::Idle,
                    active: None,
                }),
                states,
                generations: AtomicU64::new(0),
                connections: Mutex::new(connections),
                remote_subscription: Mutex::new(None),
            }),
        }
    }
}

/// Handle to the sync engine; clones share the same engine
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Start building an engine over `registry` that writes into `store`
    #[must_use]
    pub fn builder(registry: ProviderRegistry, store: Arc<MetricsStore>) -> SyncEngineBuilder {
        SyncEngineBuilder {
            registry,
            store,
            remote: None,
            options: EngineOptions::default(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.inner.lock_slot().state
    }

    /// Receiver of every later state transition
    #[must_use]
    pub fn subscribe_states(&self) -> broadcast::Receiver<SyncState> {
        self.inner.states.subscribe()
    }

    /// Provider currently being polled
    #[must_use]
    pub fn active_provider(&self) -> Option<ProviderId> {
        self.inner.lock_slot().active.as_ref().map(|s| s.provider)
    }

    /// Connection snapshot for `provider`
    #[must_use]
    pub fn connection(&self, provider: ProviderId) -> DeviceConnection {
        self.inner
            .lock_connections()
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| DeviceConnection::disconnected(provider))
    }

    /// Connection snapshots for every registered provider
    #[must_use]
    pub fn connections(&self) -> Vec<DeviceConnection> {
        self.inner.lock_connections().values().cloned().collect()
    }

    /// Store this engine writes into
    #[must_use]
    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.inner.store
    }

    /// Registered providers
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    /// Make `provider` the active provider and start polling it
    ///
    /// A different active provider is fully disconnected first.
    ///
    /// # Errors
    ///
    /// Returns the adapter's connect failure (denied authorization, timeout,
    /// no device) or `ResourceNotFound` for an unregistered provider. The
    /// engine is left `Idle` after a failed connect.
    pub async fn connect(&self, provider: ProviderId) -> AppResult<ConnectionHandle> {
        let inner = &self.inner;
        let adapter = inner.registry.get(provider)?;
        let _lifecycle = inner.lifecycle.lock().await;

        inner.teardown_active().await;
        inner.transition(SyncState::Connecting(provider));

        let handle = match adapter.connect().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Provider connect failed");
                inner.transition(SyncState::Idle);
                return Err(e.into());
            }
        };

        let generation = inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        inner.lock_slot().active = Some(ActiveSession {
            provider,
            generation,
            cancel: cancel.clone(),
        });
        inner.update_connection(provider, |c| c.connected = true);
        inner.transition(SyncState::Active(provider));

        tokio::spawn(poll_loop(
            Arc::downgrade(inner),
            provider,
            generation,
            cancel,
            inner.options,
        ));
        info!(
            provider = %provider,
            session_id = %handle.session_id,
            interval_ms = inner.options.poll_interval.as_millis() as u64,
            "Provider connected, polling started"
        );
        Ok(handle)
    }

    /// Stop polling the active provider and clear local metrics
    ///
    /// Does nothing when idle.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown_active().await;
    }

    /// Run one poll tick for the active provider now
    ///
    /// Returns the store's current record after the tick, or `None` when the
    /// provider had no data or the session ended while fetching.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when no provider is active, otherwise the
    /// tick's fetch or normalization error.
    pub async fn tick_now(&self) -> AppResult<Option<CanonicalMetricsRecord>> {
        let (provider, generation) = self
            .inner
            .lock_slot()
            .active
            .as_ref()
            .map(|s| (s.provider, s.generation))
            .ok_or_else(|| AppError::invalid_input("no active provider to poll"))?;
        self.inner.run_tick(provider, generation).await
    }

    /// Apply remote updates of the account's record to the local store
    ///
    /// The current remote record is merged immediately.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when the engine has no remote bridge, or the
    /// document store's error.
    pub async fn attach_remote(&self) -> AppResult<()> {
        let remote = self
            .inner
            .remote
            .as_ref()
            .ok_or_else(|| AppError::config("no remote sync bridge configured"))?;
        let store = Arc::clone(&self.inner.store);
        let subscription = remote
            .bridge
            .subscribe(&remote.account_id, move |record| {
                if store.merge_remote(record) {
                    debug!("Applied remote metrics update");
                }
            })
            .await?;
        if let Some(initial) = remote.bridge.latest(&remote.account_id).await? {
            self.inner.store.merge_remote(initial);
        }
        *self
            .inner
            .remote_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
        info!(account_id = %remote.account_id, "Remote metrics subscription attached");
        Ok(())
    }

    /// Disconnect and drop the remote subscription
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.inner
            .remote_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl EngineInner {
    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_connections(&self) -> MutexGuard<'_, BTreeMap<ProviderId, DeviceConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: SyncState) {
        let previous = std::mem::replace(&mut self.lock_slot().state, next);
        info!(from = %previous, to = %next, "Sync state transition");
        // No listeners is fine
        let _ = self.states.send(next);
    }

    fn update_connection(&self, provider: ProviderId, update: impl FnOnce(&mut DeviceConnection)) {
        update(
            self.lock_connections()
                .entry(provider)
                .or_insert_with(|| DeviceConnection::disconnected(provider)),
        );
    }

    /// Caller holds the lifecycle lock
    async fn teardown_active(&self) {
        let active = self.lock_slot().active.take();
        let Some(session) = active else {
            return;
        };
        let provider = session.provider;
        self.transition(SyncState::Disconnecting(provider));
        session.cancel.cancel();
        self.release(provider).await;
        self.store.clear();
        self.update_connection(provider, |c| c.connected = false);
        self.transition(SyncState::Idle);
        info!(provider = %provider, "Provider disconnected");
    }

    async fn degrade(&self, provider: ProviderId, generation: u64, cause: &ProviderError) {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut slot = self.lock_slot();
            let matches = slot
                .active
                .as_ref()
                .is_some_and(|s| s.provider == provider && s.generation == generation);
            if !matches {
                return;
            }
            slot.active.take()
        };
        let Some(session) = session else {
            return;
        };
        warn!(provider = %provider, error = %cause, "Authorization lost, dropping provider");
        self.transition(SyncState::Degraded(provider));
        session.cancel.cancel();
        self.release(provider).await;
        self.update_connection(provider, |c| c.connected = false);
        self.transition(SyncState::Idle);
    }

    async fn release(&self, provider: ProviderId) {
        match self.registry.get(provider) {
            Ok(adapter) => {
                if let Err(e) = adapter.disconnect().await {
                    warn!(provider = %provider, error = %e, "Provider disconnect reported an error");
                }
            }
            Err(e) => warn!(provider = %provider, error = %e, "Provider vanished from registry"),
        }
    }

    async fn run_tick(
        &self,
        provider: ProviderId,
        generation: u64,
    ) -> AppResult<Option<CanonicalMetricsRecord>> {
        let adapter = self.registry.get(provider)?;
        let payload = match adapter.fetch_sample().await {
            Ok(payload) => payload,
            Err(e) => {
                if e.requires_reauthorization() {
                    self.degrade(provider, generation, &e).await;
                }
                return Err(e.into());
            }
        };
        let records = aggregator::normalize(provider, &payload)?;

        // The slot guard spans the identity check and the appends so a
        // teardown cannot clear the store in between.
        let current = {
            let slot = self.lock_slot();
            if !slot_matches(&slot, provider, generation) {
                debug!(provider = %provider, generation, "Dropping result of a superseded session");
                return Ok(None);
            }
            if records.is_empty() {
                debug!(provider = %provider, "Provider returned no data this tick");
                return Ok(None);
            }
            let count = records.len();
            for record in records {
                self.store.append(record);
            }
            self.update_connection(provider, |c| c.last_sync_at = Some(Utc::now()));
            let current = self.store.current();
            debug!(provider = %provider, records = count, timestamp = %current.timestamp, "Metrics updated");
            current
        };

        if let Some(remote) = &self.remote {
            match remote.bridge.push(&remote.account_id, &current).await {
                Ok(outcome) => debug!(account_id = %remote.account_id, ?outcome, "Remote push finished"),
                Err(e) => warn!(account_id = %remote.account_id, error = %e, "Remote push failed"),
            }
        }
        Ok(Some(current))
    }
}

fn slot_matches(slot: &SessionSlot, provider: ProviderId, generation: u64) -> bool {
    slot.state.is_active_for(provider)
        && slot
            .active
            .as_ref()
            .is_some_and(|s| s.generation == generation)
}

async fn poll_loop(
    engine: Weak<EngineInner>,
    provider: ProviderId,
    generation: u64,
    cancel: CancellationToken,
    options: EngineOptions,
) {
    let in_flight = Arc::new(AtomicBool::new(false));
    let mut ticker = tokio::time::interval(options.poll_interval);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = engine.upgrade() else {
            break;
        };
        tick += 1;
        if options.skip_overlapping_ticks && in_flight.swap(true, Ordering::SeqCst) {
            debug!(provider = %provider, tick, "Previous tick still in flight, skipping");
            continue;
        }
        let in_flight = Arc::clone(&in_flight);
        tokio::spawn(
            async move {
                if let Err(e) = inner.run_tick(provider, generation).await {
                    warn!(error = %e, "Poll tick failed");
                }
                in_flight.store(false, Ordering::SeqCst);
            }
            .instrument(info_span!("poll_tick", provider = %provider, tick)),
        );
    }
    debug!(provider = %provider, generation, "Polling stopped");
}
