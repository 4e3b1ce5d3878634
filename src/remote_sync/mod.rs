// ABOUTME: Remote sync bridge publishing the latest canonical record to the account document
// ABOUTME: Last-write-wins on record timestamp, with live subscriptions that unsubscribe on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Remote Sync Bridge
//!
//! The remote "latest metrics" document is shared by every session of an
//! account. `push` reads it first and leaves it alone when the remote record
//! is newer, so overlapping sessions converge on the latest timestamp.
//! Subscribers see every change, including echoes of their own pushes, and
//! must apply them idempotently.

/// Document store port and in-memory implementation
pub mod document_store;

pub use document_store::{DocumentKey, DocumentStore, InMemoryDocumentStore};

use pulse_core::constants::sync::LATEST_METRICS_RESOURCE;
use pulse_core::errors::AppResult;
use pulse_core::models::CanonicalMetricsRecord;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Result of a `push`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote document now holds the pushed record
    Written,
    /// The remote record was newer and was kept
    SkippedStale,
}

/// Live listener registration; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    account_id: String,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Account this subscription listens to
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Stop delivering updates
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Publishes and observes the account's latest canonical record
#[derive(Clone)]
pub struct RemoteSyncBridge {
    store: Arc<dyn DocumentStore>,
}

impl RemoteSyncBridge {
    /// Bridge over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn key(account_id: &str) -> DocumentKey {
        DocumentKey::new(account_id, LATEST_METRICS_RESOURCE)
    }

    /// Remote record of `account_id`, if a valid one exists
    ///
    /// # Errors
    ///
    /// Returns the document store's error if the read fails.
    pub async fn latest(&self, account_id: &str) -> AppResult<Option<CanonicalMetricsRecord>> {
        let document = self.store.read(&Self::key(account_id)).await?;
        Ok(document.and_then(|doc| match serde_json::from_value(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(account_id, error = %e, "Ignoring malformed remote metrics document");
                None
            }
        }))
    }

    /// Overwrite the remote record unless it is already newer
    ///
    /// Failures are reported, never retried here; the next poll tick pushes again.
    ///
    /// # Errors
    ///
    /// Returns the document store's error if the read or write fails.
    pub async fn push(
        &self,
        account_id: &str,
        record: &CanonicalMetricsRecord,
    ) -> AppResult<PushOutcome> {
        if let Some(remote) = self.latest(account_id).await? {
            if remote.is_newer_than(record) {
                debug!(
                    account_id,
                    remote = %remote.timestamp,
                    local = %record.timestamp,
                    "Remote metrics are newer, skipping push"
                );
                return Ok(PushOutcome::SkippedStale);
            }
        }
        let document = serde_json::to_value(record)?;
        self.store.write(&Self::key(account_id), document).await?;
        Ok(PushOutcome::Written)
    }

    /// Invoke `on_update` with every later change of the remote record
    ///
    /// # Errors
    ///
    /// Returns the document store's error if the subscription cannot be opened.
    pub async fn subscribe<F>(&self, account_id: &str, on_update: F) -> AppResult<Subscription>
    where
        F: Fn(CanonicalMetricsRecord) + Send + Sync + 'static,
    {
        let mut updates = self.store.subscribe(&Self::key(account_id)).await?;
        let account = account_id.to_owned();
        let task = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(document) => match serde_json::from_value(document) {
                        Ok(record) => on_update(record),
                        Err(e) => {
                            warn!(account_id = %account, error = %e, "Ignoring malformed remote update");
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(account_id = %account, skipped, "Remote subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription {
            account_id: account_id.to_owned(),
            task,
        })
    }
}
