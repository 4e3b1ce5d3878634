// ABOUTME: Keyed document store port with whole-document read, write and change subscription
// ABOUTME: In-memory implementation backed by a map plus one broadcast channel per key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use pulse_core::errors::AppResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{broadcast, RwLock};

/// Buffered changes per subscribed key before slow listeners start lagging
const SUBSCRIPTION_BUFFER: usize = 32;

/// Identity of one document: one per account and resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    /// Owning account
    pub account_id: String,
    /// Resource type, e.g. `latest_metrics`
    pub resource: String,
}

impl DocumentKey {
    /// Key for `resource` of `account_id`
    #[must_use]
    pub fn new(account_id: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }
}

/// Remote keyed document store
///
/// A write replaces the whole document and every subscriber of the key
/// receives the full new document, including writes made by this process.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current document, if one was ever written
    async fn read(&self, key: &DocumentKey) -> AppResult<Option<Value>>;

    /// Replace the document
    async fn write(&self, key: &DocumentKey, document: Value) -> AppResult<()>;

    /// Stream of full documents for every later change of `key`
    async fn subscribe(&self, key: &DocumentKey) -> AppResult<broadcast::Receiver<Value>>;
}

/// Process-local document store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentKey, Value>>,
    channels: Mutex<HashMap<DocumentKey, broadcast::Sender<Value>>>,
}

impl InMemoryDocumentStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, key: &DocumentKey) -> broadcast::Sender<Value> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_BUFFER).0)
            .clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self, key: &DocumentKey) -> AppResult<Option<Value>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn write(&self, key: &DocumentKey, document: Value) -> AppResult<()> {
        self.documents
            .write()
            .await
            .insert(key.clone(), document.clone());
        // No subscribers is not an error
        let _ = self.sender(key).send(document);
        Ok(())
    }

    async fn subscribe(&self, key: &DocumentKey) -> AppResult<broadcast::Receiver<Value>> {
        Ok(self.sender(key).subscribe())
    }
}
