// ABOUTME: Remote sync bridge tests against the in-memory and a failing document store
// ABOUTME: Covers last-write-wins pushes, subscription echoes, unsubscribe and error reporting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs, clippy::unwrap_used)]

mod common;

use async_trait::async_trait;
use common::record_at;
use pulse_sync::constants::sync::LATEST_METRICS_RESOURCE;
use pulse_sync::errors::{AppError, AppResult, ErrorCode};
use pulse_sync::models::CanonicalMetricsRecord;
use pulse_sync::remote_sync::{
    DocumentKey, DocumentStore, InMemoryDocumentStore, PushOutcome, RemoteSyncBridge,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const T0: i64 = 1_700_000_000;

#[tokio::test]
async fn test_push_is_last_write_wins_on_timestamp() {
    let bridge = RemoteSyncBridge::new(Arc::new(InMemoryDocumentStore::new()));

    let newer = record_at(T0 + 60, 80);
    let older = record_at(T0, 70);

    assert_eq!(bridge.push("acct", &newer).await.unwrap(), PushOutcome::Written);
    assert_eq!(
        bridge.push("acct", &older).await.unwrap(),
        PushOutcome::SkippedStale
    );
    assert_eq!(bridge.latest("acct").await.unwrap(), Some(newer.clone()));

    let mut restamped = newer.clone();
    restamped.heart_rate = 82;
    restamped.last_updated += chrono::Duration::seconds(2);
    assert_eq!(
        bridge.push("acct", &restamped).await.unwrap(),
        PushOutcome::Written
    );
    assert_eq!(bridge.latest("acct").await.unwrap(), Some(restamped));
}

#[tokio::test]
async fn test_pushes_are_scoped_per_account() {
    let bridge = RemoteSyncBridge::new(Arc::new(InMemoryDocumentStore::new()));
    bridge.push("a", &record_at(T0 + 60, 80)).await.unwrap();

    assert_eq!(
        bridge.push("b", &record_at(T0, 70)).await.unwrap(),
        PushOutcome::Written
    );
    assert_eq!(bridge.latest("b").await.unwrap().unwrap().heart_rate, 70);
}

#[tokio::test]
async fn test_subscription_receives_own_writes_until_dropped() {
    let bridge = RemoteSyncBridge::new(Arc::new(InMemoryDocumentStore::new()));
    let (tx, mut rx) = mpsc::unbounded_channel::<CanonicalMetricsRecord>();

    let subscription = bridge
        .subscribe("acct", move |record| {
            let _ = tx.send(record);
        })
        .await
        .unwrap();
    assert_eq!(subscription.account_id(), "acct");

    let record = record_at(T0, 77);
    bridge.push("acct", &record).await.unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, record);

    subscription.unsubscribe();
    bridge.push("acct", &record_at(T0 + 5, 78)).await.unwrap();
    // Callback was dropped with the task, closing the channel
    assert_eq!(
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_malformed_remote_document_reads_as_absent() {
    let documents = Arc::new(InMemoryDocumentStore::new());
    documents
        .write(
            &DocumentKey::new("acct", LATEST_METRICS_RESOURCE),
            json!({"heartRate": "fast"}),
        )
        .await
        .unwrap();
    let bridge = RemoteSyncBridge::new(documents);

    assert_eq!(bridge.latest("acct").await.unwrap(), None);
    assert_eq!(
        bridge.push("acct", &record_at(T0, 70)).await.unwrap(),
        PushOutcome::Written
    );
}

/// Store whose writes fail while `available` is false
struct FlakyStore {
    inner: InMemoryDocumentStore,
    available: Mutex<bool>,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn read(&self, key: &DocumentKey) -> AppResult<Option<Value>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &DocumentKey, document: Value) -> AppResult<()> {
        if !*self.available.lock().unwrap() {
            return Err(AppError::external_service("documents", "offline"));
        }
        self.inner.write(key, document).await
    }

    async fn subscribe(&self, key: &DocumentKey) -> AppResult<broadcast::Receiver<Value>> {
        self.inner.subscribe(key).await
    }
}

#[tokio::test]
async fn test_push_failure_is_reported_and_next_push_succeeds() {
    let documents = Arc::new(FlakyStore {
        inner: InMemoryDocumentStore::new(),
        available: Mutex::new(false),
    });
    let bridge = RemoteSyncBridge::new(Arc::clone(&documents) as Arc<dyn DocumentStore>);
    let record = record_at(T0, 70);

    let err = bridge.push("acct", &record).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ExternalServiceError);
    assert_eq!(bridge.latest("acct").await.unwrap(), None);

    *documents.available.lock().unwrap() = true;
    assert_eq!(bridge.push("acct", &record).await.unwrap(), PushOutcome::Written);
}
