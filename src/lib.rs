// ABOUTME: Main library entry point for the pulse wearable sync pipeline
// ABOUTME: Aggregation, metrics store, sync engine, remote sync and plan generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Pulse Sync
//!
//! Keeps a live, bounded time series of health metrics fed by one wearable
//! data source at a time.
//!
//! ## Architecture
//!
//! - **Providers** (`pulse-providers`): authenticate against a source and
//!   fetch its most recent window of raw data
//! - **Aggregator**: maps raw payloads onto the canonical record
//! - **Metrics Store**: current record plus rolling history, with change
//!   notification
//! - **Sync Engine**: the connect/poll/disconnect state machine
//! - **Remote Sync**: mirrors the latest record to the account's document
//! - **Plan Generation**: contract with the external plan generator
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pulse_sync::config::SyncConfig;
//! use pulse_sync::pipeline::Pipeline;
//! use pulse_sync::remote_sync::InMemoryDocumentStore;
//! use pulse_sync::errors::AppResult;
//! use pulse_sync::models::ProviderId;
//! use pulse_providers::LoggingLauncher;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let pipeline = Pipeline::build(
//!         SyncConfig::from_env(),
//!         Arc::new(LoggingLauncher),
//!         Arc::new(InMemoryDocumentStore::new()),
//!     )?;
//!     pipeline.engine.connect(ProviderId::ActivityService).await?;
//!     let latest = pipeline.engine.tick_now().await?;
//!     println!("{latest:?}");
//!     Ok(())
//! }
//! ```

pub use pulse_core::{constants, errors, models};

/// Raw payload normalization
pub mod aggregator;

/// Environment configuration
pub mod config;

/// Structured logging setup
pub mod logging;

/// Current record and rolling history
pub mod metrics_store;

/// Component wiring
pub mod pipeline;

/// Plan-generation contract and client
pub mod plan_generation;

/// Remote latest-record bridge and document store port
pub mod remote_sync;

/// Connect/poll/disconnect state machine
pub mod sync_engine;
