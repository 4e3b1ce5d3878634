// ABOUTME: Core types and constants for the pulse wearable sync pipeline
// ABOUTME: Foundation crate with canonical metrics model, error taxonomy, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Pulse Core
//!
//! Foundation crate providing shared types and constants for the wearable
//! synchronization pipeline. It performs no I/O, so the provider crate and the
//! application crate can both depend on it without pulling in each other.
//!
//! ## Modules
//!
//! - **errors**: `ProviderError` taxonomy for adapter/token failures and the
//!   application-level `AppError` with `ErrorCode`
//! - **constants**: metric bounds, cadences, capacities and provider endpoints
//! - **models**: canonical metrics record, provider identity, device connection, tokens

/// Unified error handling with provider and application error types
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models shared by providers, aggregator and store
pub mod models;
