// ABOUTME: Core data models for the wearable sync pipeline
// ABOUTME: Canonical metrics record, provider identity, connection state, and tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Provider identity and connection state
pub mod device;
/// Canonical metrics record
pub mod metrics;
/// OAuth token record
pub mod token;

pub use device::{DeviceConnection, ProviderId};
pub use metrics::CanonicalMetricsRecord;
pub use token::TokenRecord;
