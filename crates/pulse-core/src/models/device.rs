// ABOUTME: Wearable provider identity and per-provider connection state
// ABOUTME: Closed enumeration of supported data sources with string round-tripping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::ProviderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported wearable data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Cloud fitness-tracking REST API (OAuth)
    CloudFitness,
    /// Bluetooth heart-rate sensor
    Bluetooth,
    /// Activity-tracking service
    ActivityService,
}

impl ProviderId {
    /// Every supported provider, in registration order
    pub const ALL: [Self; 3] = [Self::CloudFitness, Self::Bluetooth, Self::ActivityService];

    /// Wire identifier
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CloudFitness => "cloud_fitness",
            Self::Bluetooth => "bluetooth",
            Self::ActivityService => "activity_service",
        }
    }

    /// Human-readable name
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::CloudFitness => "Cloud Fitness",
            Self::Bluetooth => "Bluetooth Heart Rate",
            Self::ActivityService => "Activity Service",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud_fitness" => Ok(Self::CloudFitness),
            "bluetooth" => Ok(Self::Bluetooth),
            "activity_service" => Ok(Self::ActivityService),
            other => Err(ProviderError::UnsupportedProvider {
                provider: other.to_owned(),
            }),
        }
    }
}

/// Connection state of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnection {
    /// Provider this entry describes
    pub provider_id: ProviderId,
    /// Whether the provider is currently connected
    pub connected: bool,
    /// Last successful sync
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl DeviceConnection {
    /// Disconnected entry with no sync history
    #[must_use]
    pub const fn disconnected(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            connected: false,
            last_sync_at: None,
        }
    }
}
