// ABOUTME: Sync engine state machine states and engine tuning options
// ABOUTME: Every non-idle state names the provider it concerns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use pulse_core::constants::sync::DEFAULT_POLL_INTERVAL_SECS;
use pulse_core::models::ProviderId;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Position in `Idle -> Connecting -> Active -> (Disconnecting | Degraded) -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "provider", rename_all = "snake_case")]
pub enum SyncState {
    /// No active provider
    Idle,
    /// Waiting for the provider's connect flow
    Connecting(ProviderId),
    /// Polling the provider
    Active(ProviderId),
    /// Tearing down the provider's session
    Disconnecting(ProviderId),
    /// Authorization was lost; about to return to idle
    Degraded(ProviderId),
}

impl SyncState {
    /// Provider this state concerns
    #[must_use]
    pub const fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::Idle => None,
            Self::Connecting(p) | Self::Active(p) | Self::Disconnecting(p) | Self::Degraded(p) => {
                Some(*p)
            }
        }
    }

    /// Whether `provider` is currently being polled
    #[must_use]
    pub fn is_active_for(&self, provider: ProviderId) -> bool {
        *self == Self::Active(provider)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting(p) => write!(f, "connecting({p})"),
            Self::Active(p) => write!(f, "active({p})"),
            Self::Disconnecting(p) => write!(f, "disconnecting({p})"),
            Self::Degraded(p) => write!(f, "degraded({p})"),
        }
    }
}

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fixed poll period
    pub poll_interval: Duration,
    /// Skip a tick while the previous one is still in flight
    pub skip_overlapping_ticks: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            skip_overlapping_ticks: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_with_provider() {
        let json = serde_json::to_value(SyncState::Active(ProviderId::Bluetooth)).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["provider"], "bluetooth");
        assert_eq!(
            serde_json::to_value(SyncState::Idle).unwrap()["state"],
            "idle"
        );
    }
}
