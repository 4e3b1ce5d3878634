// ABOUTME: OAuth token record persisted per provider by the token store
// ABOUTME: Redacts secrets from debug output so tokens never reach the logs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::device::ProviderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credentials for one OAuth provider
///
/// Created by an authorization-code exchange and mutated in place on refresh.
/// No expiry is tracked: a 401 from the provider is the only expiry signal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Provider the token belongs to
    pub provider: ProviderId,
    /// Opaque access token
    pub access_token: String,
    /// Opaque refresh token, absent when the provider did not issue one
    pub refresh_token: Option<String>,
    /// When the authorization code was exchanged
    pub obtained_at: DateTime<Utc>,
    /// When the access token was last refreshed
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Fresh record from an authorization-code exchange
    #[must_use]
    pub fn new(provider: ProviderId, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            provider,
            access_token,
            refresh_token,
            obtained_at: Utc::now(),
            refreshed_at: None,
        }
    }

    /// Apply a refresh response; keeps the stored refresh token if none was issued
    pub fn apply_refresh(&mut self, access_token: String, refresh_token: Option<String>) {
        self.access_token = access_token;
        if let Some(refresh_token) = refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.refreshed_at = Some(Utc::now());
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("provider", &self.provider)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("obtained_at", &self.obtained_at)
            .field("refreshed_at", &self.refreshed_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let token = TokenRecord::new(
            ProviderId::CloudFitness,
            "ya29.secret".to_owned(),
            Some("1//refresh".to_owned()),
        );
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("ya29.secret"));
        assert!(!rendered.contains("1//refresh"));
    }

    #[test]
    fn test_refresh_keeps_existing_refresh_token() {
        let mut token = TokenRecord::new(
            ProviderId::CloudFitness,
            "old".to_owned(),
            Some("keep-me".to_owned()),
        );
        token.apply_refresh("new".to_owned(), None);
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("keep-me"));
        assert!(token.refreshed_at.is_some());
    }
}
