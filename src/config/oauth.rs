// ABOUTME: OAuth client configuration for the cloud fitness provider loaded from the environment
// ABOUTME: Reports client secrets only as a SHA-256 fingerprint in diagnostics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use pulse_core::constants::{cloud_fitness, oauth};
use pulse_core::errors::{AppError, AppResult};
use pulse_core::models::ProviderId;
use pulse_providers::OAuthClientConfig;
use sha2::{Digest, Sha256};
use std::env;
use tracing::{debug, info, warn};

/// Cloud fitness OAuth client and endpoints
#[derive(Clone, PartialEq, Eq)]
pub struct CloudFitnessOAuthConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// REST API base
    pub api_base_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl CloudFitnessOAuthConfig {
    /// Load from `CLOUD_FITNESS_*`; the redirect defaults to the app's callback path
    #[must_use]
    pub fn from_env(app_origin: &str) -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            client_id: non_empty("CLOUD_FITNESS_CLIENT_ID"),
            client_secret: non_empty("CLOUD_FITNESS_CLIENT_SECRET"),
            redirect_uri: non_empty("CLOUD_FITNESS_REDIRECT_URI").unwrap_or_else(|| {
                format!(
                    "{}{}",
                    app_origin.trim_end_matches('/'),
                    oauth::CALLBACK_PATH
                )
            }),
            auth_url: non_empty("CLOUD_FITNESS_AUTH_URL")
                .unwrap_or_else(|| cloud_fitness::AUTH_URL.to_owned()),
            token_url: non_empty("CLOUD_FITNESS_TOKEN_URL")
                .unwrap_or_else(|| cloud_fitness::TOKEN_URL.to_owned()),
            api_base_url: non_empty("CLOUD_FITNESS_API_BASE_URL")
                .unwrap_or_else(|| cloud_fitness::API_BASE_URL.to_owned()),
            scopes: cloud_fitness::DEFAULT_SCOPES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }

    /// First 8 hex chars of the secret's SHA-256, for comparing secrets in logs
    #[must_use]
    pub fn secret_fingerprint(&self) -> Option<String> {
        self.client_secret.as_ref().map(|secret| {
            let digest = Sha256::digest(secret.as_bytes());
            hex::encode(digest).chars().take(8).collect()
        })
    }

    /// Whether both client id and secret are present
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Log what is configured, never the secret itself
    pub fn validate_and_log(&self) -> bool {
        match (&self.client_id, self.secret_fingerprint()) {
            (Some(client_id), Some(fingerprint)) => {
                info!(
                    client_id = %client_id,
                    secret_fingerprint = %fingerprint,
                    redirect_uri = %self.redirect_uri,
                    "Cloud fitness OAuth client configured"
                );
                true
            }
            (None, None) => {
                debug!("Cloud fitness OAuth client not configured");
                false
            }
            _ => {
                warn!("Cloud fitness OAuth needs both CLOUD_FITNESS_CLIENT_ID and CLOUD_FITNESS_CLIENT_SECRET");
                false
            }
        }
    }

    /// Client registration handed to the token store
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when the id or secret is missing.
    pub fn client_config(&self) -> AppResult<OAuthClientConfig> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(AppError::config(
                "CLOUD_FITNESS_CLIENT_ID and CLOUD_FITNESS_CLIENT_SECRET must be set",
            ));
        };
        Ok(OAuthClientConfig {
            provider: ProviderId::CloudFitness,
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            scopes: self.scopes.clone(),
        })
    }
}

impl std::fmt::Debug for CloudFitnessOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFitnessOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.secret_fingerprint().map(|fp| format!("sha256:{fp}")))
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> CloudFitnessOAuthConfig {
        CloudFitnessOAuthConfig {
            client_id: Some("client".to_owned()),
            client_secret: secret.map(str::to_owned),
            redirect_uri: "http://localhost:3000/oauth/callback".to_owned(),
            auth_url: cloud_fitness::AUTH_URL.to_owned(),
            token_url: cloud_fitness::TOKEN_URL.to_owned(),
            api_base_url: cloud_fitness::API_BASE_URL.to_owned(),
            scopes: vec![],
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let fp = config(Some("s3cret")).secret_fingerprint().unwrap();
        assert_eq!(fp.len(), 8);
        assert_eq!(config(Some("s3cret")).secret_fingerprint().unwrap(), fp);
        assert_ne!(config(Some("other")).secret_fingerprint().unwrap(), fp);
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let rendered = format!("{:?}", config(Some("s3cret")));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("sha256:"));
    }

    #[test]
    fn test_client_config_requires_secret() {
        assert!(config(None).client_config().is_err());
        let client = config(Some("s3cret")).client_config().unwrap();
        assert_eq!(client.provider, ProviderId::CloudFitness);
    }
}
