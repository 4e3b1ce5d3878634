// ABOUTME: OAuth token persistence plus authorization-code exchange and refresh
// ABOUTME: File-backed storage writes atomically so no partial token is ever visible
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Token Store
//!
//! Reads never touch the network. Exchange and refresh talk to the provider's
//! token endpoint with a form-encoded POST and persist the result before
//! returning it. Expiry is never tracked here: the adapters learn about it from
//! a 401 and call `refresh()` through `with_single_reauth`.

use crate::http_client::shared_client;
use async_trait::async_trait;
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::{ProviderId, TokenRecord};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

/// OAuth client registration for one provider
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    /// Provider this client belongs to
    pub provider: ProviderId,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    /// Authorization URL the external browser context should open
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `auth_url` is not a valid URL.
    pub fn authorization_url(&self, state: &str) -> ProviderResult<String> {
        let mut url =
            Url::parse(&self.auth_url).map_err(|e| ProviderError::ConfigurationError {
                provider: self.provider.to_string(),
                details: format!("invalid authorization URL: {e}"),
            })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Local persistent storage for token records
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Read the token for `provider`
    async fn load(&self, provider: ProviderId) -> ProviderResult<Option<TokenRecord>>;

    /// Replace the token for `record.provider`
    async fn save(&self, record: &TokenRecord) -> ProviderResult<()>;

    /// Drop the token for `provider`
    async fn remove(&self, provider: ProviderId) -> ProviderResult<()>;

    /// Every stored token
    async fn list(&self) -> ProviderResult<Vec<TokenRecord>>;
}

/// Process-local token storage
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    tokens: RwLock<HashMap<ProviderId, TokenRecord>>,
}

impl InMemoryTokenStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn load(&self, provider: ProviderId) -> ProviderResult<Option<TokenRecord>> {
        Ok(self.tokens.read().await.get(&provider).cloned())
    }

    async fn save(&self, record: &TokenRecord) -> ProviderResult<()> {
        self.tokens
            .write()
            .await
            .insert(record.provider, record.clone());
        Ok(())
    }

    async fn remove(&self, provider: ProviderId) -> ProviderResult<()> {
        self.tokens.write().await.remove(&provider);
        Ok(())
    }

    async fn list(&self) -> ProviderResult<Vec<TokenRecord>> {
        let mut tokens: Vec<_> = self.tokens.read().await.values().cloned().collect();
        tokens.sort_by_key(|t| t.provider);
        Ok(tokens)
    }
}

/// JSON file holding every provider's token
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// reader sees either the previous map or the new one.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStorage {
    /// Storage backed by `path`; the file is created on first save
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the token file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> ProviderResult<BTreeMap<ProviderId, TokenRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ProviderError::storage(format!(
                    "token file {} is corrupt: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ProviderError::storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, tokens: &BTreeMap<ProviderId, TokenRecord>) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ProviderError::storage(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }
        let bytes = serde_json::to_vec_pretty(tokens)
            .map_err(|e| ProviderError::storage(format!("failed to encode tokens: {e}")))?;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, bytes).await.map_err(|e| {
            ProviderError::storage(format!("failed to write {}: {e}", temp_path.display()))
        })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| {
                ProviderError::storage(format!("failed to replace {}: {e}", self.path.display()))
            })
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn load(&self, provider: ProviderId) -> ProviderResult<Option<TokenRecord>> {
        Ok(self.read_all().await?.remove(&provider))
    }

    async fn save(&self, record: &TokenRecord) -> ProviderResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.read_all().await?;
        tokens.insert(record.provider, record.clone());
        self.write_all(&tokens).await
    }

    async fn remove(&self, provider: ProviderId) -> ProviderResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.read_all().await?;
        if tokens.remove(&provider).is_some() {
            self.write_all(&tokens).await?;
        }
        Ok(())
    }

    async fn list(&self) -> ProviderResult<Vec<TokenRecord>> {
        Ok(self.read_all().await?.into_values().collect())
    }
}

/// Persists and refreshes bearer tokens for OAuth providers
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    clients: HashMap<ProviderId, OAuthClientConfig>,
    http: Client,
}

impl TokenStore {
    /// Store over `storage` using the shared HTTP client
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_client(storage, shared_client().clone())
    }

    /// Store over `storage` using a specific HTTP client
    #[must_use]
    pub fn with_client(storage: Arc<dyn TokenStorage>, http: Client) -> Self {
        Self {
            storage,
            clients: HashMap::new(),
            http,
        }
    }

    /// Register the OAuth client used for a provider
    #[must_use]
    pub fn with_oauth_client(mut self, config: OAuthClientConfig) -> Self {
        self.clients.insert(config.provider, config);
        self
    }

    /// OAuth client registered for `provider`
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if no client is registered.
    pub fn client_config(&self, provider: ProviderId) -> ProviderResult<&OAuthClientConfig> {
        self.clients
            .get(&provider)
            .ok_or_else(|| ProviderError::ConfigurationError {
                provider: provider.to_string(),
                details: "no OAuth client registered".to_owned(),
            })
    }

    /// Read the persisted token; never touches the network
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing storage cannot be read.
    pub async fn get_token(&self, provider: ProviderId) -> ProviderResult<Option<TokenRecord>> {
        self.storage.load(provider).await
    }

    /// Every persisted token
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backing storage cannot be read.
    pub async fn list_tokens(&self) -> ProviderResult<Vec<TokenRecord>> {
        self.storage.list().await
    }

    /// Persist a token delivered directly by an authorization flow
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the token cannot be written.
    pub async fn store_token(&self, record: TokenRecord) -> ProviderResult<TokenRecord> {
        self.storage.save(&record).await?;
        info!(provider = %record.provider, "Stored access token from authorization flow");
        Ok(record)
    }

    /// Exchange an authorization code for access and refresh tokens
    ///
    /// # Errors
    ///
    /// Returns `AuthExchange` on a non-2xx response or malformed body,
    /// `ConfigurationError` if no OAuth client is registered, and `Storage` if
    /// the token cannot be persisted.
    pub async fn exchange_authorization_code(
        &self,
        provider: ProviderId,
        code: &str,
    ) -> ProviderResult<TokenRecord> {
        let client = self.client_config(provider)?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ];
        let response = self.post_token_request(client, &params).await?;

        let record = TokenRecord::new(provider, response.access_token, response.refresh_token);
        self.storage.save(&record).await?;
        info!(
            provider = %provider,
            has_refresh_token = record.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );
        Ok(record)
    }

    /// Exchange the stored refresh token for a new access token
    ///
    /// # Errors
    ///
    /// Returns `NoRefreshToken` if none is stored, `AuthExchange` if the token
    /// endpoint rejects the refresh, and `Storage` on persistence failure.
    pub async fn refresh(&self, provider: ProviderId) -> ProviderResult<TokenRecord> {
        let mut record = self
            .storage
            .load(provider)
            .await?
            .filter(|r| r.refresh_token.is_some())
            .ok_or_else(|| ProviderError::NoRefreshToken {
                provider: provider.to_string(),
            })?;
        let refresh_token = record.refresh_token.clone().unwrap_or_default();

        let client = self.client_config(provider)?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];
        let response = self.post_token_request(client, &params).await?;

        record.apply_refresh(response.access_token, response.refresh_token);
        self.storage.save(&record).await?;
        info!(provider = %provider, "Refreshed access token");
        Ok(record)
    }

    async fn post_token_request(
        &self,
        client: &OAuthClientConfig,
        params: &[(&str, &str)],
    ) -> ProviderResult<TokenResponse> {
        let provider = client.provider.to_string();
        debug!(provider = %provider, url = %client.token_url, "Calling token endpoint");

        let response = self
            .http
            .post(&client.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::AuthExchange {
                provider: provider.clone(),
                status_code: None,
                message: format!("token request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %provider, status = %status, "Token endpoint rejected request");
            return Err(ProviderError::AuthExchange {
                provider,
                status_code: Some(status.as_u16()),
                message: body.chars().take(256).collect(),
            });
        }

        let parsed: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::AuthExchange {
                    provider: provider.clone(),
                    status_code: Some(status.as_u16()),
                    message: format!("malformed token response: {e}"),
                })?;
        if parsed.access_token.is_empty() {
            return Err(ProviderError::AuthExchange {
                provider,
                status_code: Some(status.as_u16()),
                message: "token response carried an empty access token".to_owned(),
            });
        }
        if let Some(expires_in) = parsed.expires_in {
            debug!(provider = %client.provider, expires_in, "Token lifetime reported by provider");
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_config() -> OAuthClientConfig {
        OAuthClientConfig {
            provider: ProviderId::CloudFitness,
            client_id: "client-123".to_owned(),
            client_secret: "secret".to_owned(),
            redirect_uri: "http://localhost:3000/oauth/callback".to_owned(),
            auth_url: "https://accounts.example.com/o/oauth2/auth".to_owned(),
            token_url: "https://accounts.example.com/token".to_owned(),
            scopes: vec!["fitness.read".to_owned(), "heart.read".to_owned()],
        }
    }

    #[test]
    fn test_authorization_url_carries_client_and_state() {
        let url = Url::parse(&client_config().authorization_url("cloud_fitness:abc").unwrap())
            .unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "fitness.read heart.read");
        assert_eq!(pairs["state"], "cloud_fitness:abc");
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/oauth/callback");
    }

    #[tokio::test]
    async fn test_refresh_without_token_is_no_refresh_token() {
        let store = TokenStore::new(Arc::new(InMemoryTokenStorage::new()))
            .with_oauth_client(client_config());
        let result = store.refresh(ProviderId::CloudFitness).await;
        assert!(matches!(result, Err(ProviderError::NoRefreshToken { .. })));
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_only_is_no_refresh_token() {
        let storage = Arc::new(InMemoryTokenStorage::new());
        storage
            .save(&TokenRecord::new(
                ProviderId::CloudFitness,
                "access".to_owned(),
                None,
            ))
            .await
            .unwrap();
        let store = TokenStore::new(storage).with_oauth_client(client_config());
        let result = store.refresh(ProviderId::CloudFitness).await;
        assert!(matches!(result, Err(ProviderError::NoRefreshToken { .. })));
    }

    #[tokio::test]
    async fn test_missing_client_is_configuration_error() {
        let store = TokenStore::new(Arc::new(InMemoryTokenStorage::new()));
        let result = store
            .exchange_authorization_code(ProviderId::CloudFitness, "code")
            .await;
        assert!(matches!(
            result,
            Err(ProviderError::ConfigurationError { .. })
        ));
    }
}
