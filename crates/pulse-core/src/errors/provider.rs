// ABOUTME: Structured error types for token, authorization, and wearable provider operations
// ABOUTME: Encodes the sync pipeline failure taxonomy with retry and re-authorization hints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use thiserror::Error;

/// Errors raised by the token store, the OAuth callback hub and provider adapters
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token endpoint returned a non-2xx status or an unparseable body
    #[error("{provider} token exchange failed: {message}")]
    AuthExchange {
        /// Provider identifier
        provider: String,
        /// HTTP status when the endpoint answered
        status_code: Option<u16>,
        /// Failure detail
        message: String,
    },

    /// A refresh was requested but no refresh token is stored
    #[error("No refresh token stored for {provider}; full re-authorization required")]
    NoRefreshToken {
        /// Provider identifier
        provider: String,
    },

    /// Access was still rejected after one refresh and one retry
    #[error("{provider} authorization expired after refresh and retry")]
    AuthExpired {
        /// Provider identifier
        provider: String,
    },

    /// Raw 401 from a provider API; consumed by the single re-auth wrapper
    #[error("{provider} rejected the access token (401)")]
    Unauthorized {
        /// Provider identifier
        provider: String,
    },

    /// The user declined the authorization flow
    #[error("Authorization for {provider} was denied: {reason}")]
    AuthorizationDenied {
        /// Provider identifier
        provider: String,
        /// Reason reported by the flow
        reason: String,
    },

    /// No callback arrived for a pending authorization within the timeout
    #[error("Authorization for {provider} timed out after {timeout_secs}s")]
    AuthorizationTimeout {
        /// Provider identifier
        provider: String,
        /// Timeout that elapsed
        timeout_secs: u64,
    },

    /// No compatible bluetooth peripheral answered the pairing request
    #[error("No compatible device found for {provider}: {details}")]
    DeviceNotFound {
        /// Provider identifier
        provider: String,
        /// Pairing detail
        details: String,
    },

    /// Transport-level failure (connect, timeout, reset)
    #[error("Network error talking to {provider}: {message}")]
    Network {
        /// Provider identifier
        provider: String,
        /// Failure detail
        message: String,
    },

    /// Payload could not be decoded into the expected shape
    #[error("Malformed response from {source_name}: {details}")]
    MalformedResponse {
        /// Service that produced the payload
        source_name: String,
        /// Decoding detail
        details: String,
    },

    /// Non-success status other than 401
    #[error("{provider} API error ({status_code}): {message}")]
    ApiError {
        /// Provider identifier
        provider: String,
        /// HTTP status code
        status_code: u16,
        /// Response detail
        message: String,
        /// Whether a later attempt may succeed
        retryable: bool,
    },

    /// Circuit breaker is open for the provider
    #[error("Circuit breaker open for {provider}, retry after {retry_after_secs}s")]
    CircuitBreakerOpen {
        /// Provider identifier
        provider: String,
        /// Seconds until a recovery probe is allowed
        retry_after_secs: u64,
    },

    /// Local persistence failure (token file, lock poisoning)
    #[error("Storage error: {details}")]
    Storage {
        /// Failure detail
        details: String,
    },

    /// Provider is missing configuration (client id, endpoints)
    #[error("{provider} configuration error: {details}")]
    ConfigurationError {
        /// Provider identifier
        provider: String,
        /// Missing or invalid setting
        details: String,
    },

    /// Identifier does not name a supported provider
    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider {
        /// Rejected identifier
        provider: String,
    },
}

impl ProviderError {
    /// Whether a later attempt of the same operation may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::CircuitBreakerOpen { .. } => true,
            Self::ApiError { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether the failure can only be cleared by a new authorization flow
    #[must_use]
    pub const fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::AuthExpired { .. } | Self::NoRefreshToken { .. })
    }

    /// Build a network error for a provider
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a malformed-response error
    pub fn malformed(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            source_name: source_name.into(),
            details: details.into(),
        }
    }

    /// Build a storage error
    pub fn storage(details: impl Into<String>) -> Self {
        Self::Storage {
            details: details.into(),
        }
    }

    /// Map a non-success HTTP status to the matching variant
    pub fn from_status(provider: impl Into<String>, status_code: u16, body: &str) -> Self {
        let provider = provider.into();
        if status_code == 401 {
            return Self::Unauthorized { provider };
        }
        Self::ApiError {
            provider,
            status_code,
            message: body.chars().take(256).collect(),
            retryable: status_code == 429 || status_code >= 500,
        }
    }
}

/// Result alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(feature = "provider-errors")]
impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::malformed("http", error.to_string());
        }
        if let Some(status) = error.status() {
            return Self::from_status("http", status.as_u16(), &error.to_string());
        }
        Self::network("http", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_401_to_unauthorized() {
        let err = ProviderError::from_status("cloud_fitness", 401, "expired");
        assert!(matches!(err, ProviderError::Unauthorized { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(ProviderError::from_status("cloud_fitness", 503, "").is_retryable());
        assert!(ProviderError::from_status("cloud_fitness", 429, "").is_retryable());
        assert!(!ProviderError::from_status("cloud_fitness", 403, "").is_retryable());
    }

    #[test]
    fn test_reauthorization_classification() {
        let expired = ProviderError::AuthExpired {
            provider: "cloud_fitness".to_owned(),
        };
        let missing = ProviderError::NoRefreshToken {
            provider: "cloud_fitness".to_owned(),
        };
        assert!(expired.requires_reauthorization());
        assert!(missing.requires_reauthorization());
        assert!(!ProviderError::network("cloud_fitness", "reset").requires_reauthorization());
    }
}
