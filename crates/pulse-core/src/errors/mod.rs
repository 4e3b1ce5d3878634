// ABOUTME: Unified application error type with stable error codes
// ABOUTME: Wraps provider failures for user-facing actions and carries error chains
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! `ProviderError` describes what went wrong inside a token, authorization or
//! adapter operation. `AppError` is what user-triggered actions (connect, push,
//! plan generation, configuration) return: a stable `ErrorCode`, a readable
//! message and an optional source for error chaining.

/// Provider, token and authorization error taxonomy
pub mod provider;

pub use provider::{ProviderError, ProviderResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used across the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Token endpoint failure
    AuthExchangeFailed,
    /// No refresh token stored, re-authorization required
    ReauthorizationRequired,
    /// Access token rejected after refresh and retry
    AuthExpired,
    /// User declined or abandoned the authorization flow
    AuthorizationDenied,
    /// No compatible device responded
    DeviceNotFound,
    /// Transient external failure
    ExternalServiceUnavailable,
    /// External service answered with an error
    ExternalServiceError,
    /// Payload could not be decoded
    MalformedResponse,
    /// Invalid caller input
    InvalidInput,
    /// Unknown resource or provider
    ResourceNotFound,
    /// Operation superseded by a newer one
    Conflict,
    /// Missing or invalid configuration
    ConfigInvalid,
    /// Local persistence failure
    StorageError,
    /// Serialization failure
    SerializationError,
    /// Unexpected internal failure
    InternalError,
}

impl ErrorCode {
    /// User-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthExchangeFailed => "Could not obtain credentials from the provider",
            Self::ReauthorizationRequired => "The provider must be authorized again",
            Self::AuthExpired => "The provider authorization has expired",
            Self::AuthorizationDenied => "Authorization was declined",
            Self::DeviceNotFound => "No compatible device was found",
            Self::ExternalServiceUnavailable => "An external service is currently unavailable",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::MalformedResponse => "An external service returned an unreadable response",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::Conflict => "The operation was superseded by a newer one",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::StorageError => "Storage operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
            Self::InternalError => "An internal error occurred",
        }
    }

    /// Whether the UI should offer a retry affordance
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable
                | Self::ExternalServiceError
                | Self::MalformedResponse
                | Self::AuthExchangeFailed
                | Self::DeviceNotFound
                | Self::Conflict
        )
    }
}

/// Unified error type for user-triggered operations
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        let code = match &error {
            ProviderError::AuthExchange { .. } => ErrorCode::AuthExchangeFailed,
            ProviderError::NoRefreshToken { .. } => ErrorCode::ReauthorizationRequired,
            ProviderError::AuthExpired { .. } | ProviderError::Unauthorized { .. } => {
                ErrorCode::AuthExpired
            }
            ProviderError::AuthorizationDenied { .. }
            | ProviderError::AuthorizationTimeout { .. } => ErrorCode::AuthorizationDenied,
            ProviderError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            ProviderError::Network { .. } | ProviderError::CircuitBreakerOpen { .. } => {
                ErrorCode::ExternalServiceUnavailable
            }
            ProviderError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
            ProviderError::ApiError { .. } => ErrorCode::ExternalServiceError,
            ProviderError::Storage { .. } => ErrorCode::StorageError,
            ProviderError::ConfigurationError { .. } => ErrorCode::ConfigInvalid,
            ProviderError::UnsupportedProvider { .. } => ErrorCode::ResourceNotFound,
        };
        let message = error.to_string();
        Self::new(code, message).with_source(error)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, error.to_string()).with_source(error)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
