// ABOUTME: Environment-driven configuration for the sync pipeline with documented defaults
// ABOUTME: Covers polling cadence, history capacity, OAuth origin and timeouts, storage paths
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration is read from environment variables only. Unparseable
//! numeric or boolean values fall back to their default with a warning;
//! `validate()` rejects values the pipeline cannot run with.

/// Cloud fitness OAuth client settings
pub mod oauth;

pub use oauth::CloudFitnessOAuthConfig;

use crate::sync_engine::EngineOptions;
use pulse_core::constants::{oauth as oauth_consts, plan_generation, sync};
use pulse_core::errors::{AppError, AppResult};
use pulse_providers::http_client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Shared HTTP client timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Generative language service settings
#[derive(Clone, PartialEq, Eq)]
pub struct PlanGenerationConfig {
    /// API key; plan generation is unavailable without it
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
}

impl std::fmt::Debug for PlanGenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanGenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Account whose remote document is synced
    pub account_id: String,
    /// Poll period
    pub poll_interval: Duration,
    /// Rolling history capacity
    pub history_capacity: usize,
    /// Skip a tick while the previous one is in flight
    pub skip_overlapping_ticks: bool,
    /// Expected origin of OAuth callback messages
    pub app_origin: String,
    /// How long a pending authorization waits for its callback
    pub oauth_callback_timeout: Duration,
    /// Token storage file
    pub token_store_path: PathBuf,
    /// Optional metrics mirror file
    pub metrics_mirror_path: Option<PathBuf>,
    /// HTTP timeouts
    pub http: HttpClientConfig,
    /// Cloud fitness OAuth client
    pub cloud_fitness: CloudFitnessOAuthConfig,
    /// Plan generation collaborator
    pub plan_generation: PlanGenerationConfig,
}

impl SyncConfig {
    /// Load configuration from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        let app_origin = env_string("PULSE_APP_ORIGIN", oauth_consts::DEFAULT_APP_ORIGIN);
        Self {
            account_id: env_string("PULSE_ACCOUNT_ID", "local"),
            poll_interval: Duration::from_secs(env_parse(
                "PULSE_POLL_INTERVAL_SECS",
                sync::DEFAULT_POLL_INTERVAL_SECS,
            )),
            history_capacity: env_parse("PULSE_HISTORY_CAPACITY", sync::HISTORY_CAPACITY),
            skip_overlapping_ticks: env_flag("PULSE_SKIP_OVERLAPPING_TICKS", false),
            oauth_callback_timeout: Duration::from_secs(env_parse(
                "PULSE_OAUTH_CALLBACK_TIMEOUT_SECS",
                oauth_consts::DEFAULT_CALLBACK_TIMEOUT_SECS,
            )),
            token_store_path: env::var("PULSE_TOKEN_STORE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map_or_else(default_token_store_path, PathBuf::from),
            metrics_mirror_path: env::var("PULSE_METRICS_MIRROR_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            http: HttpClientConfig {
                timeout_secs: env_parse("PULSE_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
                connect_timeout_secs: env_parse(
                    "PULSE_HTTP_CONNECT_TIMEOUT_SECS",
                    DEFAULT_CONNECT_TIMEOUT_SECS,
                ),
            },
            cloud_fitness: CloudFitnessOAuthConfig::from_env(&app_origin),
            plan_generation: PlanGenerationConfig {
                api_key: env::var("PLAN_GENERATION_API_KEY")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
                model: env_string("PLAN_GENERATION_MODEL", plan_generation::DEFAULT_MODEL),
                base_url: env_string("PLAN_GENERATION_BASE_URL", plan_generation::DEFAULT_BASE_URL),
            },
            app_origin,
        }
    }

    /// Reject values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the offending variable.
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval.is_zero() {
            return Err(AppError::config("PULSE_POLL_INTERVAL_SECS must be greater than 0"));
        }
        if self.history_capacity == 0 {
            return Err(AppError::config("PULSE_HISTORY_CAPACITY must be greater than 0"));
        }
        if self.oauth_callback_timeout.is_zero() {
            return Err(AppError::config(
                "PULSE_OAUTH_CALLBACK_TIMEOUT_SECS must be greater than 0",
            ));
        }
        let origin = Url::parse(&self.app_origin).map_err(|e| {
            AppError::config(format!("PULSE_APP_ORIGIN '{}' is invalid: {e}", self.app_origin))
        })?;
        if !origin.origin().is_tuple() {
            return Err(AppError::config(format!(
                "PULSE_APP_ORIGIN '{}' has no scheme/host origin",
                self.app_origin
            )));
        }
        if self.account_id.trim().is_empty() {
            return Err(AppError::config("PULSE_ACCOUNT_ID must not be empty"));
        }
        Ok(())
    }

    /// Engine cadence and overlap policy
    #[must_use]
    pub const fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            poll_interval: self.poll_interval,
            skip_overlapping_ticks: self.skip_overlapping_ticks,
        }
    }

    /// Log the effective configuration without secrets
    pub fn log_summary(&self) {
        info!(
            account_id = %self.account_id,
            poll_interval_secs = self.poll_interval.as_secs(),
            history_capacity = self.history_capacity,
            skip_overlapping_ticks = self.skip_overlapping_ticks,
            app_origin = %self.app_origin,
            oauth_callback_timeout_secs = self.oauth_callback_timeout.as_secs(),
            token_store = %self.token_store_path.display(),
            metrics_mirror = ?self.metrics_mirror_path,
            plan_generation = self.plan_generation.api_key.is_some(),
            "Configuration loaded"
        );
        self.cloud_fitness.validate_and_log();
    }
}

fn default_token_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pulse-sync")
        .join("tokens.json")
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = %default, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %raw, default, "Invalid flag, using default");
                default
            }
        },
        Err(_) => default,
    }
}
