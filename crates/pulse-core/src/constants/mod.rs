// ABOUTME: Application constants for metric bounds, sync cadences, and provider endpoints
// ABOUTME: Centralizes values that adapters, aggregator, and sync engine must agree on
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Bounds for canonical metric fields
pub mod metrics {
    /// Upper bound for heart rate in beats per minute
    pub const MAX_HEART_RATE_BPM: u16 = 300;

    /// Upper bound for percentage fields (hydration, stress)
    pub const MAX_PERCENT: f64 = 100.0;

    /// Upper bound for sleep hours within one record
    pub const MAX_SLEEP_HOURS: f64 = 24.0;

    /// Kilojoules per kilocalorie
    pub const KJ_PER_KCAL: f64 = 4.184;
}

/// Sync engine and metrics store defaults
pub mod sync {
    /// Default polling period in seconds
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

    /// Rolling history capacity kept for charting
    pub const HISTORY_CAPACITY: usize = 30;

    /// Capacity of the state transition broadcast channel
    pub const STATE_CHANNEL_CAPACITY: usize = 64;

    /// Document resource type holding the latest metrics record of an account
    pub const LATEST_METRICS_RESOURCE: &str = "latest_metrics";
}

/// OAuth flow constants
pub mod oauth {
    /// Message type posted by the OAuth redirect context
    pub const CALLBACK_MESSAGE_TYPE: &str = "oauth_callback";

    /// Default time to wait for an authorization callback before abandoning it
    pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

    /// Default application origin trusted for callback messages
    pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

    /// Path on the application origin that receives the OAuth redirect
    pub const CALLBACK_PATH: &str = "/oauth/callback";
}

/// Cloud fitness provider endpoints and request parameters
pub mod cloud_fitness {
    /// OAuth authorization endpoint
    pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

    /// OAuth token endpoint
    pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

    /// REST base URL for the signed-in user
    pub const API_BASE_URL: &str = "https://www.googleapis.com/fitness/v1/users/me";

    /// Dataset aggregate endpoint path, relative to the API base
    pub const AGGREGATE_PATH: &str = "dataset:aggregate";

    /// Sessions endpoint path, relative to the API base
    pub const SESSIONS_PATH: &str = "sessions";

    /// Server-side bucket width (5 minutes)
    pub const BUCKET_DURATION_MILLIS: i64 = 300_000;

    /// Trailing window fetched on each poll
    pub const TRAILING_WINDOW_HOURS: i64 = 24;

    /// Heart rate data type (gauge)
    pub const HEART_RATE_DATA_TYPE: &str = "com.google.heart_rate.bpm";

    /// Step count data type (counter)
    pub const STEP_COUNT_DATA_TYPE: &str = "com.google.step_count.delta";

    /// Calories data type (counter)
    pub const CALORIES_DATA_TYPE: &str = "com.google.calories.expended";

    /// Session activity type for sleep
    pub const SLEEP_ACTIVITY_TYPE: i64 = 72;

    /// Scopes requested during authorization
    pub const DEFAULT_SCOPES: &[&str] = &[
        "https://www.googleapis.com/auth/fitness.activity.read",
        "https://www.googleapis.com/auth/fitness.heart_rate.read",
        "https://www.googleapis.com/auth/fitness.sleep.read",
    ];
}

/// Plan generation service defaults
pub mod plan_generation {
    /// Default generative-language API base URL
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    /// Default model name
    pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
}

/// Service identification for structured logging
pub mod service_names {
    /// Service name reported by the logging layer
    pub const PULSE_SYNC: &str = "pulse-sync";
}
