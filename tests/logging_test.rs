// ABOUTME: Logging configuration tests for environment handling and filter directives
// ABOUTME: Serialized with other environment-mutating tests through serial_test
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(missing_docs, clippy::unwrap_used)]

use pulse_sync::constants::service_names;
use pulse_sync::logging::{LogFormat, LoggingConfig};
use serial_test::serial;
use std::env;

const VARS: &[&str] = &[
    "RUST_LOG",
    "LOG_FORMAT",
    "ENVIRONMENT",
    "SERVICE_NAME",
    "LOG_INCLUDE_LOCATION",
    "LOG_INCLUDE_THREAD",
    "LOG_INCLUDE_SPANS",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_logging_config_from_env() {
    clear_env();
    env::set_var("RUST_LOG", "debug");
    env::set_var("LOG_FORMAT", "json");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("SERVICE_NAME", "pulse-test");

    let config = LoggingConfig::from_env();
    clear_env();

    assert_eq!(config.level, "debug");
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.environment, "production");
    assert_eq!(config.service_name, "pulse-test");
    assert!(config.include_location);
    assert!(config.include_thread);
    assert!(config.include_spans);
}

#[test]
#[serial]
fn test_development_defaults() {
    clear_env();
    env::set_var("LOG_FORMAT", "compact");
    env::set_var("LOG_INCLUDE_SPANS", "1");

    let config = LoggingConfig::from_env();
    clear_env();

    assert_eq!(config.level, "info");
    assert_eq!(config.format, LogFormat::Compact);
    assert!(!config.include_location);
    assert!(config.include_spans);
    assert_eq!(config.service_name, service_names::PULSE_SYNC);
}

#[test]
#[serial]
fn test_filter_quiets_http_internals() {
    clear_env();
    let config = LoggingConfig {
        level: "debug".to_owned(),
        ..LoggingConfig::default()
    };
    let rendered = config.filter().to_string();

    assert!(rendered.contains("hyper=warn"));
    assert!(rendered.contains("reqwest=warn"));
    assert!(rendered.contains("pulse_sync=debug"));
    assert!(rendered.contains("pulse_providers=debug"));
}
