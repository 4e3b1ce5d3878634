// ABOUTME: pulse-sync command-line tool for running the sync pipeline and managing tokens
// ABOUTME: Polls a provider, prints canonical records as JSON, and drives the OAuth code exchange
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
//!
//! Usage:
//! ```bash
//! # Poll the synthesized activity service for three ticks
//! pulse-sync run --provider activity_service --ticks 3
//!
//! # Authorize the cloud fitness provider
//! pulse-sync authorize-url
//! pulse-sync exchange-code --code 4/0Axyz...
//!
//! # Show stored tokens (secrets are never printed)
//! pulse-sync tokens
//!
//! # Ask the plan generator for a structured nutrition plan
//! pulse-sync plan --category nutrition --sport football --goal endurance --structured
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_sync::config::SyncConfig;
use pulse_sync::logging::LoggingConfig;
use pulse_sync::models::ProviderId;
use pulse_sync::pipeline::Pipeline;
use pulse_sync::plan_generation::{
    GenerativeLanguageClient, PlanCategory, PlanGenerator, PlanRequest, PlanResponse,
    SubjectContext,
};
use pulse_sync::remote_sync::InMemoryDocumentStore;
use pulse_providers::LoggingLauncher;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "pulse-sync",
    about = "Wearable sync and metrics aggregation",
    long_about = "Connects one wearable data source at a time, polls it on a fixed cadence and keeps a rolling history of canonical health records."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Connect a provider and poll it
    Run {
        /// Provider to connect (cloud_fitness, bluetooth, activity_service)
        #[arg(long, value_parser = parse_provider)]
        provider: ProviderId,

        /// Stop after this many poll periods; runs until Ctrl-C when omitted
        #[arg(long)]
        ticks: Option<u32>,
    },
    /// Print the authorization URL of an OAuth provider
    AuthorizeUrl {
        /// OAuth provider
        #[arg(long, value_parser = parse_provider, default_value = "cloud_fitness")]
        provider: ProviderId,
    },
    /// Exchange an authorization code for tokens
    ExchangeCode {
        /// OAuth provider
        #[arg(long, value_parser = parse_provider, default_value = "cloud_fitness")]
        provider: ProviderId,

        /// Code returned to the redirect URI
        #[arg(long)]
        code: String,
    },
    /// List stored tokens
    Tokens,
    /// Generate a plan
    Plan {
        /// nutrition, training, performance, insight, recovery or risk
        #[arg(long)]
        category: PlanCategory,

        /// Sport practiced
        #[arg(long)]
        sport: Option<String>,

        /// Position within the sport
        #[arg(long)]
        position: Option<String>,

        /// Goal
        #[arg(long)]
        goal: Option<String>,

        /// Request a JSON document instead of text
        #[arg(long)]
        structured: bool,
    },
}

fn parse_provider(raw: &str) -> Result<ProviderId, String> {
    raw.parse().map_err(|e: pulse_sync::errors::ProviderError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        "debug".clone_into(&mut logging.level);
    }
    logging.init()?;

    let config = SyncConfig::from_env();
    config.log_summary();

    match cli.command {
        Command::Run { provider, ticks } => run(config, provider, ticks).await,
        Command::AuthorizeUrl { provider } => authorize_url(config, provider),
        Command::ExchangeCode { provider, code } => exchange_code(config, provider, &code).await,
        Command::Tokens => list_tokens(config).await,
        Command::Plan {
            category,
            sport,
            position,
            goal,
            structured,
        } => {
            let request = PlanRequest {
                category,
                subject_context: SubjectContext {
                    sport,
                    position,
                    goal,
                    ..SubjectContext::default()
                },
                structured_output: structured,
            };
            plan(&config, &request).await
        }
    }
}

fn build(config: SyncConfig) -> Result<Pipeline> {
    Pipeline::build(
        config,
        Arc::new(LoggingLauncher),
        Arc::new(InMemoryDocumentStore::new()),
    )
    .context("failed to build sync pipeline")
}

async fn run(config: SyncConfig, provider: ProviderId, ticks: Option<u32>) -> Result<()> {
    let period = config.poll_interval;
    let pipeline = build(config)?;
    let engine = &pipeline.engine;

    engine.attach_remote().await?;
    let handle = engine.connect(provider).await?;
    info!(provider = %provider, session_id = %handle.session_id, "Connected");

    let shutdown = tokio::signal::ctrl_c();
    match ticks {
        Some(n) => {
            let deadline = period * n;
            tokio::select! {
                () = tokio::time::sleep(deadline) => {}
                result = shutdown => result?,
            }
        }
        None => shutdown.await?,
    }

    let connection = engine.connection(provider);
    let current = engine.store().current();
    let history = engine.store().history();
    engine.shutdown().await;

    let output = json!({
        "provider": provider,
        "connection": connection,
        "current": current,
        "history": history,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn authorize_url(config: SyncConfig, provider: ProviderId) -> Result<()> {
    let pipeline = build(config)?;
    let state = format!("{provider}:{}", Uuid::new_v4());
    let url = pipeline
        .tokens
        .client_config(provider)?
        .authorization_url(&state)?;
    println!("{url}");
    Ok(())
}

async fn exchange_code(config: SyncConfig, provider: ProviderId, code: &str) -> Result<()> {
    let pipeline = build(config)?;
    let token = pipeline
        .tokens
        .exchange_authorization_code(provider, code)
        .await?;
    println!(
        "Stored {} token (refresh token: {})",
        token.provider.display_name(),
        if token.refresh_token.is_some() { "yes" } else { "no" }
    );
    Ok(())
}

async fn list_tokens(config: SyncConfig) -> Result<()> {
    let pipeline = build(config)?;
    let tokens = pipeline.tokens.list_tokens().await?;
    if tokens.is_empty() {
        warn!("No tokens stored");
    }
    let rows: Vec<_> = tokens
        .iter()
        .map(|t| {
            json!({
                "provider": t.provider,
                "obtainedAt": t.obtained_at,
                "refreshedAt": t.refreshed_at,
                "hasRefreshToken": t.refresh_token.is_some(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

async fn plan(config: &SyncConfig, request: &PlanRequest) -> Result<()> {
    let client = GenerativeLanguageClient::from_config(&config.plan_generation)?;
    match client.generate(request).await? {
        PlanResponse::Text(text) => println!("{text}"),
        PlanResponse::Structured(document) => {
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
    }
    Ok(())
}
