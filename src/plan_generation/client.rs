// ABOUTME: Generative language API client implementing the plan generator contract
// ABOUTME: Posts generateContent requests and interprets the first candidate's text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{interpret_response, MalformedPolicy, PlanGenerator, PlanRequest, PlanResponse};
use crate::config::PlanGenerationConfig;
use async_trait::async_trait;
use pulse_core::constants::plan_generation::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use pulse_core::errors::{AppError, AppResult};
use pulse_providers::shared_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use tracing::{debug, error, instrument};

const SERVICE_NAME: &str = "plan_generation";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Plan generator backed by the generative language REST API
#[derive(Clone)]
pub struct GenerativeLanguageClient {
    api_key: String,
    base_url: String,
    model: String,
    policy: MalformedPolicy,
    client: Client,
}

impl GenerativeLanguageClient {
    /// Client for `api_key` with the default model and endpoint
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            policy: MalformedPolicy::Fallback,
            client: shared_client().clone(),
        }
    }

    /// Client from environment configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when no API key is configured.
    pub fn from_config(config: &PlanGenerationConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::config("PLAN_GENERATION_API_KEY is not set"))?;
        Ok(Self::new(api_key)
            .with_model(config.model.clone())
            .with_base_url(config.base_url.clone()))
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Use a dedicated HTTP client
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Return `MalformedResponse` instead of falling back to defaults
    #[must_use]
    pub const fn surfacing_errors(mut self) -> Self {
        self.policy = MalformedPolicy::Surface;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn first_text(response: GenerateResponse) -> String {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlanGenerator for GenerativeLanguageClient {
    #[instrument(skip(self, request), fields(category = %request.category, model = %self.model))]
    async fn generate(&self, request: &PlanRequest) -> AppResult<PlanResponse> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_owned()),
                parts: vec![Part {
                    text: Some(request.prompt()),
                }],
            }],
            generation_config: request.structured_output.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        debug!("Requesting plan");
        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE_NAME, format!("request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .map_or_else(|| text.chars().take(256).collect(), |e| e.message);
            error!(status = %status, "Plan generation API error");
            return Err(AppError::external_service(
                SERVICE_NAME,
                format!("API error ({status}): {message}"),
            ));
        }

        let raw = match serde_json::from_str::<GenerateResponse>(&text) {
            Ok(parsed) => Self::first_text(parsed),
            Err(e) => {
                debug!(error = %e, "Plan generation envelope did not parse");
                String::new()
            }
        };
        interpret_response(request, &raw, self.policy)
    }
}

impl Debug for GenerativeLanguageClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerativeLanguageClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("policy", &self.policy)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
