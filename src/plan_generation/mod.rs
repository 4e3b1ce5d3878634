// ABOUTME: Plan-generation contract: categories, requests, responses and response interpretation
// ABOUTME: Malformed structured output falls back to a documented default per category
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Plan Generation
//!
//! Nutrition, training and other plans come from an external generative
//! language service. This module owns the request/response contract and how
//! raw model output is turned into a [`PlanResponse`]. Structured output that
//! cannot be parsed, or parses without the category's required keys, is
//! replaced by [`default_plan`] unless the caller asked to see the error.

/// HTTP client for the generative language service
pub mod client;

pub use client::GenerativeLanguageClient;

use async_trait::async_trait;
use pulse_core::errors::{AppError, AppResult, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Kind of plan being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanCategory {
    /// Meals and macronutrients
    Nutrition,
    /// Weekly training sessions
    Training,
    /// Performance review
    Performance,
    /// Short data-driven observations
    Insight,
    /// Recovery guidance
    Recovery,
    /// Injury and overtraining risk
    Risk,
}

impl PlanCategory {
    /// Every category
    pub const ALL: [Self; 6] = [
        Self::Nutrition,
        Self::Training,
        Self::Performance,
        Self::Insight,
        Self::Recovery,
        Self::Risk,
    ];

    /// Wire identifier
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nutrition => "nutrition",
            Self::Training => "training",
            Self::Performance => "performance",
            Self::Insight => "insight",
            Self::Recovery => "recovery",
            Self::Risk => "risk",
        }
    }

    /// Top-level keys a structured response must carry
    #[must_use]
    pub const fn required_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Nutrition => &["dailyCalories", "meals"],
            Self::Training => &["weeklySessions"],
            Self::Performance => &["summary"],
            Self::Insight => &["insights"],
            Self::Recovery => &["recommendations"],
            Self::Risk => &["riskLevel"],
        }
    }
}

impl fmt::Display for PlanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::invalid_input(format!("unknown plan category '{s}'")))
    }
}

/// Who the plan is for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectContext {
    /// Sport practiced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    /// Position or discipline within the sport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Stated goal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Any further attributes (age, weight, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// One plan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Plan kind
    pub category: PlanCategory,
    /// Subject the plan is for
    pub subject_context: SubjectContext,
    /// Ask for a JSON document instead of free text
    pub structured_output: bool,
}

impl PlanRequest {
    /// Prompt sent to the model
    #[must_use]
    pub fn prompt(&self) -> String {
        let mut prompt = format!("Create a {} plan for an athlete.", self.category);
        let ctx = &self.subject_context;
        for (label, value) in [
            ("Sport", &ctx.sport),
            ("Position", &ctx.position),
            ("Goal", &ctx.goal),
        ] {
            if let Some(value) = value {
                prompt.push_str(&format!("\n{label}: {value}"));
            }
        }
        for (key, value) in &ctx.extra {
            prompt.push_str(&format!("\n{key}: {value}"));
        }
        if self.structured_output {
            prompt.push_str(&format!(
                "\nRespond with a single JSON object shaped like: {}",
                default_plan(self.category)
            ));
        }
        prompt
    }
}

/// Interpreted model output
#[derive(Debug, Clone, PartialEq)]
pub enum PlanResponse {
    /// Free text
    Text(String),
    /// JSON document following the category schema
    Structured(Value),
}

/// What to do with output that cannot be interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Substitute the category default
    #[default]
    Fallback,
    /// Return `MalformedResponse` so the user can retry
    Surface,
}

/// Source of generated plans
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Generate a plan for `request`
    async fn generate(&self, request: &PlanRequest) -> AppResult<PlanResponse>;
}

/// Documented default for `category`, used when the model output is unusable
#[must_use]
pub fn default_plan(category: PlanCategory) -> Value {
    match category {
        PlanCategory::Nutrition => json!({
            "dailyCalories": 2200,
            "macros": { "proteinGrams": 120, "carbsGrams": 260, "fatGrams": 70 },
            "meals": [],
            "notes": ["Balanced intake placeholder; regenerate for a personalized plan."]
        }),
        PlanCategory::Training => json!({
            "focus": "general conditioning",
            "weeklySessions": [],
            "notes": ["Training plan unavailable; regenerate for a personalized plan."]
        }),
        PlanCategory::Performance => json!({
            "summary": "Not enough information to assess performance.",
            "strengths": [],
            "improvements": []
        }),
        PlanCategory::Insight => json!({ "insights": [] }),
        PlanCategory::Recovery => json!({
            "recoveryScore": null,
            "recommendations": []
        }),
        PlanCategory::Risk => json!({
            "riskLevel": "unknown",
            "factors": [],
            "recommendations": []
        }),
    }
}

/// Strip a surrounding Markdown code fence, with or without a language tag
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn raw model text into a response for `request`
///
/// # Errors
///
/// Returns `MalformedResponse` only under [`MalformedPolicy::Surface`].
pub fn interpret_response(
    request: &PlanRequest,
    raw: &str,
    policy: MalformedPolicy,
) -> AppResult<PlanResponse> {
    let body = strip_code_fences(raw);
    if !request.structured_output {
        if !body.is_empty() {
            return Ok(PlanResponse::Text(body.to_owned()));
        }
        return malformed(request.category, "empty response", policy);
    }

    match serde_json::from_str::<Value>(body) {
        Ok(document) => {
            let missing: Vec<&str> = request
                .category
                .required_keys()
                .iter()
                .copied()
                .filter(|key| document.get(key).is_none())
                .collect();
            if missing.is_empty() {
                Ok(PlanResponse::Structured(document))
            } else {
                malformed(
                    request.category,
                    &format!("missing keys: {}", missing.join(", ")),
                    policy,
                )
            }
        }
        Err(e) => malformed(request.category, &e.to_string(), policy),
    }
}

fn malformed(
    category: PlanCategory,
    details: &str,
    policy: MalformedPolicy,
) -> AppResult<PlanResponse> {
    match policy {
        MalformedPolicy::Surface => Err(AppError::new(
            ErrorCode::MalformedResponse,
            format!("{category} plan response unusable: {details}"),
        )),
        MalformedPolicy::Fallback => {
            warn!(category = %category, details, "Falling back to default plan");
            Ok(PlanResponse::Structured(default_plan(category)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(category: PlanCategory, structured_output: bool) -> PlanRequest {
        PlanRequest {
            category,
            subject_context: SubjectContext {
                sport: Some("football".to_owned()),
                position: Some("midfielder".to_owned()),
                goal: Some("endurance".to_owned()),
                extra: BTreeMap::new(),
            },
            structured_output,
        }
    }

    #[test]
    fn test_fenced_json_is_parsed() {
        let raw = "```json\n{\"riskLevel\": \"low\", \"factors\": []}\n```";
        let response =
            interpret_response(&request(PlanCategory::Risk, true), raw, MalformedPolicy::Fallback)
                .unwrap();
        assert_eq!(
            response,
            PlanResponse::Structured(json!({"riskLevel": "low", "factors": []}))
        );
    }

    #[test]
    fn test_unparseable_json_falls_back_to_default() {
        for category in PlanCategory::ALL {
            let response =
                interpret_response(&request(category, true), "not json {", MalformedPolicy::Fallback)
                    .unwrap();
            assert_eq!(response, PlanResponse::Structured(default_plan(category)));
        }
    }

    #[test]
    fn test_missing_required_keys_is_malformed() {
        let err = interpret_response(
            &request(PlanCategory::Nutrition, true),
            "{\"meals\": []}",
            MalformedPolicy::Surface,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedResponse);
        assert!(err.message.contains("dailyCalories"));
    }

    #[test]
    fn test_defaults_satisfy_their_own_schema() {
        for category in PlanCategory::ALL {
            let raw = default_plan(category).to_string();
            assert!(
                interpret_response(&request(category, true), &raw, MalformedPolicy::Surface)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_text_responses_are_trimmed() {
        let response = interpret_response(
            &request(PlanCategory::Insight, false),
            "  Sleep more.\n",
            MalformedPolicy::Surface,
        )
        .unwrap();
        assert_eq!(response, PlanResponse::Text("Sleep more.".to_owned()));
    }

    #[test]
    fn test_prompt_mentions_context_and_schema() {
        let prompt = request(PlanCategory::Training, true).prompt();
        assert!(prompt.contains("training plan"));
        assert!(prompt.contains("Position: midfielder"));
        assert!(prompt.contains("weeklySessions"));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Recovery".parse::<PlanCategory>().unwrap(), PlanCategory::Recovery);
        assert!("astrology".parse::<PlanCategory>().is_err());
    }
}
