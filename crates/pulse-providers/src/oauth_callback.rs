// ABOUTME: Delivers OAuth redirect results posted from a separate browser context
// ABOUTME: Validates message origin and resolves exactly one pending flow per provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth Callback Hub
//!
//! The authorization redirect lands in a context this process does not own.
//! That context posts a [`CallbackEnvelope`] carrying its origin and an
//! [`OAuthCallbackMessage`]. The hub trusts the payload only when the origin
//! matches the application's own origin; anything else is dropped without
//! touching state.
//!
//! A connect call registers a pending flow with [`OAuthCallbackHub::begin`]
//! and awaits [`PendingAuthorization::wait`], which resolves on the first
//! matching callback or fails after the configured timeout. A callback
//! matches only when it echoes the `state` value of the pending flow.

use async_trait::async_trait;
use pulse_core::constants::oauth::CALLBACK_MESSAGE_TYPE;
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::ProviderId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::{Origin, Url};
use uuid::Uuid;

/// A message posted from another browsing context, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    /// Origin of the posting context, e.g. `http://localhost:3000`
    pub origin: String,
    /// Untrusted message body
    pub data: Value,
}

/// Body of an `oauth_callback` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthCallbackMessage {
    /// Always `oauth_callback`
    #[serde(rename = "type")]
    pub message_type: String,
    /// Provider the flow was started for
    pub provider: ProviderId,
    /// Whether the user granted access
    pub success: bool,
    /// Access token, for implicit-style flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Authorization code to exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `state` value echoed back by the authorization redirect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl OAuthCallbackMessage {
    /// Successful callback carrying an authorization code
    #[must_use]
    pub fn with_code(provider: ProviderId, code: impl Into<String>) -> Self {
        Self {
            message_type: CALLBACK_MESSAGE_TYPE.to_owned(),
            provider,
            success: true,
            token: None,
            code: Some(code.into()),
            error: None,
            state: None,
        }
    }

    /// Failed callback
    #[must_use]
    pub fn denied(provider: ProviderId, error: impl Into<String>) -> Self {
        Self {
            message_type: CALLBACK_MESSAGE_TYPE.to_owned(),
            provider,
            success: false,
            token: None,
            code: None,
            error: Some(error.into()),
            state: None,
        }
    }

    /// Attach the echoed `state` value
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// What a successful flow produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationGrant {
    /// Authorization code that still needs exchanging
    Code(String),
    /// Access token delivered directly
    Token(String),
}

/// Outcome of offering an envelope to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Handed to the waiting flow
    Delivered,
    /// Origin differs from the application origin; ignored
    OriginMismatch,
    /// Body is not a well-formed callback message; ignored
    Malformed,
    /// Body is some other message type; ignored
    UnexpectedType,
    /// No flow is waiting for this provider; ignored
    NoPendingFlow,
    /// `state` does not belong to the pending flow; ignored
    StateMismatch,
}

type Outcome = ProviderResult<AuthorizationGrant>;
type PendingFlows = Arc<Mutex<HashMap<ProviderId, (Uuid, oneshot::Sender<Outcome>)>>>;

/// Routes validated callbacks to the flow waiting on them
#[derive(Debug, Clone)]
pub struct OAuthCallbackHub {
    expected_origin: Origin,
    timeout: Duration,
    pending: PendingFlows,
}

impl OAuthCallbackHub {
    /// Hub accepting messages from `app_origin` only
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `app_origin` is not a valid URL.
    pub fn new(app_origin: &str, timeout: Duration) -> ProviderResult<Self> {
        let url = Url::parse(app_origin).map_err(|e| ProviderError::ConfigurationError {
            provider: "oauth_callback".to_owned(),
            details: format!("invalid application origin {app_origin}: {e}"),
        })?;
        Ok(Self {
            expected_origin: url.origin(),
            timeout,
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Timeout applied to every pending flow
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a pending flow for `provider`
    ///
    /// A flow already pending for the same provider is superseded; its waiter
    /// resolves as denied.
    #[must_use]
    pub fn begin(&self, provider: ProviderId) -> PendingAuthorization {
        let (tx, rx) = oneshot::channel();
        let flow_id = Uuid::new_v4();
        if let Ok(mut pending) = self.pending.lock() {
            if pending.insert(provider, (flow_id, tx)).is_some() {
                debug!(provider = %provider, "Superseded earlier pending authorization");
            }
        }
        PendingAuthorization {
            provider,
            flow_id,
            timeout: self.timeout,
            receiver: rx,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Whether a flow is waiting for `provider`
    #[must_use]
    pub fn is_pending(&self, provider: ProviderId) -> bool {
        self.pending
            .lock()
            .is_ok_and(|pending| pending.contains_key(&provider))
    }

    /// Offer a posted message to the waiting flow
    pub fn deliver(&self, envelope: &CallbackEnvelope) -> CallbackDisposition {
        if !self.origin_matches(&envelope.origin) {
            warn!(origin = %envelope.origin, "Ignoring OAuth callback from unexpected origin");
            return CallbackDisposition::OriginMismatch;
        }

        if envelope.data.get("type").and_then(Value::as_str) != Some(CALLBACK_MESSAGE_TYPE) {
            return CallbackDisposition::UnexpectedType;
        }

        let message: OAuthCallbackMessage = match serde_json::from_value(envelope.data.clone()) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed OAuth callback");
                return CallbackDisposition::Malformed;
            }
        };

        let Some(outcome) = Self::outcome_of(&message) else {
            warn!(provider = %message.provider, "OAuth callback carried neither code nor token");
            return CallbackDisposition::Malformed;
        };

        let Ok(mut pending) = self.pending.lock() else {
            return CallbackDisposition::NoPendingFlow;
        };
        let Some((flow_id, _)) = pending.get(&message.provider) else {
            debug!(provider = %message.provider, "OAuth callback with no pending flow");
            return CallbackDisposition::NoPendingFlow;
        };
        if message.state.as_deref() != Some(flow_state(message.provider, *flow_id).as_str()) {
            warn!(provider = %message.provider, "Ignoring OAuth callback with foreign state");
            return CallbackDisposition::StateMismatch;
        }
        let Some((flow_id, sender)) = pending.remove(&message.provider) else {
            return CallbackDisposition::NoPendingFlow;
        };
        drop(pending);

        info!(
            provider = %message.provider,
            flow_id = %flow_id,
            success = message.success,
            "Delivering OAuth callback"
        );
        if sender.send(outcome).is_err() {
            return CallbackDisposition::NoPendingFlow;
        }
        CallbackDisposition::Delivered
    }

    fn origin_matches(&self, origin: &str) -> bool {
        Url::parse(origin).is_ok_and(|url| url.origin() == self.expected_origin)
    }

    fn outcome_of(message: &OAuthCallbackMessage) -> Option<Outcome> {
        if !message.success {
            return Some(Err(ProviderError::AuthorizationDenied {
                provider: message.provider.to_string(),
                reason: message
                    .error
                    .clone()
                    .unwrap_or_else(|| "access denied".to_owned()),
            }));
        }
        message
            .code
            .clone()
            .map(AuthorizationGrant::Code)
            .or_else(|| message.token.clone().map(AuthorizationGrant::Token))
            .map(Ok)
    }
}

fn flow_state(provider: ProviderId, flow_id: Uuid) -> String {
    format!("{provider}:{flow_id}")
}

/// A flow waiting for its callback
#[derive(Debug)]
pub struct PendingAuthorization {
    provider: ProviderId,
    flow_id: Uuid,
    timeout: Duration,
    receiver: oneshot::Receiver<Outcome>,
    pending: PendingFlows,
}

impl PendingAuthorization {
    /// Provider the flow belongs to
    #[must_use]
    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Opaque state value to carry through the authorization redirect
    #[must_use]
    pub fn state(&self) -> String {
        flow_state(self.provider, self.flow_id)
    }

    /// Await the callback
    ///
    /// # Errors
    ///
    /// Returns `AuthorizationDenied` when the user declined or the flow was
    /// superseded, and `AuthorizationTimeout` when nothing arrived in time.
    pub async fn wait(self) -> ProviderResult<AuthorizationGrant> {
        match tokio::time::timeout(self.timeout, self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ProviderError::AuthorizationDenied {
                provider: self.provider.to_string(),
                reason: "authorization flow was superseded".to_owned(),
            }),
            Err(_) => {
                if let Ok(mut pending) = self.pending.lock() {
                    if pending
                        .get(&self.provider)
                        .is_some_and(|(id, _)| *id == self.flow_id)
                    {
                        pending.remove(&self.provider);
                    }
                }
                warn!(
                    provider = %self.provider,
                    timeout_secs = self.timeout.as_secs(),
                    "Authorization flow abandoned"
                );
                Err(ProviderError::AuthorizationTimeout {
                    provider: self.provider.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Opens the authorization URL in an external browsing context
#[async_trait]
pub trait AuthorizationLauncher: Send + Sync {
    /// Present `url` to the user
    ///
    /// # Errors
    ///
    /// Returns an error if the external context cannot be opened.
    async fn launch(&self, provider: ProviderId, url: &str) -> ProviderResult<()>;
}

/// Launcher that logs the URL for the operator to open by hand
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingLauncher;

#[async_trait]
impl AuthorizationLauncher for LoggingLauncher {
    async fn launch(&self, provider: ProviderId, url: &str) -> ProviderResult<()> {
        info!(provider = %provider, url = %url, "Open this URL to authorize access");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hub(timeout: Duration) -> OAuthCallbackHub {
        OAuthCallbackHub::new("http://localhost:3000", timeout).unwrap()
    }

    fn envelope(origin: &str, message: &OAuthCallbackMessage) -> CallbackEnvelope {
        CallbackEnvelope {
            origin: origin.to_owned(),
            data: serde_json::to_value(message).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_matching_origin_delivers_code() {
        let hub = hub(Duration::from_secs(5));
        let pending = hub.begin(ProviderId::CloudFitness);
        let message = OAuthCallbackMessage::with_code(ProviderId::CloudFitness, "abc")
            .with_state(pending.state());

        assert_eq!(
            hub.deliver(&envelope("http://localhost:3000", &message)),
            CallbackDisposition::Delivered
        );
        assert_eq!(
            pending.wait().await.unwrap(),
            AuthorizationGrant::Code("abc".to_owned())
        );
    }

    #[test]
    fn test_mismatched_origin_changes_nothing() {
        let hub = hub(Duration::from_secs(5));
        let pending = hub.begin(ProviderId::CloudFitness);
        let message = OAuthCallbackMessage::with_code(ProviderId::CloudFitness, "abc")
            .with_state(pending.state());

        assert_eq!(
            hub.deliver(&envelope("https://evil.example.com", &message)),
            CallbackDisposition::OriginMismatch
        );
        assert!(hub.is_pending(ProviderId::CloudFitness));
    }

    #[test]
    fn test_other_message_types_are_ignored() {
        let hub = hub(Duration::from_secs(5));
        let _pending = hub.begin(ProviderId::CloudFitness);
        let other = CallbackEnvelope {
            origin: "http://localhost:3000".to_owned(),
            data: json!({"type": "resize", "width": 400}),
        };
        assert_eq!(hub.deliver(&other), CallbackDisposition::UnexpectedType);
        assert!(hub.is_pending(ProviderId::CloudFitness));
    }

    #[tokio::test]
    async fn test_denied_callback_surfaces_error() {
        let hub = hub(Duration::from_secs(5));
        let pending = hub.begin(ProviderId::CloudFitness);
        let message = OAuthCallbackMessage::denied(ProviderId::CloudFitness, "access_denied")
            .with_state(pending.state());
        hub.deliver(&envelope("http://localhost:3000", &message));

        let result = pending.wait().await;
        assert!(matches!(
            result,
            Err(ProviderError::AuthorizationDenied { ref reason, .. }) if reason == "access_denied"
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out_and_releases_slot() {
        let hub = hub(Duration::from_millis(20));
        let pending = hub.begin(ProviderId::CloudFitness);
        let result = pending.wait().await;
        assert!(matches!(
            result,
            Err(ProviderError::AuthorizationTimeout { .. })
        ));
        assert!(!hub.is_pending(ProviderId::CloudFitness));
    }

    #[tokio::test]
    async fn test_new_flow_supersedes_old() {
        let hub = hub(Duration::from_secs(5));
        let first = hub.begin(ProviderId::CloudFitness);
        let _second = hub.begin(ProviderId::CloudFitness);
        assert!(matches!(
            first.wait().await,
            Err(ProviderError::AuthorizationDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_foreign_or_missing_state_is_ignored() {
        let hub = hub(Duration::from_secs(5));
        let stale = hub.begin(ProviderId::CloudFitness);
        let stale_state = stale.state();
        let pending = hub.begin(ProviderId::CloudFitness);

        let unbound = OAuthCallbackMessage::with_code(ProviderId::CloudFitness, "abc");
        assert_eq!(
            hub.deliver(&envelope("http://localhost:3000", &unbound)),
            CallbackDisposition::StateMismatch
        );
        let replayed = unbound.clone().with_state(stale_state);
        assert_eq!(
            hub.deliver(&envelope("http://localhost:3000", &replayed)),
            CallbackDisposition::StateMismatch
        );
        assert!(hub.is_pending(ProviderId::CloudFitness));

        let bound = unbound.with_state(pending.state());
        assert_eq!(
            hub.deliver(&envelope("http://localhost:3000", &bound)),
            CallbackDisposition::Delivered
        );
        assert_eq!(
            pending.wait().await.unwrap(),
            AuthorizationGrant::Code("abc".to_owned())
        );
    }

    #[test]
    fn test_no_pending_flow() {
        let hub = hub(Duration::from_secs(5));
        let message = OAuthCallbackMessage::with_code(ProviderId::CloudFitness, "abc");
        assert_eq!(
            hub.deliver(&envelope("http://localhost:3000", &message)),
            CallbackDisposition::NoPendingFlow
        );
    }
}
