// ABOUTME: Retry-once-after-refresh policy for provider calls rejected with 401
// ABOUTME: Keeps the re-authorization rule testable apart from any HTTP code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::ProviderId;
use std::future::Future;
use tracing::{debug, warn};

/// Run `operation`, refreshing the token and retrying exactly once on a 401
///
/// `operation` receives the access token to use. When it fails with
/// `ProviderError::Unauthorized`, `refresh` is awaited once for a new token and
/// `operation` is retried once with it. A second 401 becomes
/// `ProviderError::AuthExpired` with no further refresh. Any other error, on
/// either attempt or from `refresh`, is returned unchanged.
///
/// # Errors
///
/// Returns the operation's error, the refresh error, or `AuthExpired`.
pub async fn with_single_reauth<T, Op, OpFut, Refresh, RefreshFut>(
    provider: ProviderId,
    access_token: String,
    mut operation: Op,
    refresh: Refresh,
) -> ProviderResult<T>
where
    Op: FnMut(String) -> OpFut,
    OpFut: Future<Output = ProviderResult<T>>,
    Refresh: FnOnce() -> RefreshFut,
    RefreshFut: Future<Output = ProviderResult<String>>,
{
    match operation(access_token).await {
        Err(ProviderError::Unauthorized { .. }) => {
            debug!(provider = %provider, "Access token rejected, refreshing once");
        }
        outcome => return outcome,
    }

    let refreshed = refresh().await?;

    match operation(refreshed).await {
        Err(ProviderError::Unauthorized { .. }) => {
            warn!(provider = %provider, "Access token rejected again after refresh");
            Err(ProviderError::AuthExpired {
                provider: provider.to_string(),
            })
        }
        outcome => outcome,
    }
}
