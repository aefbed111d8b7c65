//! Concurrent fan-out of token exchanges across configured audiences.

use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::exchange::client::TokenClient;

/// Exchange `subject_token` for one scoped token per audience.
///
/// All requests are issued concurrently and the call waits for every one to
/// finish; one audience's failure neither cancels nor delays the others.
/// Results are keyed by audience name since completion order is arbitrary.
/// Whether a partial result set is acceptable is the caller's policy.
pub async fn exchange_all(
    client: &TokenClient,
    token_url: &str,
    subject_token: &str,
    audiences: &[String],
) -> HashMap<String, Result<String, AuthError>> {
    let requests = audiences.iter().map(|audience| async move {
        let result = client
            .exchange_grant(token_url, subject_token, audience)
            .await;
        (audience.clone(), result)
    });

    let results: HashMap<_, _> = join_all(requests).await.into_iter().collect();

    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, r)| r.is_err())
        .map(|(a, _)| a.as_str())
        .collect();
    if failed.is_empty() {
        debug!(audiences = results.len(), "All token exchanges succeeded");
    } else {
        warn!(failed = ?failed, total = results.len(), "Some token exchanges failed");
    }

    results
}
