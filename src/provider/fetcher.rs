//! Background task that fetches provider configuration until it succeeds.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::provider::discovery::fetch_provider_config;
use crate::provider::handle::ProviderHandle;

/// Spawn the discovery task.
///
/// Retries the discovery/JWKS fetch after `discovery_retry_secs` on any
/// failure, forever; errors never escape the task. On the first success the
/// configuration is published through `handle` and the task exits. The
/// `shutdown` channel stops the loop early during host teardown.
pub fn spawn_discovery_task(
    handle: Arc<ProviderHandle>,
    client: reqwest::Client,
    config: Arc<AuthConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let retry_delay = Duration::from_secs(config.discovery_retry_secs);

        loop {
            match fetch_provider_config(&client, &config).await {
                Ok(provider) => {
                    info!(
                        issuer = %config.issuer,
                        signature_check = config.check_signature,
                        "Provider configuration fetched"
                    );
                    handle.publish(provider);
                    return;
                }
                Err(e) => {
                    warn!(
                        issuer = %config.issuer,
                        error = %e,
                        retry_secs = config.discovery_retry_secs,
                        "Failed to fetch provider configuration, will retry"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(retry_delay) => {}
                _ = shutdown.changed() => {
                    debug!("Discovery task stopped by shutdown signal");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(issuer: String, retry_secs: u64) -> Arc<AuthConfig> {
        Arc::new(AuthConfig {
            issuer,
            client_id: "hub-client".to_string(),
            client_secret: "secret".to_string(),
            check_signature: false,
            discovery_retry_secs: retry_secs,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_publishes_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization_endpoint": format!("{}/auth", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            })))
            .mount(&server)
            .await;

        let handle = Arc::new(ProviderHandle::new());
        let (_tx, rx) = watch::channel(false);
        let task = spawn_discovery_task(
            Arc::clone(&handle),
            reqwest::Client::new(),
            test_config(server.uri(), 1),
            rx,
        );

        task.await.unwrap();
        assert!(handle.is_ready());
    }

    #[tokio::test]
    async fn test_stays_not_ready_on_bad_document() {
        // Missing token_endpoint: the task keeps retrying, never publishes.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization_endpoint": format!("{}/auth", server.uri()),
                "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            })))
            .mount(&server)
            .await;

        let handle = Arc::new(ProviderHandle::new());
        let (tx, rx) = watch::channel(false);
        let task = spawn_discovery_task(
            Arc::clone(&handle),
            reqwest::Client::new(),
            test_config(server.uri(), 60),
            rx,
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_ready());

        // Shutdown signal ends the retry loop cleanly.
        tx.send(true).unwrap();
        task.await.unwrap();
        assert!(!handle.is_ready());
    }
}
