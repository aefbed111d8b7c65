//! HTTP client for the provider's token endpoint.

use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::metrics::observe_request;
use crate::state::TokenPair;

/// Token exchange grant type (RFC 8693).
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Access-token token type URN (RFC 8693).
pub const TOKEN_TYPE_ACCESS: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Token endpoint response. The token endpoint may omit `refresh_token`
/// on exchange grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Client-credentialed access to the provider's token endpoint.
pub struct TokenClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
        }
    }

    /// Trade a refresh token for a new access/refresh pair
    /// (`grant_type=refresh_token`).
    pub async fn refresh_grant(
        &self,
        token_url: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        let start = Instant::now();
        let response = self.http.post(token_url).form(&params).send().await?;
        let status = response.status();
        observe_request(
            "refresh_token".to_string(),
            start.elapsed().as_secs_f64(),
            status.as_u16(),
        );

        if !status.is_success() {
            warn!(code = status.as_u16(), "Refresh grant rejected");
            // invalid_grant means the provider no longer honors this
            // refresh token; the principal must log in again.
            if status == reqwest::StatusCode::BAD_REQUEST
                || status == reqwest::StatusCode::UNAUTHORIZED
            {
                return Err(AuthError::RefreshTokenExpired);
            }
            return Err(AuthError::InvalidCredentials);
        }

        let body: TokenResponse = response.json().await?;
        match (body.access_token, body.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(TokenPair {
                access_token,
                refresh_token,
            }),
            _ => {
                warn!("Refresh grant response missing token fields");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Exchange a subject token for an access token scoped to `audience`
    /// (`grant_type=urn:ietf:params:oauth:grant-type:token-exchange`).
    pub async fn exchange_grant(
        &self,
        token_url: &str,
        subject_token: &str,
        audience: &str,
    ) -> Result<String, AuthError> {
        let params = [
            ("grant_type", GRANT_TYPE_TOKEN_EXCHANGE),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("subject_token", subject_token),
            ("subject_token_type", TOKEN_TYPE_ACCESS),
            ("requested_token_type", TOKEN_TYPE_ACCESS),
            ("audience", audience),
        ];

        let request_label = format!("exchange_token_{}", audience);
        let start = Instant::now();
        let response = self.http.post(token_url).form(&params).send().await?;
        let status = response.status();
        let elapsed = start.elapsed().as_secs_f64();
        observe_request(request_label, elapsed, status.as_u16());

        if !status.is_success() {
            warn!(
                audience = %audience,
                code = status.as_u16(),
                elapsed_secs = elapsed,
                "Token exchange rejected"
            );
            return Err(AuthError::ExchangeFailure {
                audience: audience.to_string(),
                reason: format!("token endpoint returned status {}", status),
            });
        }

        let body: TokenResponse = response.json().await?;
        match body.access_token {
            Some(token) => {
                debug!(audience = %audience, elapsed_secs = elapsed, "Token exchanged");
                Ok(token)
            }
            None => {
                warn!(audience = %audience, "Exchange response missing 'access_token'");
                Err(AuthError::ExchangeFailure {
                    audience: audience.to_string(),
                    reason: "response missing 'access_token'".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client() -> TokenClient {
        TokenClient::new(
            reqwest::Client::new(),
            "hub-client".to_string(),
            "secret".to_string(),
        )
    }

    #[tokio::test]
    async fn test_refresh_grant_returns_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
            })))
            .mount(&server)
            .await;

        let pair = test_client()
            .refresh_grant(&format!("{}/token", server.uri()), "old-refresh")
            .await
            .unwrap();
        assert_eq!(pair.access_token, "new-access");
        assert_eq!(pair.refresh_token, "new-refresh");
    }

    #[tokio::test]
    async fn test_refresh_grant_invalid_grant_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
            })))
            .mount(&server)
            .await;

        let err = test_client()
            .refresh_grant(&format!("{}/token", server.uri()), "stale")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenExpired));
    }

    #[tokio::test]
    async fn test_exchange_grant_sends_rfc8693_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Atoken-exchange",
            ))
            .and(body_string_contains("audience=svc-a"))
            .and(body_string_contains("subject_token=primary-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "svc-a-token",
            })))
            .mount(&server)
            .await;

        let token = test_client()
            .exchange_grant(&format!("{}/token", server.uri()), "primary-access", "svc-a")
            .await
            .unwrap();
        assert_eq!(token, "svc-a-token");
    }

    #[tokio::test]
    async fn test_exchange_grant_missing_access_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let err = test_client()
            .exchange_grant(&format!("{}/token", server.uri()), "primary-access", "svc-a")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailure { ref audience, .. } if audience == "svc-a"));
    }
}
