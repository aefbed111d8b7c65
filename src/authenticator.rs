//! The authenticator facade consumed by the host platform.
//!
//! Three integration points: `authenticate` at login, `refresh_user` on the
//! host's freshness schedule, and `pre_spawn_start` right before a workload
//! is provisioned. All of them fail closed until the discovery task has
//! published the provider configuration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::authz::AuthzPolicy;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::exchange::{exchange_all, TokenClient};
use crate::metrics::MethodTimer;
use crate::provider::{spawn_discovery_task, ProviderConfig, ProviderHandle};
use crate::refresh::{evaluate, RefreshDecision};
use crate::state::{AuthResult, AuthState, Credentials};
use crate::token::validator::{decode, unix_now, DecodeOptions, DecodedToken};
use crate::token::{ResourceAccessRoles, RoleExtractor};

/// OIDC authenticator and token-lifecycle manager.
pub struct Authenticator {
    config: Arc<AuthConfig>,
    policy: AuthzPolicy,
    provider: Arc<ProviderHandle>,
    token_client: TokenClient,
    role_extractor: Box<dyn RoleExtractor>,
    /// Per-principal serialization of refresh attempts. Refresh tokens are
    /// single-use at most providers; two concurrent grants for one
    /// principal would invalidate each other.
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Authenticator {
    /// Create the authenticator and start its discovery task.
    ///
    /// The task retries the provider fetch forever; every inbound call is
    /// rejected with [`AuthError::ProviderNotConfigured`] until it first
    /// succeeds. Must be called from within a tokio runtime. The returned
    /// handle completes once the configuration is published.
    pub fn new(config: AuthConfig) -> anyhow::Result<(Self, tokio::task::JoinHandle<()>)> {
        let extractor = Box::new(ResourceAccessRoles::new(config.client_id.clone()));
        Self::with_role_extractor(config, extractor)
    }

    /// Like [`Authenticator::new`] with a custom role-extraction strategy.
    pub fn with_role_extractor(
        config: AuthConfig,
        role_extractor: Box<dyn RoleExtractor>,
    ) -> anyhow::Result<(Self, tokio::task::JoinHandle<()>)> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let config = Arc::new(config);
        let provider = Arc::new(ProviderHandle::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = spawn_discovery_task(
            Arc::clone(&provider),
            http.clone(),
            Arc::clone(&config),
            shutdown_rx,
        );

        let token_client = TokenClient::new(
            http,
            config.client_id.clone(),
            config.client_secret.clone(),
        );

        Ok((
            Self {
                policy: AuthzPolicy::from_config(&config),
                token_client,
                provider,
                role_extractor,
                refresh_locks: Mutex::new(HashMap::new()),
                shutdown_tx,
                config,
            },
            task,
        ))
    }

    /// Whether the provider configuration has been fetched.
    pub fn is_ready(&self) -> bool {
        self.provider.is_ready()
    }

    /// Stop the discovery task during host teardown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Logout redirect target, when the provider advertises one.
    pub fn end_session_url(&self) -> Option<String> {
        self.provider
            .get()
            .ok()
            .and_then(|p| p.end_session_url.clone())
    }

    /// Validate a token pair obtained by the host's login flow and build
    /// the principal's authentication state.
    pub async fn authenticate(&self, credentials: Credentials) -> Result<AuthResult, AuthError> {
        let _timer = MethodTimer::start("authenticate");

        let provider = self.provider.get()?;

        let decoded = decode(
            &credentials.access_token,
            &provider,
            &self.verify_options(),
        )?;

        let roles = self
            .role_extractor
            .extract(&decoded.claims)
            .unwrap_or_default();

        let decision = self.policy.authorize(&roles);
        if !decision.allowed {
            info!(roles = ?roles, "Login rejected: no accepted role");
            return Err(AuthError::Unauthorized);
        }

        let name = self.principal_name(&decoded)?;

        let exchanged_tokens = self
            .exchange_for_audiences(&provider.token_url, &credentials.access_token)
            .await?;

        let mut role_list: Vec<String> = roles.into_iter().collect();
        role_list.sort();

        info!(
            user = %name,
            roles = ?role_list,
            admin = decision.is_admin,
            "Authentication successful"
        );

        Ok(AuthResult {
            name,
            admin: decision.is_admin,
            auth_state: AuthState {
                access_token: credentials.access_token,
                refresh_token: credentials.refresh_token,
                roles: role_list,
                exchanged_tokens,
            },
        })
    }

    /// Inspect a principal's stored state and refresh it when due.
    ///
    /// Returns the state to keep (`Some`) or `None` when the principal must
    /// re-authenticate from scratch. A `Valid` pair is returned unchanged
    /// without any network call, so repeated invocations are idempotent.
    pub async fn refresh_user(
        &self,
        name: &str,
        auth_state: &AuthState,
    ) -> Result<Option<AuthState>, AuthError> {
        let _timer = MethodTimer::start("refresh_user");

        let provider = self.provider.get()?;

        let lock = self.refresh_lock(name);
        let _guard = lock.lock().await;

        let inspect = DecodeOptions::claims_only(self.config.algorithms());
        let access = match decode(&auth_state.access_token, &provider, &inspect) {
            Ok(token) => token,
            Err(e) => {
                warn!(user = %name, error = %e, "Stored access token unreadable");
                return Ok(None);
            }
        };
        // Refresh tokens are opaque to some providers; a decode failure
        // only means the expiry cannot be inspected.
        let refresh_exp = decode(&auth_state.refresh_token, &provider, &inspect)
            .ok()
            .and_then(|t| t.expires_at);

        let decision = evaluate(
            access.expires_at,
            refresh_exp,
            unix_now(),
            self.config.refresh_margin_secs,
            self.config.refresh_without_exp_valid,
        );

        match decision {
            RefreshDecision::Valid => {
                debug!(user = %name, "Access token still valid, refresh skipped");
                Ok(Some(auth_state.clone()))
            }
            RefreshDecision::Expired => {
                info!(user = %name, "Refresh token expired, re-authentication required");
                Ok(None)
            }
            RefreshDecision::NeedsRefresh => self.perform_refresh(name, &provider, auth_state).await,
        }
    }

    /// Hand the current tokens and roles to a spawn hook.
    ///
    /// The hook receives environment-variable style key/value pairs:
    /// `ACCESS_TOKEN`, `USER_ROLES` (comma-joined) and one
    /// `EXCHANGED_TOKEN_<AUDIENCE>` per exchanged audience. What the
    /// workload does with them is the host's concern.
    pub fn pre_spawn_start<F>(&self, auth_state: &AuthState, mut inject: F)
    where
        F: FnMut(&str, &str),
    {
        let _timer = MethodTimer::start("pre_spawn_start");

        inject("ACCESS_TOKEN", &auth_state.access_token);
        inject("USER_ROLES", &auth_state.roles.join(","));

        for (audience, token) in &auth_state.exchanged_tokens {
            inject(&exchanged_token_key(audience), token);
        }
    }

    async fn perform_refresh(
        &self,
        name: &str,
        provider: &ProviderConfig,
        auth_state: &AuthState,
    ) -> Result<Option<AuthState>, AuthError> {
        let pair = match self
            .token_client
            .refresh_grant(&provider.token_url, &auth_state.refresh_token)
            .await
        {
            Ok(pair) => pair,
            Err(AuthError::RefreshTokenExpired) => {
                info!(user = %name, "Provider rejected the refresh token");
                return Ok(None);
            }
            Err(e) => {
                warn!(user = %name, error = %e, "Refresh grant failed");
                return Err(e);
            }
        };

        // The provider minted this pair a moment ago; a validation failure
        // here means the session cannot be trusted.
        let decoded = decode(&pair.access_token, provider, &self.verify_options())?;
        let roles = self
            .role_extractor
            .extract(&decoded.claims)
            .unwrap_or_default();

        let exchanged_tokens = self
            .exchange_for_audiences(&provider.token_url, &pair.access_token)
            .await?;

        let mut role_list: Vec<String> = roles.into_iter().collect();
        role_list.sort();

        info!(user = %name, "Tokens refreshed");

        Ok(Some(AuthState {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            roles: role_list,
            exchanged_tokens,
        }))
    }

    /// Run the exchange fan-out and apply the completeness policy.
    async fn exchange_for_audiences(
        &self,
        token_url: &str,
        subject_token: &str,
    ) -> Result<HashMap<String, String>, AuthError> {
        let results = exchange_all(
            &self.token_client,
            token_url,
            subject_token,
            &self.config.exchange_audiences,
        )
        .await;

        let mut exchanged = HashMap::new();
        for (audience, result) in results {
            match result {
                Ok(token) => {
                    exchanged.insert(audience, token);
                }
                Err(e) if self.config.require_complete_exchange => return Err(e),
                Err(_) => {} // logged by the engine; entry simply omitted
            }
        }
        Ok(exchanged)
    }

    fn verify_options(&self) -> DecodeOptions {
        DecodeOptions {
            verify_signature: self.config.check_signature,
            verify_expiry: true,
            expected_audience: Some(self.config.client_id.clone()),
            expected_issuer: Some(self.config.issuer.clone()),
            algorithms: self.config.algorithms(),
        }
    }

    fn principal_name(&self, decoded: &DecodedToken) -> Result<String, AuthError> {
        decoded
            .claims
            .get(&self.config.username_claim)
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| decoded.subject.clone())
            .ok_or(AuthError::InvalidCredentials)
    }

    fn refresh_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.refresh_locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// Environment key for an exchanged token, e.g. `EXCHANGED_TOKEN_SVC_A`.
fn exchanged_token_key(audience: &str) -> String {
    let mut key = String::from("EXCHANGED_TOKEN_");
    for c in audience.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_uppercase());
        } else {
            key.push('_');
        }
    }
    key
}
