//! Authenticator configuration.

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for the OIDC authenticator.
///
/// Values are owned by the host's config layer; this crate only consumes
/// them. See `validate()` for the rules enforced at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// OIDC issuer base URL.
    /// Example: "https://auth.example.com/auth/realms/hub"
    pub issuer: String,

    /// OAuth client id. Also used as the expected token audience and as the
    /// key of the `resource_access` roles projection.
    pub client_id: String,

    /// OAuth client secret, sent with refresh and exchange grants.
    pub client_secret: String,

    /// Roles accepted for login. Empty means every authenticated principal
    /// is accepted (explicit open-door default).
    #[serde(default)]
    pub accepted_roles: HashSet<String>,

    /// Principals carrying this role log in as administrators.
    #[serde(default = "default_admin_role")]
    pub admin_role: Option<String>,

    /// Verify token signatures against the provider's JWKS key.
    #[serde(default = "default_check_signature")]
    pub check_signature: bool,

    /// Permitted JWT signing algorithms. "none" is rejected at validation.
    #[serde(default = "default_algorithms")]
    pub allowed_algorithms: Vec<String>,

    /// Audiences to obtain exchanged tokens for at login and refresh.
    #[serde(default)]
    pub exchange_audiences: Vec<String>,

    /// Remaining access-token lifetime (seconds) below which a refresh is
    /// performed.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,

    /// Claim used as the principal's name. Falls back to `sub`.
    #[serde(default = "default_username_claim")]
    pub username_claim: String,

    /// Timeout for each outbound HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between discovery fetch attempts, in seconds.
    #[serde(default = "default_discovery_retry")]
    pub discovery_retry_secs: u64,

    /// Fail the whole authentication attempt when any audience exchange
    /// fails. When false, successful audiences are kept and failures only
    /// drop their entry.
    #[serde(default)]
    pub require_complete_exchange: bool,

    /// Treat a refresh token without an `exp` claim as non-expiring
    /// (offline-access style). When false such tokens are considered
    /// expired and force re-authentication.
    #[serde(default = "default_refresh_without_exp")]
    pub refresh_without_exp_valid: bool,
}

fn default_admin_role() -> Option<String> {
    None
}

fn default_check_signature() -> bool {
    true
}

fn default_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_refresh_margin() -> u64 {
    60
}

fn default_username_claim() -> String {
    "preferred_username".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_discovery_retry() -> u64 {
    60
}

fn default_refresh_without_exp() -> bool {
    true
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            accepted_roles: HashSet::new(),
            admin_role: default_admin_role(),
            check_signature: default_check_signature(),
            allowed_algorithms: default_algorithms(),
            exchange_audiences: Vec::new(),
            refresh_margin_secs: default_refresh_margin(),
            username_claim: default_username_claim(),
            request_timeout_secs: default_request_timeout(),
            discovery_retry_secs: default_discovery_retry(),
            require_complete_exchange: false,
            refresh_without_exp_valid: default_refresh_without_exp(),
        }
    }
}

impl AuthConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.issuer.is_empty() {
            return Err("issuer is required".to_string());
        }

        if !self.issuer.starts_with("https://") && !self.issuer.starts_with("http://") {
            return Err("issuer must be a valid HTTP(S) URL".to_string());
        }

        if self.client_id.is_empty() {
            return Err("client_id is required".to_string());
        }

        if self.allowed_algorithms.is_empty() {
            return Err("allowed_algorithms must not be empty".to_string());
        }

        for alg in &self.allowed_algorithms {
            if alg.eq_ignore_ascii_case("none") {
                return Err("the 'none' algorithm is not permitted".to_string());
            }
            parse_algorithm(alg)?;
        }

        Ok(())
    }

    /// The configured algorithm allow-list as `jsonwebtoken` values.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.allowed_algorithms
            .iter()
            .filter_map(|a| parse_algorithm(a).ok())
            .collect()
    }
}

/// Parse an algorithm name to a jsonwebtoken Algorithm.
pub fn parse_algorithm(alg: &str) -> Result<Algorithm, String> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "ES256" => Ok(Algorithm::ES256),
        "ES384" => Ok(Algorithm::ES384),
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        _ => Err(format!("unsupported algorithm: {}", alg)),
    }
}
