//! Per-principal authentication state.
//!
//! The host's user record owns this value: it is created at login, replaced
//! wholesale on every successful refresh and deleted by the host at logout.
//! This crate never mutates a stored copy in place.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An access/refresh token pair as returned by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authentication state attached to a principal's user record.
///
/// `exchanged_tokens` holds one entry per configured exchange audience whose
/// most recent exchange call succeeded; failed audiences have no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub exchanged_tokens: HashMap<String, String>,
}

/// Token material handed over by the host after its OAuth code flow.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// Principal name, taken from the configured username claim.
    pub name: String,
    /// Whether the principal carries the configured admin role.
    pub admin: bool,
    /// State to be persisted in the host's user record.
    pub auth_state: AuthState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_state_round_trip() {
        let mut exchanged = HashMap::new();
        exchanged.insert("svc-a".to_string(), "token-a".to_string());

        let state = AuthState {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            roles: vec!["users".to_string()],
            exchanged_tokens: exchanged,
        };

        let json = serde_json::to_string(&state).unwrap();
        let back: AuthState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_auth_state_tolerates_missing_fields() {
        // Older host records may predate role/exchange tracking.
        let json = r#"{"access_token":"a","refresh_token":"r"}"#;
        let state: AuthState = serde_json::from_str(json).unwrap();
        assert!(state.roles.is_empty());
        assert!(state.exchanged_tokens.is_empty());
    }
}
