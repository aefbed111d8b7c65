//! Error taxonomy for authentication and token-lifecycle operations.
//!
//! Callers branch on these variants: an [`AuthError::ExpiredToken`] routes a
//! principal through the refresh path, while [`AuthError::InvalidSignature`]
//! or [`AuthError::MalformedToken`] reject the attempt outright.

use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

/// Errors surfaced by the authenticator and its subsystems.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The OIDC discovery/JWKS fetch has not completed yet. Fail closed.
    #[error("identity provider not configured yet")]
    ProviderNotConfigured,

    /// Generic authentication rejection. No internal detail is leaked.
    #[error("authentication failed")]
    InvalidCredentials,

    /// The token could not be parsed as a JWT at all.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature verification against the provider key failed.
    #[error("token signature verification failed")]
    InvalidSignature,

    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    ExpiredToken,

    /// The principal's roles did not intersect the accepted-role list.
    #[error("none of the principal's roles are accepted for login")]
    Unauthorized,

    /// A token-exchange call for one audience failed. Non-fatal, partial.
    #[error("token exchange failed for audience '{audience}': {reason}")]
    ExchangeFailure { audience: String, reason: String },

    /// The refresh token itself has expired. The session must be
    /// re-established from scratch.
    #[error("refresh token expired")]
    RefreshTokenExpired,

    /// Network-level failure on an outbound call. Recoverable by retry.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AuthError {
    /// Map a `jsonwebtoken` failure into the taxonomy.
    pub(crate) fn from_jwt(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::ImmatureSignature => AuthError::InvalidCredentials,
            _ => AuthError::MalformedToken(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::Error;

    #[test]
    fn test_jwt_error_classification() {
        let expired = Error::from(ErrorKind::ExpiredSignature);
        assert!(matches!(AuthError::from_jwt(expired), AuthError::ExpiredToken));

        let bad_sig = Error::from(ErrorKind::InvalidSignature);
        assert!(matches!(
            AuthError::from_jwt(bad_sig),
            AuthError::InvalidSignature
        ));

        let bad_iss = Error::from(ErrorKind::InvalidIssuer);
        assert!(matches!(
            AuthError::from_jwt(bad_iss),
            AuthError::InvalidCredentials
        ));

        let garbage = Error::from(ErrorKind::InvalidToken);
        assert!(matches!(
            AuthError::from_jwt(garbage),
            AuthError::MalformedToken(_)
        ));
    }
}
