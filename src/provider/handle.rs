//! Atomically-published provider configuration cell.

use std::sync::{Arc, RwLock};

use crate::error::AuthError;
use crate::provider::discovery::ProviderConfig;

/// Shared cell holding the current [`ProviderConfig`].
///
/// Empty until the discovery task's first successful fetch; every dependent
/// operation fails closed with [`AuthError::ProviderNotConfigured`] until
/// then. A publish swaps the whole `Arc`, so readers observe either the old
/// or the fully-populated new value, never a partial one.
pub struct ProviderHandle {
    inner: RwLock<Option<Arc<ProviderConfig>>>,
}

impl ProviderHandle {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Whether a configuration has been published.
    pub fn is_ready(&self) -> bool {
        self.inner.read().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Current configuration, or `ProviderNotConfigured` before the first
    /// publish. A poisoned lock also fails closed.
    pub fn get(&self) -> Result<Arc<ProviderConfig>, AuthError> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.clone())
            .ok_or(AuthError::ProviderNotConfigured)
    }

    /// Publish a new configuration, replacing any previous one.
    pub fn publish(&self, config: ProviderConfig) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::new(config));
    }
}

impl Default for ProviderHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> ProviderConfig {
        ProviderConfig {
            authorize_url: "https://idp/auth".to_string(),
            token_url: "https://idp/token".to_string(),
            userinfo_url: "https://idp/userinfo".to_string(),
            end_session_url: None,
            jwks_uri: None,
            public_key: None,
        }
    }

    #[test]
    fn test_fails_closed_before_publish() {
        let handle = ProviderHandle::new();
        assert!(!handle.is_ready());
        assert!(matches!(
            handle.get(),
            Err(AuthError::ProviderNotConfigured)
        ));
    }

    #[test]
    fn test_publish_is_whole_value() {
        let handle = ProviderHandle::new();
        handle.publish(test_provider());

        assert!(handle.is_ready());
        let config = handle.get().unwrap();
        // Read-consistency: every endpoint of the published value is set.
        assert!(!config.authorize_url.is_empty());
        assert!(!config.token_url.is_empty());
        assert!(!config.userinfo_url.is_empty());
    }

    #[test]
    fn test_republish_replaces() {
        let handle = ProviderHandle::new();
        handle.publish(test_provider());

        let mut second = test_provider();
        second.token_url = "https://idp2/token".to_string();
        handle.publish(second);

        assert_eq!(handle.get().unwrap().token_url, "https://idp2/token");
    }
}
