//! Role extraction from token claims.

use serde_json::Value;
use std::collections::HashSet;

/// Strategy for projecting a role set out of token claims.
///
/// Injected into the authenticator at construction; hosts with non-standard
/// claim layouts substitute their own implementation. Returning `None`
/// (claim missing or wrong shape) is treated as zero roles by the
/// authorization gate, never as an error.
pub trait RoleExtractor: Send + Sync {
    fn extract(&self, claims: &serde_json::Map<String, Value>) -> Option<HashSet<String>>;
}

/// Default extractor: `resource_access.<client_id>.roles`.
pub struct ResourceAccessRoles {
    pub client_id: String,
}

impl ResourceAccessRoles {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl RoleExtractor for ResourceAccessRoles {
    fn extract(&self, claims: &serde_json::Map<String, Value>) -> Option<HashSet<String>> {
        let roles = claims
            .get("resource_access")?
            .get(&self.client_id)?
            .get("roles")?
            .as_array()?;

        Some(
            roles
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        )
    }
}
