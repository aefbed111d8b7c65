//! OIDC authentication and token-lifecycle management for a multi-tenant
//! session hub.
//!
//! The host platform drives three integration points: [`Authenticator::authenticate`]
//! when a login completes, [`Authenticator::refresh_user`] on its freshness
//! schedule, and [`Authenticator::pre_spawn_start`] right before a workload
//! is provisioned. This crate owns the protocol state in between: OIDC
//! discovery with indefinite retry, JWT validation and role-based
//! authorization, the refresh/expiry state machine, and concurrent
//! multi-audience token exchange (RFC 8693).
//!
//! Authentication state lives in the host's user record; this crate hands
//! back immutable [`AuthState`] values and never keeps its own copy.

pub mod authenticator;
pub mod authz;
pub mod config;
pub mod error;
pub mod exchange;
pub mod metrics;
pub mod provider;
pub mod refresh;
pub mod state;
pub mod token;

pub use authenticator::Authenticator;
pub use authz::{AuthzPolicy, Decision};
pub use config::AuthConfig;
pub use error::AuthError;
pub use provider::{ProviderConfig, ProviderHandle};
pub use refresh::RefreshDecision;
pub use state::{AuthResult, AuthState, Credentials, TokenPair};
pub use token::{DecodedToken, ResourceAccessRoles, RoleExtractor};
