//! OIDC provider configuration: discovery, JWKS key material and the
//! atomically-published handle every other component reads from.

pub mod discovery;
pub mod fetcher;
pub mod handle;

pub use discovery::{fetch_provider_config, ProviderConfig};
pub use fetcher::spawn_discovery_task;
pub use handle::ProviderHandle;
