//! Token endpoint client and the concurrent multi-audience exchange engine
//! (RFC 8693 token exchange + refresh-token grant).

pub mod client;
pub mod engine;

pub use client::TokenClient;
pub use engine::exchange_all;
