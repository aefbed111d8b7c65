//! JWT decoding, validation and role extraction.

pub mod roles;
pub mod validator;

pub use roles::{ResourceAccessRoles, RoleExtractor};
pub use validator::{decode, Audience, DecodeOptions, DecodedToken};
