//! Outbound `OAuth2` client credentials flow.
//!
//! Token acquisition and background refresh, plus a tower layer that
//! attaches the bearer token to outbound requests.

pub mod config;
pub mod error;
pub mod layer;
pub(crate) mod source;
pub mod token;
pub mod types;

pub use config::{DEFAULT_SCOPES, OAuthClientConfig};
pub use error::TokenError;
pub use layer::{BearerAuthLayer, BearerAuthService};
pub use token::Token;
pub use types::ClientAuthMethod;
