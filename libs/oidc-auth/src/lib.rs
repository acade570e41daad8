#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! OIDC discovery and `OAuth2` client-credentials authentication on top of
//! [`oidc_http`].
//!
//! [`AuthenticatedFetcher`] ties the pieces together: it discovers the token
//! endpoint, exchanges client credentials through the strict base client, and
//! derives an authenticated client that sends `Authorization: Bearer <token>`
//! on every request.
//!
//! ```ignore
//! let fetcher = AuthenticatedFetcher::new(oauth, HttpClientConfig::strict("logs.example.com")).await?;
//! let labels: Labels = fetcher.get_json("https://logs.example.com/loki/api/v1/labels").await?;
//! ```

pub mod discovery;
mod fetcher;
mod http_error;
pub mod oauth2;
mod secret_string;

pub use discovery::{DiscoveryDocument, discover};
pub use fetcher::{AuthenticatedFetcher, FetcherError};
pub use oauth2::{
    BearerAuthLayer, ClientAuthMethod, OAuthClientConfig, Token, TokenError,
};
pub use secret_string::SecretString;
