use thiserror::Error;

/// Failures of discovery and of the client-credentials exchange.
///
/// Messages are safe to log: no variant holds the client secret, an access
/// token or a response body from the identity provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// Already prefixed with the failing step, see `format_http_error`.
    #[error("{0}")]
    Http(String),

    /// The issuer or token endpoint answered 2xx with something unusable.
    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// `token_type` other than `Bearer`.
    #[error("token type '{0}' is not supported")]
    UnsupportedTokenType(String),

    #[error("invalid OAuth2 client settings: {0}")]
    ConfigError(String),

    /// Expired token while the refresh task is still retrying.
    #[error("no valid token: {0}")]
    Unavailable(String),
}
