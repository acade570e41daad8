use std::time::Duration;

use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Why a URL was refused before any connection was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    ParseError,
    /// Relative URL, or no host.
    MissingAuthority,
    MissingScheme,
}

/// Everything that can go wrong between building a request and reading its
/// body.
///
/// Non-2xx answers are only errors once the caller asks for it
/// ([`HttpResponse::error_for_status`](crate::HttpResponse::error_for_status)
/// or the checked body readers).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("could not assemble request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("bad header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("bad header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The per-request deadline passed; carries the configured timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Connect, I/O or protocol failure below HTTP.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxedCause),

    /// The TLS policy could not be turned into a client config, or the
    /// handshake was refused (name mismatch, protocol floor, untrusted root).
    #[error("TLS failure: {0}")]
    Tls(#[source] BoxedCause),

    /// Measured on decompressed bytes.
    #[error("body exceeds {limit} bytes (read {actual})")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        /// At most `ERROR_BODY_PREVIEW_LIMIT` bytes, lossy UTF-8; empty when
        /// produced by `error_for_status`.
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("response is not the expected JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not form-encode body: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// Every buffer slot is taken; the request was not queued.
    #[error("client overloaded, request buffer full")]
    Overloaded,

    /// The buffer worker is gone.
    #[error("client shut down")]
    ServiceClosed,

    /// `reason` is diagnostic text only; match on `kind`.
    #[error("cannot use URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Scheme other than `https` (or `http` when plain HTTP is allowed).
    #[error("scheme '{scheme}' refused: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}
