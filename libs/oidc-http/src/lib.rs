#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Hyper-based HTTP client for short-lived service-to-service calls.
//!
//! - TLS via rustls with a configurable [`TlsPolicy`]: protocol floor,
//!   cipher suite allow-list, and an expected server name that overrides the
//!   URL host for SNI and certificate verification (HTTPS only by default)
//! - Per-request timeout and a bounded idle connection pool
//! - User-Agent injection and transparent response decompression
//! - Status-checked, size-limited JSON helpers
//!
//! Certificate verification cannot be disabled.
//!
//! # Example
//!
//! ```ignore
//! use oidc_http::{HttpClientBuilder, HttpClientConfig};
//!
//! let client = HttpClientBuilder::with_config(HttpClientConfig::strict("logs.example.com"))
//!     .build()?;
//!
//! let labels: Labels = client
//!     .get("https://logs.example.com/loki/api/v1/labels")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
pub mod tls;

pub use builder::{HttpClientBuilder, InnerService};
pub use client::HttpClient;
pub use config::{
    DEFAULT_USER_AGENT, HttpClientConfig, TlsPolicy, TlsRootConfig, TlsVersion,
    TransportSecurity,
};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{UserAgentLayer, UserAgentService};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};

/// Re-exported so callers can name cipher suites in a [`TlsPolicy`].
pub use rustls::CipherSuite;
