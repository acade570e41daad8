use std::time::Duration;

use rustls::CipherSuite;

pub const DEFAULT_USER_AGENT: &str = concat!("oidc-http/", env!("CARGO_PKG_VERSION"));

const MIB: usize = 1024 * 1024;

/// Protocol floor for the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum TlsVersion {
    #[default]
    Tls12,
    Tls13,
}

/// Narrows what a client accepts during the TLS handshake.
///
/// Certificates are always verified; a policy can only make the client
/// stricter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsPolicy {
    pub min_version: TlsVersion,

    /// `None` keeps every suite the crypto provider offers. Entries for a
    /// protocol version below `min_version` have no effect, and a list that
    /// leaves nothing negotiable makes the build fail.
    pub cipher_suites: Option<Vec<CipherSuite>>,

    /// Name used for SNI and certificate verification instead of the URL
    /// host.
    pub server_name: Option<String>,
}

impl TlsPolicy {
    /// TLS 1.3 only, AES-128-GCM with SHA-256 over ECDHE, certificate bound
    /// to `server_name`.
    ///
    /// The TLS 1.2 counterpart of the suite is listed too; it only matters if
    /// `min_version` is lowered afterwards.
    #[must_use]
    pub fn strict(server_name: impl Into<String>) -> Self {
        Self {
            min_version: TlsVersion::Tls13,
            cipher_suites: Some(vec![
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ]),
            server_name: Some(server_name.into()),
        }
    }
}

/// Where trusted roots come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots.
    #[default]
    WebPki,
    /// The operating system's store.
    Native,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// `https://` only.
    #[default]
    TlsOnly,
    /// Also accept `http://`. Meant for local mock servers.
    AllowInsecureHttp,
}

/// Everything [`HttpClientBuilder`](crate::HttpClientBuilder) needs.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Covers connecting, the handshake, the response headers and reading
    /// the body.
    pub request_timeout: Duration,
    /// Limit on decompressed body bytes.
    pub max_body_size: usize,
    pub user_agent: String,
    pub transport: TransportSecurity,
    pub tls_roots: TlsRootConfig,
    pub tls: TlsPolicy,
    /// Requests that may wait for the worker before
    /// [`HttpError::Overloaded`](crate::HttpError::Overloaded) is returned.
    pub buffer_capacity: usize,
    /// `None` keeps idle connections until the server closes them.
    pub pool_idle_timeout: Option<Duration>,
    /// Idle connections kept per host. Busy connections are not counted.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * MIB,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::WebPki,
            tls: TlsPolicy::default(),
            buffer_capacity: 1024,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Profile for one-shot command line runs against a known server: three
    /// second timeout, three idle connections per host and
    /// [`TlsPolicy::strict`].
    #[must_use]
    pub fn strict(server_name: impl Into<String>) -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            max_body_size: MIB,
            tls: TlsPolicy::strict(server_name),
            buffer_capacity: 16,
            pool_idle_timeout: Some(Duration::from_secs(30)),
            pool_max_idle_per_host: 3,
            ..Self::default()
        }
    }

    /// Plain HTTP allowed, default TLS policy. Only for tests against local
    /// mock servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: MIB,
            transport: TransportSecurity::AllowInsecureHttp,
            buffer_capacity: 256,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }
}
