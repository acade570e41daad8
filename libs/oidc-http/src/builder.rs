use crate::config::{HttpClientConfig, TlsPolicy, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::UserAgentLayer;
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{FixedServerNameResolver, HttpsConnector};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// The stack below the buffer, with errors already mapped to [`HttpError`].
pub type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// Assembles an [`HttpClient`](crate::HttpClient) from an
/// [`HttpClientConfig`]; the setters override single fields.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Deadline for one request, from connect to the last body byte.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    #[must_use]
    pub fn tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.config.tls = policy;
        self
    }

    /// Queue depth in front of the worker; at least 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Idle keep-alive connections kept per host; 0 turns reuse off.
    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Wire up connector, pool and middleware.
    ///
    /// From the outside in: buffer, error mapping, timeout, `User-Agent`,
    /// decompression, hyper. Must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`HttpError::Tls`] when the policy cannot be met (no usable cipher
    /// suite, malformed expected server name, empty native root store);
    /// [`HttpError::InvalidHeaderValue`] for an unusable user agent.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        let HttpClientBuilder { config } = self;
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!("insecure HTTP enabled: plain http:// URLs will be accepted");
        }

        let connector = https_connector(&config)?;
        let mut pool = Client::builder(TokioExecutor::new());
        // Idle expiry only runs with a timer installed.
        pool.pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);
        let hyper_client = pool.build::<_, Full<Bytes>>(connector);

        let timeout = config.request_timeout;
        let inner: InnerService = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(UserAgentLayer::try_new(&config.user_agent)?)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(box_body)
            .map_err(move |e: tower::BoxError| classify(e, timeout))
            .boxed_clone();

        tracing::debug!(
            ?timeout,
            min_tls = ?config.tls.min_version,
            server_name = config.tls.server_name.as_deref().unwrap_or("<url host>"),
            max_idle_per_host = config.pool_max_idle_per_host,
            "HTTP client ready"
        );

        let buffer_capacity = config.buffer_capacity.max(1);
        Ok(crate::HttpClient {
            service: Buffer::new(inner, buffer_capacity),
            max_body_size: config.max_body_size,
            request_timeout: timeout,
            transport_security: config.transport,
            buffer_capacity,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Recover typed errors from the boxed ones tower hands back.
fn classify(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match err.downcast::<HttpError>() {
        Ok(e) => *e,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}

/// With an expected server name in the policy, SNI and certificate checks
/// use that name for every request, whatever the URL host is.
fn https_connector(config: &HttpClientConfig) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let tls_config = tls::client_config(&config.tls, config.tls_roots)?;
    let pinned_name = tls::expected_server_name(&config.tls)?;
    if config.tls_roots == TlsRootConfig::Native {
        tracing::debug!("verifying servers against the OS root store");
    }

    let builder = hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls_config);
    let builder = match config.transport {
        TransportSecurity::TlsOnly => builder.https_only(),
        TransportSecurity::AllowInsecureHttp => builder.https_or_http(),
    };
    let builder = match pinned_name {
        Some(name) => builder.with_server_name_resolver(FixedServerNameResolver::new(name)),
        None => builder,
    };

    Ok(builder.enable_all_versions().build())
}
