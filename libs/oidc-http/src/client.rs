use crate::builder::{HttpClientBuilder, InnerService};
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tower::buffer::Buffer;
use tower::{Service, ServiceExt};

pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Front of every client: a bounded queue feeding one worker task.
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Cheaply clonable handle to a configured middleware stack.
///
/// Clones share the queue, the connection pool and the TLS settings. Build
/// one with [`HttpClientBuilder`]; derive an authenticated variant with
/// [`layered`](Self::layered).
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) request_timeout: Duration,
    pub(crate) transport_security: TransportSecurity,
    pub(crate) buffer_capacity: usize,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("transport_security", &self.transport_security)
            .field("max_body_size", &self.max_body_size)
            .field("request_timeout", &self.request_timeout)
            .field("buffer_capacity", &self.buffer_capacity)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// # Errors
    ///
    /// See [`HttpClientBuilder::build`].
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// A new client whose requests run through `wrap` and then through this
    /// client's stack.
    ///
    /// Connector, pool, timeout and TLS policy are shared. The original
    /// client keeps working without the extra layer. Spawns a buffer worker,
    /// so it needs a Tokio runtime.
    #[must_use]
    pub fn layered(&self, wrap: impl FnOnce(InnerService) -> InnerService) -> Self {
        let shared: InnerService = self
            .service
            .clone()
            .map_err(map_buffer_error)
            .boxed_clone();

        Self {
            service: Buffer::new(wrap(shared), self.buffer_capacity),
            ..self.clone()
        }
    }

    /// Start a GET. The URL is checked when the request is sent: it needs a
    /// scheme and a host, and `http` only passes under
    /// [`TransportSecurity::AllowInsecureHttp`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    /// Start a POST; pair with [`RequestBuilder::form`].
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            self.request_timeout,
            method,
            url.to_owned(),
            self.transport_security,
        )
    }
}

/// Unwrap an `HttpError` that travelled through the buffer. Anything else
/// means the worker is gone.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    err.downcast::<HttpError>().map_or_else(
        |other| {
            tracing::error!(error = %other, "request buffer worker stopped");
            HttpError::ServiceClosed
        },
        |e| *e,
    )
}

/// Reserve a buffer slot without waiting: a full queue is reported as
/// [`HttpError::Overloaded`] right away.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    let readiness = std::future::poll_fn(|cx| Poll::Ready(service.poll_ready(cx))).await;

    match readiness {
        Poll::Ready(Ok(())) => Ok(()),
        Poll::Ready(Err(e)) => Err(map_buffer_error(e)),
        Poll::Pending => Err(HttpError::Overloaded),
    }
}
