use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use std::time::Duration;
use tokio::time::Instant;
use tower::Service;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request under construction.
///
/// Obtained from [`HttpClient::get`](crate::HttpClient::get) or
/// [`HttpClient::post`](crate::HttpClient::post). A bad header is remembered
/// and reported by [`send`](Self::send) (or by [`form`](Self::form)), so the
/// chain never has to be broken up.
#[must_use = "nothing is sent until .send() is awaited"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    request_timeout: Duration,
    transport_security: TransportSecurity,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Bytes>,
    deferred: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        request_timeout: Duration,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            request_timeout,
            transport_security,
            method,
            url,
            headers: Vec::new(),
            body: None,
            deferred: None,
        }
    }

    fn push(mut self, parsed: Result<(HeaderName, HeaderValue), HttpError>) -> Self {
        if self.deferred.is_none() {
            match parsed {
                Ok(pair) => self.headers.push(pair),
                Err(e) => self.deferred = Some(e),
            }
        }
        self
    }

    pub fn header(self, name: &str, value: &str) -> Self {
        let parsed = HeaderName::try_from(name)
            .map_err(HttpError::from)
            .and_then(|n| Ok((n, HeaderValue::try_from(value)?)));
        self.push(parsed)
    }

    /// Like [`header`](Self::header), but the value is flagged sensitive and
    /// will not be rendered by `Debug` or captured by hyper's logging.
    pub fn sensitive_header(self, name: HeaderName, value: &str) -> Self {
        let parsed = HeaderValue::try_from(value)
            .map(|mut v| {
                v.set_sensitive(true);
                (name, v)
            })
            .map_err(HttpError::from);
        self.push(parsed)
    }

    /// Use `fields` as an `application/x-www-form-urlencoded` body. An
    /// explicit `Content-Type` header wins over the default one.
    ///
    /// # Errors
    ///
    /// [`HttpError::FormEncode`], or a header error recorded earlier.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        self.body = Some(serde_urlencoded::to_string(fields)?.into());
        Ok(self)
    }

    fn target(&self) -> Result<http::Uri, HttpError> {
        let invalid = |kind, reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            kind,
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(InvalidUriKind::ParseError, e.to_string()))?;

        if uri.authority().is_none() {
            return Err(invalid(InvalidUriKind::MissingAuthority, "no host in URL".to_owned()));
        }

        let refused = |scheme: &str, reason: &str| HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: reason.to_owned(),
        };

        match (uri.scheme_str(), self.transport_security) {
            (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => Ok(uri),
            (Some("http"), TransportSecurity::TlsOnly) => Err(refused(
                "http",
                "HTTPS required (transport security is TlsOnly)",
            )),
            (Some(other), _) => Err(refused(other, "only http and https are understood")),
            (None, _) => Err(invalid(InvalidUriKind::MissingScheme, "no scheme in URL".to_owned())),
        }
    }

    /// Dispatch the request.
    ///
    /// Resolves to `Ok` for any status the server returns. The client's
    /// request timeout starts here and also bounds reading the body of the
    /// returned [`HttpResponse`].
    ///
    /// # Errors
    ///
    /// A recorded header error, a refused URL, [`HttpError::Overloaded`]
    /// when the buffer is full, or whatever the transport reports (timeout,
    /// TLS, I/O).
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        let uri = self.target()?;
        let deadline = Instant::now() + self.request_timeout;
        tracing::trace!(method = %self.method, %uri, "dispatching request");

        let mut request = Request::builder().method(self.method).uri(uri);
        if self.body.is_some() && !self.headers.iter().any(|(n, _)| n == CONTENT_TYPE) {
            request = request.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        }
        for (name, value) in self.headers {
            request = request.header(name, value);
        }
        let request = request.body(Full::new(self.body.unwrap_or_default()))?;

        try_acquire_buffer_slot(&mut self.service).await?;
        let inner: Response<ResponseBody> =
            self.service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
            deadline,
            timeout: self.request_timeout,
        })
    }
}
