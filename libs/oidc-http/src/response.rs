use crate::error::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How much of a failed response's body ends up in [`HttpError::HttpStatus`].
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

const PREVIEW_TRUNCATED: &str = "<body too large for preview>";

/// Response body after the decompression layer.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A received response.
///
/// [`json`](Self::json) and [`text`](Self::text) fail on non-2xx;
/// [`bytes`](Self::bytes) does not look at the status. Every reader stops at
/// the client's body size limit and fails with [`HttpError::Timeout`] once
/// the request's time budget is spent.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
    /// Send time plus `timeout`.
    pub(crate) deadline: Instant,
    pub(crate) timeout: Duration,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Turn a non-2xx status into [`HttpError::HttpStatus`] without reading
    /// the body (the preview stays empty).
    ///
    /// # Errors
    ///
    /// [`HttpError::HttpStatus`] for any status outside 200..=299.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        let status = self.status();
        if status.is_success() {
            Ok(self)
        } else {
            Err(HttpError::HttpStatus {
                status,
                body_preview: String::new(),
                content_type: content_type(self.headers()),
            })
        }
    }

    /// # Errors
    ///
    /// [`HttpError::BodyTooLarge`], [`HttpError::Timeout`] or a transport
    /// failure mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let read = collect_limited(self.inner, self.max_body_size);
        within(self.deadline, self.timeout, read).await
    }

    /// # Errors
    ///
    /// [`HttpError::HttpStatus`] (with a body preview),
    /// [`HttpError::BodyTooLarge`], [`HttpError::Timeout`] or
    /// [`HttpError::Json`].
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let read = success_body(self.inner, self.max_body_size);
        let body = within(self.deadline, self.timeout, read).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Body as lossy UTF-8.
    ///
    /// # Errors
    ///
    /// [`HttpError::HttpStatus`], [`HttpError::BodyTooLarge`] or
    /// [`HttpError::Timeout`].
    pub async fn text(self) -> Result<String, HttpError> {
        let read = success_body(self.inner, self.max_body_size);
        let body = within(self.deadline, self.timeout, read).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

async fn within<T>(
    deadline: Instant,
    timeout: Duration,
    read: impl Future<Output = Result<T, HttpError>>,
) -> Result<T, HttpError> {
    tokio::time::timeout_at(deadline, read)
        .await
        .unwrap_or_else(|_| Err(HttpError::Timeout(timeout)))
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(http::header::CONTENT_TYPE)?;
    value.to_str().ok().map(str::to_owned)
}

async fn success_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return collect_limited(response, max_body_size).await;
    }

    let content_type = content_type(response.headers());
    let limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match collect_limited(response, limit).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        // Status wins over an oversized error page.
        Err(HttpError::BodyTooLarge { .. }) => PREVIEW_TRUNCATED.to_owned(),
        Err(e) => return Err(e),
    };

    Err(HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
    })
}

async fn collect_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = response.into_body();
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let Ok(data) = frame.map_err(HttpError::Transport)?.into_data() else {
            continue;
        };
        let total = buf.len() + data.len();
        if total > limit {
            return Err(HttpError::BodyTooLarge {
                limit,
                actual: total,
            });
        }
        buf.extend_from_slice(&data);
    }

    Ok(buf.freeze())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Frame;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    const BUDGET: Duration = Duration::from_millis(200);

    /// Responses built here allow 16 body bytes and have the full budget left.
    fn canned(status: u16, body: &'static str) -> HttpResponse {
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never| match never {})
            .boxed();
        let inner = Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        HttpResponse {
            inner,
            max_body_size: 16,
            deadline: Instant::now() + BUDGET,
            timeout: BUDGET,
        }
    }

    /// A body whose next frame never arrives.
    struct Stalled;

    impl hyper::body::Body for Stalled {
        type Data = Bytes;
        type Error = Box<dyn std::error::Error + Send + Sync>;

        fn poll_frame(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            Poll::Pending
        }
    }

    fn stalled() -> HttpResponse {
        HttpResponse {
            inner: Response::new(Stalled.boxed()),
            max_body_size: 16,
            deadline: Instant::now() + BUDGET,
            timeout: BUDGET,
        }
    }

    #[test]
    fn status_check_leaves_body_unread() {
        assert!(canned(204, "").error_for_status().is_ok());

        let Err(HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        }) = canned(403, r#"{"error":"x"}"#).error_for_status()
        else {
            panic!("403 must be an error");
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body_preview, "");
        assert_eq!(content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn json_reads_success_body() {
        let v: Vec<String> = canned(200, r#"["app","job"]"#).json().await.unwrap();
        assert_eq!(v, ["app", "job"]);

        let err = canned(200, "<html>").json::<Vec<String>>().await.unwrap_err();
        assert!(matches!(err, HttpError::Json(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn failed_status_carries_preview() {
        let err = canned(503, "down").text().await.unwrap_err();
        assert!(
            matches!(err, HttpError::HttpStatus { ref body_preview, .. } if body_preview == "down"),
            "got: {err:?}"
        );

        let err = canned(500, "a body longer than sixteen bytes").text().await.unwrap_err();
        assert!(
            matches!(err, HttpError::HttpStatus { ref body_preview, .. } if body_preview == PREVIEW_TRUNCATED),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn limit_applies_to_raw_bytes() {
        assert_eq!(canned(200, "sixteen bytes!!!").bytes().await.unwrap().len(), 16);

        let err = canned(200, "seventeen bytes!!").bytes().await.unwrap_err();
        assert!(
            matches!(err, HttpError::BodyTooLarge { limit: 16, actual: 17 }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn body_reads_stop_at_deadline() {
        let err = stalled().bytes().await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(d) if d == BUDGET), "got: {err:?}");

        let err = stalled().json::<Vec<String>>().await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(_)), "got: {err:?}");

        let err = stalled().text().await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout(_)), "got: {err:?}");
    }
}
