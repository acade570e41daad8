use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, Response};
use oidc_http::HttpError;
use tower::{Layer, Service};
use zeroize::Zeroizing;

use super::token::Token;

/// Stamps every request with the current access token as
/// `Authorization: Bearer ...`, overwriting whatever was there.
#[derive(Clone, Debug)]
pub struct BearerAuthLayer {
    token: Token,
}

impl BearerAuthLayer {
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            token: self.token.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BearerAuthService<S> {
    inner: S,
    token: Token,
}

/// Build the header from the cached token. The value is flagged sensitive so
/// hyper and `Debug` output leave it out.
fn bearer_header(token: &Token) -> Result<HeaderValue, HttpError> {
    let secret = token
        .get()
        .map_err(|e| HttpError::Transport(Box::new(e)))?;
    let line = Zeroizing::new(format!("Bearer {}", secret.expose()));
    let mut value = HeaderValue::from_str(&line)?;
    value.set_sensitive(true);
    Ok(value)
}

impl<S, B, ResBody> Service<Request<B>> for BearerAuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let header = match bearer_header(&self.token) {
            Ok(header) => header,
            Err(e) => return Box::pin(std::future::ready(Err(e))),
        };
        req.headers_mut().insert(AUTHORIZATION, header);

        // The instance that was polled ready takes the call.
        let fresh = self.inner.clone();
        let mut ready = std::mem::replace(&mut self.inner, fresh);
        Box::pin(async move { ready.call(req).await })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::SecretString;
    use crate::oauth2::config::OAuthClientConfig;
    use bytes::Bytes;
    use http_body_util::Full;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    fn grant_body(access_token: &str, expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": expires_in,
        })
    }

    async fn token_from(server: &MockServer) -> Token {
        let client =
            oidc_http::HttpClientBuilder::with_config(oidc_http::HttpClientConfig::for_testing())
                .build()
                .unwrap();
        let cfg = OAuthClientConfig {
            token_endpoint: Some(Url::parse(&server.url("/token")).unwrap()),
            client_id: "loki-reader".into(),
            client_secret: SecretString::new("s3cret"),
            jitter_max: Duration::ZERO,
            min_refresh_period: Duration::from_millis(100),
            ..Default::default()
        };
        Token::new(&client, cfg).await.unwrap()
    }

    /// Answers with the `Authorization` header it was given.
    #[derive(Clone)]
    struct Reflect;

    impl Service<Request<Full<Bytes>>> for Reflect {
        type Response = Response<String>;
        type Error = HttpError;
        type Future = std::future::Ready<Result<Response<String>, HttpError>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), HttpError>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let auth = &req.headers()[AUTHORIZATION];
            assert!(auth.is_sensitive(), "bearer header must be sensitive");
            std::future::ready(Ok(Response::new(auth.to_str().unwrap().to_owned())))
        }
    }

    fn labels_request() -> Request<Full<Bytes>> {
        Request::get("https://logs.example.com/loki/api/v1/labels")
            .body(Full::default())
            .unwrap()
    }

    #[tokio::test]
    async fn sets_bearer_header() {
        let server = MockServer::start();
        let _grant = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(grant_body("eyJ.layer", 3600));
        });

        let svc = BearerAuthLayer::new(token_from(&server).await).layer(Reflect);
        let resp = svc.oneshot(labels_request()).await.unwrap();

        assert_eq!(resp.body(), "Bearer eyJ.layer");
    }

    #[tokio::test]
    async fn overwrites_caller_authorization() {
        let server = MockServer::start();
        let _grant = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(grant_body("eyJ.fresh", 3600));
        });

        let svc = BearerAuthLayer::new(token_from(&server).await).layer(Reflect);
        let mut req = labels_request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.body(), "Bearer eyJ.fresh");
    }

    #[tokio::test]
    async fn expired_token_fails_the_request() {
        let server = MockServer::start();
        let mut grant = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(grant_body("eyJ.short", 1));
        });
        let token = token_from(&server).await;

        // Every refresh from now on is refused.
        grant.delete();
        let _outage = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(503);
        });
        tokio::time::sleep(Duration::from_secs(3)).await;

        let svc = BearerAuthLayer::new(token).layer(Reflect);
        let err = svc.oneshot(labels_request()).await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn layer_debug_is_opaque() {
        let server = MockServer::start();
        let _grant = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(grant_body("eyJ.debug", 3600));
        });

        let layer = BearerAuthLayer::new(token_from(&server).await);
        assert!(!format!("{layer:?}").contains("eyJ.debug"));
    }
}
