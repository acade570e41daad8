use serde::de::DeserializeOwned;
use thiserror::Error;
use tower::{Layer, ServiceExt};
use url::Url;

use oidc_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError};

use crate::discovery::discover;
use crate::oauth2::{BearerAuthLayer, OAuthClientConfig, Token, TokenError};

/// Failure while bootstrapping an [`AuthenticatedFetcher`], by stage.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("invalid OAuth2 client configuration")]
    Config(#[source] TokenError),

    #[error("failed to build HTTP client")]
    Client(#[source] HttpError),

    #[error("OIDC discovery failed")]
    Discovery(#[source] TokenError),

    #[error("OAuth2 token exchange failed")]
    TokenExchange(#[source] TokenError),
}

/// HTTP client that authenticates every request with a client-credentials
/// bearer token.
///
/// [`new`](Self::new) performs the whole bootstrap:
///
/// 1. build the base client from the given [`HttpClientConfig`]
/// 2. resolve the token endpoint (discovery through the base client, unless
///    configured directly)
/// 3. exchange the client credentials through the base client
/// 4. derive an authenticated client from the base client with
///    [`BearerAuthLayer`]
/// 5. swap it in; every later request carries the bearer token
pub struct AuthenticatedFetcher {
    client: HttpClient,
    oauth: OAuthClientConfig,
    token_endpoint: Option<Url>,
}

impl std::fmt::Debug for AuthenticatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedFetcher")
            .field("client", &self.client)
            .field("oauth", &self.oauth)
            .field("token_endpoint", &self.token_endpoint)
            .finish()
    }
}

impl AuthenticatedFetcher {
    /// Bootstrap an authenticated fetcher.
    ///
    /// # Errors
    ///
    /// Returns the [`FetcherError`] variant naming the step that failed. No
    /// token request is made if discovery fails.
    pub async fn new(
        oauth: OAuthClientConfig,
        http: HttpClientConfig,
    ) -> Result<Self, FetcherError> {
        oauth.validate().map_err(FetcherError::Config)?;

        let base = HttpClientBuilder::with_config(http)
            .build()
            .map_err(FetcherError::Client)?;

        let mut fetcher = Self {
            client: base,
            oauth,
            token_endpoint: None,
        };

        let token_endpoint = fetcher
            .token_endpoint()
            .await
            .map_err(FetcherError::Discovery)?;

        let exchange = OAuthClientConfig {
            token_endpoint: Some(token_endpoint),
            issuer_url: None,
            ..fetcher.oauth.clone()
        };
        let token = Token::new(&fetcher.client, exchange)
            .await
            .map_err(FetcherError::TokenExchange)?;

        let authenticated = fetcher
            .client
            .layered(|svc| BearerAuthLayer::new(token).layer(svc).boxed_clone());
        fetcher.client = authenticated;

        tracing::debug!("authenticated HTTP client ready");
        Ok(fetcher)
    }

    /// Token endpoint, discovered on first call and cached afterwards.
    ///
    /// A directly configured `token_endpoint` is returned without any
    /// network call.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] from [`discover`] when discovery fails;
    /// nothing is cached in that case.
    pub async fn token_endpoint(&mut self) -> Result<Url, TokenError> {
        if let Some(ref url) = self.token_endpoint {
            return Ok(url.clone());
        }

        let url = match (&self.oauth.token_endpoint, &self.oauth.issuer_url) {
            (Some(url), _) => url.clone(),
            (None, Some(issuer)) => discover(&self.client, issuer).await?.token_endpoint,
            (None, None) => {
                return Err(TokenError::ConfigError(
                    "one of token_endpoint or issuer_url must be set".into(),
                ));
            }
        };

        self.token_endpoint = Some(url.clone());
        Ok(url)
    }

    /// GET `url` with the bearer token and decode the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] on transport failure, non-2xx status, an
    /// oversized body, or a body that does not decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.client.get(url).send().await?.json().await
    }

    /// The authenticated client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}
