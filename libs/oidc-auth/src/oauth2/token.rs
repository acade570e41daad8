use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use aliri_clock::DurationSecs;
use aliri_tokens::backoff::ErrorBackoffConfig;
use aliri_tokens::jitter::RandomEarlyJitter;
use aliri_tokens::{TokenStatus, TokenWatcher};
use oidc_http::HttpClient;

use super::config::OAuthClientConfig;
use super::error::TokenError;
use super::source::OAuthTokenSource;
use crate::SecretString;

/// Shared access to a client-credentials token kept fresh in the background.
///
/// Clones observe the same watcher, so one refresh serves all of them.
#[derive(Clone)]
pub struct Token {
    watcher: Arc<TokenWatcher>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token").finish_non_exhaustive()
    }
}

impl Token {
    /// Resolve the token endpoint if needed, exchange credentials once and
    /// hand the result to a refresh task.
    ///
    /// Discovery and every exchange, including later refreshes, use
    /// `client`. Returning `Ok` means a token is already in hand.
    ///
    /// # Errors
    ///
    /// [`TokenError::ConfigError`] before any network call;
    /// [`TokenError::Http`], [`TokenError::InvalidResponse`] or
    /// [`TokenError::UnsupportedTokenType`] from discovery or the first
    /// exchange.
    pub async fn new(client: &HttpClient, mut config: OAuthClientConfig) -> Result<Self, TokenError> {
        config.validate()?;

        if let Some(issuer) = config.issuer_url.take() {
            let discovered = crate::discovery::discover(client, &issuer).await?;
            config.token_endpoint = Some(discovered.token_endpoint);
        }

        let source = OAuthTokenSource::new(client.clone(), &config)?;
        let jitter = RandomEarlyJitter::new(DurationSecs(config.jitter_max.as_secs()));
        let backoff = refresh_backoff(config.min_refresh_period);
        let watcher = TokenWatcher::spawn_from_token_source(source, jitter, backoff).await?;

        Ok(Self {
            watcher: Arc::new(watcher),
        })
    }

    /// The cached access token. Never touches the network.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unavailable`] once the token has expired and no refresh
    /// has succeeded yet.
    pub fn get(&self) -> Result<SecretString, TokenError> {
        let current = self.watcher.token();
        if matches!(current.token_status(), TokenStatus::Expired) {
            return Err(TokenError::Unavailable(
                "access token expired while refresh is still failing".into(),
            ));
        }
        Ok(SecretString::new(current.access_token().as_str()))
    }
}

/// Failed refreshes back off exponentially from `floor` up to 30 times it.
fn refresh_backoff(floor: Duration) -> ErrorBackoffConfig {
    ErrorBackoffConfig::new(floor, floor * 30, 2)
}
