use std::fmt;
use std::time::Duration;

use url::Url;

use super::error::TokenError;
use super::types::ClientAuthMethod;
use crate::SecretString;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Settings for one client-credentials client.
///
/// The token endpoint is either given directly or discovered from the
/// issuer; [`validate`](Self::validate) insists on exactly one of the two.
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub token_endpoint: Option<Url>,
    /// Discovery base; the endpoint comes from
    /// `{issuer_url}/.well-known/openid-configuration`.
    pub issuer_url: Option<Url>,

    pub client_id: String,
    pub client_secret: SecretString,
    /// Sent space-separated; an empty list omits `scope` altogether.
    pub scopes: Vec<String>,
    pub auth_method: ClientAuthMethod,

    /// Start refreshing this long before expiry. Tokens shorter than this
    /// are refreshed at half their lifetime.
    pub refresh_offset: Duration,
    /// Upper bound of the random early-refresh jitter.
    pub jitter_max: Duration,
    /// Floor for the stale window and base of the error backoff.
    pub min_refresh_period: Duration,
    /// Lifetime assumed when the response has no `expires_in`.
    pub default_ttl: Duration,
}

impl OAuthClientConfig {
    /// # Errors
    ///
    /// [`TokenError::ConfigError`] for a blank `client_id`, an empty
    /// `client_secret`, or when `token_endpoint` and `issuer_url` are both
    /// set or both missing.
    pub fn validate(&self) -> Result<(), TokenError> {
        let problem = if self.client_id.trim().is_empty() {
            Some("client_id must not be empty")
        } else if self.client_secret.is_empty() {
            Some("client_secret must not be empty")
        } else {
            match (self.token_endpoint.is_some(), self.issuer_url.is_some()) {
                (true, true) => Some("token_endpoint and issuer_url are mutually exclusive"),
                (false, false) => Some("one of token_endpoint or issuer_url must be set"),
                _ => None,
            }
        };

        match problem {
            Some(msg) => Err(TokenError::ConfigError(msg.to_owned())),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("token_endpoint", &self.token_endpoint.as_ref().map(Url::as_str))
            .field("issuer_url", &self.issuer_url.as_ref().map(Url::as_str))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("scopes", &self.scopes)
            .field("auth_method", &self.auth_method)
            .field("refresh_offset", &self.refresh_offset)
            .field("jitter_max", &self.jitter_max)
            .field("min_refresh_period", &self.min_refresh_period)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        const MINUTE: Duration = Duration::from_secs(60);

        Self {
            token_endpoint: None,
            issuer_url: None,
            client_id: String::new(),
            client_secret: SecretString::new(""),
            scopes: DEFAULT_SCOPES.map(str::to_owned).to_vec(),
            auth_method: ClientAuthMethod::AutoDetect,
            refresh_offset: MINUTE * 30,
            jitter_max: MINUTE * 5,
            min_refresh_period: Duration::from_secs(10),
            default_ttl: MINUTE * 5,
        }
    }
}
