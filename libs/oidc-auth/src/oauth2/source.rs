use std::time::Duration;

use aliri_clock::DurationSecs;
use aliri_tokens::sources::AsyncTokenSource;
use aliri_tokens::{AccessToken, IdToken, TokenLifetimeConfig, TokenWithLifetime};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::StatusCode;
use http::header::AUTHORIZATION;
use oidc_http::{HttpClient, HttpResponse};
use url::Url;
use zeroize::Zeroizing;

use super::config::OAuthClientConfig;
use super::error::TokenError;
use super::types::{ClientAuthMethod, TokenResponse};
use crate::SecretString;
use crate::http_error::format_http_error;

const CONTEXT: &str = "OAuth2 token";

/// Performs the `client_credentials` grant on behalf of a `TokenWatcher`.
///
/// The client passed in must be a plain one: the token endpoint is called
/// without a bearer token.
pub struct OAuthTokenSource {
    client: HttpClient,
    token_endpoint: Url,
    client_id: String,
    client_secret: SecretString,
    /// `None` when no scopes are configured.
    scope: Option<String>,
    auth_method: ClientAuthMethod,
    /// What the endpoint accepted on the first successful auto exchange.
    detected: Option<ClientAuthMethod>,
    default_ttl: Duration,
    refresh_offset: Duration,
    min_refresh_period: Duration,
}

impl OAuthTokenSource {
    /// # Errors
    ///
    /// [`TokenError::ConfigError`] when `config.token_endpoint` is unset.
    pub fn new(client: HttpClient, config: &OAuthClientConfig) -> Result<Self, TokenError> {
        let Some(token_endpoint) = config.token_endpoint.clone() else {
            return Err(TokenError::ConfigError("token_endpoint is required".into()));
        };

        Ok(Self {
            client,
            token_endpoint,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: (!config.scopes.is_empty()).then(|| config.scopes.join(" ")),
            auth_method: config.auth_method,
            detected: None,
            default_ttl: config.default_ttl,
            refresh_offset: config.refresh_offset,
            min_refresh_period: config.min_refresh_period,
        })
    }

    fn probing(&self) -> bool {
        self.auth_method == ClientAuthMethod::AutoDetect && self.detected.is_none()
    }

    /// Auto mode opens with Basic until the endpoint has told us otherwise.
    fn first_style(&self) -> ClientAuthMethod {
        match self.detected.unwrap_or(self.auth_method) {
            ClientAuthMethod::AutoDetect => ClientAuthMethod::Basic,
            style => style,
        }
    }

    fn basic_credentials(&self) -> Zeroizing<String> {
        let pair = Zeroizing::new(format!("{}:{}", self.client_id, self.client_secret.expose()));
        let encoded = Zeroizing::new(STANDARD.encode(pair.as_bytes()));
        Zeroizing::new(format!("Basic {}", encoded.as_str()))
    }

    async fn exchange(&self, style: ClientAuthMethod) -> Result<HttpResponse, TokenError> {
        let to_token_error = |e: oidc_http::HttpError| TokenError::Http(format_http_error(&e, CONTEXT));

        let mut form = vec![("grant_type", "client_credentials")];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }

        let mut request = self.client.post(self.token_endpoint.as_str());
        match style {
            ClientAuthMethod::Form => {
                form.push(("client_id", self.client_id.as_str()));
                form.push(("client_secret", self.client_secret.expose()));
            }
            _ => {
                request = request.sensitive_header(AUTHORIZATION, &self.basic_credentials());
            }
        }

        request
            .form(&form)
            .map_err(to_token_error)?
            .send()
            .await
            .map_err(to_token_error)
    }
}

/// Answers that mean "wrong way of presenting the credentials".
fn credentials_refused(status: StatusCode) -> bool {
    matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
}

#[async_trait]
impl AsyncTokenSource for OAuthTokenSource {
    type Error = TokenError;

    async fn request_token(&mut self) -> Result<TokenWithLifetime, Self::Error> {
        let mut style = self.first_style();
        let mut response = self.exchange(style).await?;

        if self.probing() && credentials_refused(response.status()) {
            tracing::debug!(
                status = %response.status(),
                "Basic client authentication refused, trying form credentials"
            );
            style = ClientAuthMethod::Form;
            response = self.exchange(style).await?;
        }

        let grant: TokenResponse = response
            .error_for_status()
            .map_err(|e| TokenError::Http(format_http_error(&e, CONTEXT)))?
            .json()
            .await
            .map_err(|e| TokenError::InvalidResponse(format_http_error(&e, CONTEXT)))?;

        if let Some(kind) = grant.token_type.as_deref()
            && !kind.eq_ignore_ascii_case("bearer")
        {
            return Err(TokenError::UnsupportedTokenType(kind.to_owned()));
        }

        if self.probing() {
            tracing::info!(method = %style, "token endpoint accepts this client authentication");
            self.detected = Some(style);
        }

        let lifetime = grant.expires_in.unwrap_or_else(|| self.default_ttl.as_secs());
        let (freshness, min_stale) =
            refresh_params(lifetime, self.refresh_offset, self.min_refresh_period);
        tracing::debug!(expires_in = lifetime, "access token issued");

        Ok(TokenLifetimeConfig::new(freshness, min_stale).create_token(
            &AccessToken::new(grant.access_token),
            None::<&IdToken>,
            DurationSecs(lifetime),
        ))
    }
}

/// Map a token lifetime onto aliri's `(freshness, min_staleness)` pair.
///
/// The token turns stale `refresh_offset` before expiry, or at half its life
/// when the offset does not fit. `min_refresh_period` never pushes the stale
/// point past that, so stale always precedes expired.
#[allow(clippy::integer_division, clippy::cast_precision_loss)]
fn refresh_params(
    lifetime: u64,
    refresh_offset: Duration,
    min_refresh_period: Duration,
) -> (f64, DurationSecs) {
    if lifetime == 0 {
        return (0.0, DurationSecs(0));
    }

    let stale_after = lifetime
        .checked_sub(refresh_offset.as_secs())
        .filter(|&d| d > 0)
        .unwrap_or(lifetime / 2);

    (
        stale_after as f64 / lifetime as f64,
        DurationSecs(min_refresh_period.as_secs().min(stale_after)),
    )
}
