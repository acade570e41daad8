//! OIDC provider metadata (`/.well-known/openid-configuration`).

use serde::Deserialize;
use url::Url;

use crate::http_error::format_http_error;
use crate::oauth2::TokenError;

/// The fields of the provider metadata this crate looks at.
///
/// Only `token_endpoint` is required; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocument {
    pub issuer: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Url,
    pub jwks_uri: Option<String>,
}

#[derive(Deserialize)]
struct RawDiscoveryDocument {
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    authorization_endpoint: Option<String>,
    token_endpoint: String,
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Well-known metadata URL for `issuer`, ignoring a trailing slash.
#[must_use]
pub fn discovery_url(issuer: &Url) -> String {
    let base = issuer.as_str().trim_end_matches('/');
    format!("{base}/.well-known/openid-configuration")
}

/// GET the provider metadata of `issuer`. No credentials are attached.
///
/// # Errors
///
/// [`TokenError::Http`] when the request fails or the status is not 2xx;
/// [`TokenError::InvalidResponse`] when the body is not JSON or has no
/// usable `token_endpoint`.
pub async fn discover(
    client: &oidc_http::HttpClient,
    issuer: &Url,
) -> Result<DiscoveryDocument, TokenError> {
    const CONTEXT: &str = "OIDC discovery";
    let http_failure = |e: oidc_http::HttpError| TokenError::Http(format_http_error(&e, CONTEXT));

    let url = discovery_url(issuer);
    tracing::debug!(%url, "requesting provider metadata");

    let response = client
        .get(&url)
        .send()
        .await
        .and_then(oidc_http::HttpResponse::error_for_status)
        .map_err(http_failure)?;
    let raw: RawDiscoveryDocument = response
        .json()
        .await
        .map_err(|e| TokenError::InvalidResponse(format_http_error(&e, CONTEXT)))?;

    let token_endpoint = Url::parse(&raw.token_endpoint).map_err(|e| {
        TokenError::InvalidResponse(format!("invalid token_endpoint URL in discovery document: {e}"))
    })?;

    tracing::info!(
        issuer = raw.issuer.as_deref().unwrap_or(issuer.as_str()),
        %token_endpoint,
        "OIDC provider discovered"
    );

    Ok(DiscoveryDocument {
        issuer: raw.issuer,
        authorization_endpoint: raw.authorization_endpoint,
        token_endpoint,
        jwks_uri: raw.jwks_uri,
    })
}
