//! Environment-driven configuration.
//!
//! Keys are read without a prefix and matched case-insensitively:
//! `ISSUER`, `CLIENT_ID`, `CLIENT_SECRET`, `LOKI`, `SERVER` and the optional
//! `AUTH_METHOD` (`auto`, `basic` or `form`).

use std::fmt;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::Env;
use oidc_auth::{ClientAuthMethod, OAuthClientConfig, SecretString};
use oidc_http::HttpClientConfig;
use serde::Deserialize;
use url::Url;

const KEYS: [&str; 6] = [
    "ISSUER",
    "CLIENT_ID",
    "CLIENT_SECRET",
    "LOKI",
    "SERVER",
    "AUTH_METHOD",
];

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// OIDC issuer base URL.
    pub issuer: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Base URL of the Loki instance.
    pub loki: Url,
    /// Name the TLS certificate of every contacted host must carry.
    pub server: String,
    #[serde(default)]
    pub auth_method: ClientAuthMethod,
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a required key is missing, a URL does not parse, or
    /// `SERVER` is blank. The message names the offending key.
    pub fn from_env() -> Result<Self> {
        Self::from_figment(&Figment::new().merge(Env::raw().only(&KEYS)))
    }

    fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .context("invalid configuration in environment")?;
        if config.server.trim().is_empty() {
            anyhow::bail!("SERVER must not be empty");
        }
        Ok(config)
    }

    /// Client-credentials settings for the authenticated fetcher.
    #[must_use]
    pub fn oauth_client_config(&self) -> OAuthClientConfig {
        OAuthClientConfig {
            issuer_url: Some(self.issuer.clone()),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_method: self.auth_method,
            ..OAuthClientConfig::default()
        }
    }

    /// Strict HTTPS transport pinned to `SERVER`.
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig::strict(self.server.as_str())
    }
}

/// `KEY=value` lines with the secret redacted, as printed by
/// `--print-config`.
impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ISSUER={}", self.issuer)?;
        writeln!(f, "CLIENT_ID={}", self.client_id)?;
        writeln!(f, "CLIENT_SECRET={}", self.client_secret)?;
        writeln!(f, "LOKI={}", self.loki)?;
        writeln!(f, "SERVER={}", self.server)?;
        write!(f, "AUTH_METHOD={}", self.auth_method)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("issuer", &self.issuer.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("loki", &self.loki.as_str())
            .field("server", &self.server)
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn full_env() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("ISSUER", Some("https://idp.example.com/realms/ops")),
            ("CLIENT_ID", Some("loki-reader")),
            ("CLIENT_SECRET", Some("s3cret-value")),
            ("LOKI", Some("https://logs.example.com")),
            ("SERVER", Some("logs.example.com")),
            ("AUTH_METHOD", None),
        ]
    }

    fn with_env<R>(overrides: &[(&'static str, Option<&'static str>)], f: impl FnOnce() -> R) -> R {
        let mut vars = full_env();
        for &(key, value) in overrides {
            if let Some(slot) = vars.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                vars.push((key, value));
            }
        }
        temp_env::with_vars(vars, f)
    }

    #[test]
    fn loads_all_keys() {
        let config = with_env(&[], AppConfig::from_env).unwrap();

        assert_eq!(config.issuer.as_str(), "https://idp.example.com/realms/ops");
        assert_eq!(config.client_id, "loki-reader");
        assert_eq!(config.client_secret.expose(), "s3cret-value");
        assert_eq!(config.loki.as_str(), "https://logs.example.com/");
        assert_eq!(config.server, "logs.example.com");
        assert_eq!(config.auth_method, ClientAuthMethod::AutoDetect);
    }

    #[test]
    fn auth_method_override() {
        let config = with_env(&[("AUTH_METHOD", Some("form"))], AppConfig::from_env).unwrap();
        assert_eq!(config.auth_method, ClientAuthMethod::Form);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let config = with_env(
            &[("LOKI", None), ("loki", Some("https://other.example.com"))],
            AppConfig::from_env,
        )
        .unwrap();
        assert_eq!(config.loki.host_str(), Some("other.example.com"));
    }

    #[test]
    fn missing_key_is_named() {
        let err = with_env(&[("CLIENT_SECRET", None)], AppConfig::from_env).unwrap_err();
        let msg = format!("{err:#}").to_lowercase();
        assert!(msg.contains("client_secret"), "{msg}");
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = with_env(&[("ISSUER", Some("not a url"))], AppConfig::from_env).unwrap_err();
        let msg = format!("{err:#}").to_lowercase();
        assert!(msg.contains("issuer"), "{msg}");
    }

    #[test]
    fn unknown_auth_method_is_rejected() {
        let err = with_env(&[("AUTH_METHOD", Some("digest"))], AppConfig::from_env).unwrap_err();
        let msg = format!("{err:#}").to_lowercase();
        assert!(msg.contains("digest"), "{msg}");
    }

    #[test]
    fn blank_server_is_rejected() {
        let err = with_env(&[("SERVER", Some("  "))], AppConfig::from_env).unwrap_err();
        assert!(err.to_string().contains("SERVER"));
    }

    #[test]
    fn display_and_debug_redact_secret() {
        let config = with_env(&[], AppConfig::from_env).unwrap();

        let shown = config.to_string();
        assert!(shown.contains("CLIENT_SECRET=[REDACTED]"), "{shown}");
        assert!(shown.contains("AUTH_METHOD=auto"), "{shown}");
        assert!(!shown.contains("s3cret-value"));
        assert!(!format!("{config:?}").contains("s3cret-value"));
    }

    #[test]
    fn derived_client_configs() {
        let config = with_env(&[], AppConfig::from_env).unwrap();

        let oauth = config.oauth_client_config();
        assert!(oauth.validate().is_ok());
        assert!(oauth.token_endpoint.is_none());
        assert_eq!(oauth.scopes, vec!["openid", "profile", "email"]);

        let http = config.http_client_config();
        assert_eq!(http.tls.server_name.as_deref(), Some("logs.example.com"));
        assert_eq!(http.request_timeout, std::time::Duration::from_secs(3));
    }
}
