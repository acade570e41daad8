use std::fmt;

use serde::Deserialize;

/// How client credentials reach the token endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMethod {
    /// Try HTTP Basic first; on a 400/401 answer retry once with credentials
    /// in the body and keep whichever style the server accepted.
    #[default]
    #[serde(rename = "auto", alias = "autodetect")]
    AutoDetect,
    /// `Authorization: Basic base64(client_id:client_secret)` (RFC 6749 §2.3.1).
    Basic,
    /// `client_id` and `client_secret` as form fields.
    Form,
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AutoDetect => "auto",
            Self::Basic => "basic",
            Self::Form => "form",
        })
    }
}

/// Token endpoint response, `Deserialize` only so a token can never be
/// serialized back out by accident.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Must be `Bearer` (any case) when present.
    #[serde(default)]
    pub token_type: Option<String>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_auth_method_is_autodetect() {
        assert_eq!(ClientAuthMethod::default(), ClientAuthMethod::AutoDetect);
    }

    #[test]
    fn auth_method_from_config_strings() {
        let parse = |s: &str| serde_json::from_str::<ClientAuthMethod>(&format!("\"{s}\""));
        assert_eq!(parse("auto").unwrap(), ClientAuthMethod::AutoDetect);
        assert_eq!(parse("basic").unwrap(), ClientAuthMethod::Basic);
        assert_eq!(parse("form").unwrap(), ClientAuthMethod::Form);
        assert!(parse("digest").is_err());
    }

    #[test]
    fn display_matches_config_strings() {
        assert_eq!(ClientAuthMethod::AutoDetect.to_string(), "auto");
        assert_eq!(ClientAuthMethod::Form.to_string(), "form");
    }

    #[test]
    fn deserialize_minimal_response() {
        let r: TokenResponse = serde_json::from_str(r#"{"access_token":"tok"}"#).unwrap();
        assert_eq!(r.access_token, "tok");
        assert!(r.expires_in.is_none());
        assert!(r.token_type.is_none());
    }

    #[test]
    fn deserialize_ignores_unknown_fields() {
        let json = r#"{"access_token":"tok","expires_in":300,"scope":"openid profile email","not-before-policy":0}"#;
        let r: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(r.expires_in, Some(300));
    }
}
