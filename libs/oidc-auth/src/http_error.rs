use oidc_http::HttpError;

/// One-line description of `e` for a [`TokenError`](crate::TokenError),
/// led by the step that failed (`"OIDC discovery"`, `"OAuth2 token"`).
///
/// Error pages from the identity provider are left out: a status renders as
/// the code and reason only.
#[must_use]
pub fn format_http_error(e: &HttpError, prefix: &str) -> String {
    let detail = match e {
        HttpError::HttpStatus { status, .. } => format!("HTTP {status}"),
        HttpError::Json(err) => format!("returned unexpected JSON: {err}"),
        HttpError::Timeout(after) => format!("got no response within {after:?}"),
        HttpError::Transport(err) => format!("could not connect: {err}"),
        HttpError::Tls(err) => format!("TLS handshake failed: {err}"),
        HttpError::BodyTooLarge { limit, actual } => {
            format!("response exceeds {limit} bytes ({actual} read)")
        }
        HttpError::InvalidUri { url, reason, .. } => format!("cannot use URL '{url}': {reason}"),
        HttpError::InvalidScheme { scheme, reason } => {
            format!("refused scheme '{scheme}': {reason}")
        }
        HttpError::RequestBuild(err) => format!("could not build request: {err}"),
        HttpError::InvalidHeaderName(err) => format!("bad header name: {err}"),
        HttpError::InvalidHeaderValue(err) => format!("bad header value: {err}"),
        HttpError::FormEncode(err) => format!("could not encode form: {err}"),
        HttpError::Overloaded => "not sent, client overloaded".to_owned(),
        HttpError::ServiceClosed => "not sent, client shut down".to_owned(),
        _ => "request failed".to_owned(),
    };
    format!("{prefix} {detail}")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_without_body() {
        let err = HttpError::HttpStatus {
            status: http::StatusCode::BAD_REQUEST,
            body_preview: r#"{"error":"invalid_client","error_description":"secret expired"}"#.into(),
            content_type: Some("application/json".into()),
        };
        assert_eq!(format_http_error(&err, "OAuth2 token"), "OAuth2 token HTTP 400 Bad Request");
    }

    #[test]
    fn prefix_leads_every_message() {
        let errors = [
            HttpError::Timeout(Duration::from_secs(3)),
            HttpError::Overloaded,
            HttpError::InvalidScheme {
                scheme: "http".into(),
                reason: "HTTPS required".into(),
            },
        ];
        let rendered: Vec<String> = errors
            .iter()
            .map(|e| format_http_error(e, "OIDC discovery"))
            .collect();

        assert_eq!(
            rendered,
            [
                "OIDC discovery got no response within 3s",
                "OIDC discovery not sent, client overloaded",
                "OIDC discovery refused scheme 'http': HTTPS required",
            ]
        );
    }
}
