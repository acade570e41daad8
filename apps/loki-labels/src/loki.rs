use std::io::Write;

use anyhow::{Context, Result};
use oidc_auth::AuthenticatedFetcher;
use oidc_http::HttpError;
use serde::Deserialize;
use url::Url;

pub const LABELS_PATH: &str = "/loki/api/v1/labels";

/// Body of `GET /loki/api/v1/labels`.
#[derive(Debug, Deserialize)]
pub struct LokiLabels {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
}

impl LokiLabels {
    /// Label names joined with `", "`.
    #[must_use]
    pub fn joined(&self) -> String {
        self.data.join(", ")
    }
}

#[must_use]
pub fn labels_url(loki: &Url) -> String {
    format!("{}{LABELS_PATH}", loki.as_str().trim_end_matches('/'))
}

/// Fetch the label names known to `loki`.
///
/// # Errors
///
/// Any transport, status or decode failure from the fetcher.
pub async fn fetch_labels(
    fetcher: &AuthenticatedFetcher,
    loki: &Url,
) -> Result<LokiLabels, HttpError> {
    let labels: LokiLabels = fetcher.get_json(&labels_url(loki)).await?;
    tracing::debug!(status = %labels.status, count = labels.data.len(), "received labels");
    Ok(labels)
}

/// Fetch the labels and write `Labels: a, b, c` to `out`.
///
/// # Errors
///
/// The fetch failure, or a failed write to `out`.
pub async fn report_labels(
    fetcher: &AuthenticatedFetcher,
    loki: &Url,
    out: &mut impl Write,
) -> Result<()> {
    let labels = fetch_labels(fetcher, loki)
        .await
        .context("failed to fetch labels from Loki")?;
    writeln!(out, "Labels: {}", labels.joined()).context("failed to write labels")?;
    Ok(())
}
