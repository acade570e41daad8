//! rustls configuration derived from a [`TlsPolicy`].

use std::sync::{Arc, OnceLock};

use hyper_rustls::ConfigBuilderExt;
use rustls::SupportedProtocolVersion;
use rustls::crypto::CryptoProvider;
use rustls_pki_types::{CertificateDer, ServerName};

use crate::config::{TlsPolicy, TlsRootConfig, TlsVersion};
use crate::error::HttpError;

/// Loaded on first use; an empty list means the OS store had nothing usable.
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

static ONLY_TLS13: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

fn tls_error(msg: String) -> HttpError {
    HttpError::Tls(msg.into())
}

/// Certificates from the OS store, read once per process.
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(|| {
        let loaded = rustls_native_certs::load_native_certs();
        for err in &loaded.errors {
            tracing::warn!(error = %err, "skipping unreadable native root certificate");
        }
        tracing::debug!(count = loaded.certs.len(), "native root certificates loaded");
        loaded.certs
    })
}

/// The installed process default, or aws-lc-rs when none is installed.
pub fn get_crypto_provider() -> Arc<CryptoProvider> {
    match CryptoProvider::get_default() {
        Some(provider) => Arc::clone(provider),
        None => Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
    }
}

fn restricted_provider(policy: &TlsPolicy) -> Result<Arc<CryptoProvider>, HttpError> {
    let base = get_crypto_provider();
    let Some(allowed) = &policy.cipher_suites else {
        return Ok(base);
    };

    let mut provider = CryptoProvider::clone(&base);
    provider.cipher_suites.retain(|s| allowed.contains(&s.suite()));
    if provider.cipher_suites.is_empty() {
        return Err(tls_error(format!(
            "none of the allowed cipher suites {allowed:?} is supported"
        )));
    }
    Ok(Arc::new(provider))
}

fn native_root_store() -> Result<rustls::RootCertStore, HttpError> {
    let certs = native_root_certs();
    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());

    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates failed to parse");
    }
    if added == 0 {
        return Err(tls_error(format!(
            "no usable native root certificates ({} found, {ignored} unparseable)",
            certs.len()
        )));
    }
    Ok(store)
}

/// Protocol versions and cipher suites from the policy, trust anchors still
/// open.
fn policy_builder(
    policy: &TlsPolicy,
) -> Result<rustls::ConfigBuilder<rustls::ClientConfig, rustls::WantsVerifier>, HttpError> {
    let versions = match policy.min_version {
        TlsVersion::Tls12 => rustls::ALL_VERSIONS,
        TlsVersion::Tls13 => ONLY_TLS13,
    };
    rustls::ClientConfig::builder_with_provider(restricted_provider(policy)?)
        .with_protocol_versions(versions)
        .map_err(|e| HttpError::Tls(Box::new(e)))
}

/// # Errors
///
/// [`HttpError::Tls`] when no allowed suite works with the enabled protocol
/// versions, or when native roots are requested and none load.
pub fn client_config(
    policy: &TlsPolicy,
    roots: TlsRootConfig,
) -> Result<rustls::ClientConfig, HttpError> {
    let builder = policy_builder(policy)?;
    let builder = match roots {
        TlsRootConfig::WebPki => builder.with_webpki_roots(),
        TlsRootConfig::Native => builder.with_root_certificates(native_root_store()?),
    };
    Ok(builder.with_no_client_auth())
}

/// # Errors
///
/// [`HttpError::Tls`] if the configured name is neither a DNS name nor an
/// IP address.
pub fn expected_server_name(policy: &TlsPolicy) -> Result<Option<ServerName<'static>>, HttpError> {
    let Some(name) = &policy.server_name else {
        return Ok(None);
    };
    ServerName::try_from(name.clone())
        .map(Some)
        .map_err(|e| tls_error(format!("invalid expected server name '{name}': {e}")))
}
