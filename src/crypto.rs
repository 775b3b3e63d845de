use rustls::crypto::CryptoProvider;
use std::sync::Arc;

/// Returns the crypto provider selected at compile time.
///
/// The provider is handed to every config builder explicitly; nothing is
/// installed as the process-wide default.
pub(crate) fn provider() -> Arc<CryptoProvider> {
    Arc::new(crypto_provider())
}

#[cfg(feature = "ring")]
fn crypto_provider() -> CryptoProvider {
    rustls::crypto::ring::default_provider()
}

#[cfg(feature = "aws-lc-rs")]
fn crypto_provider() -> CryptoProvider {
    rustls::crypto::aws_lc_rs::default_provider()
}
