//! Credential Loader: builds the mutually-authenticated TLS transport.
//!
//! The client certificate, its private key and the CA bundle are read once,
//! validated, and frozen into a [`SecureTransport`]. The transport is cheap
//! to clone and safe to share, read-only, across any number of concurrent
//! requests.

use crate::crypto;
use crate::prelude::debug;
use resolve_client::StaticClientCertResolver;
use rustls::client::ResolvesClientCert;
use rustls::ClientConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod error;
pub(crate) mod parsing;

pub use error::CredentialError;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Locations of the three PEM files making up the client's TLS material.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CredentialPaths {
    /// Client certificate chain, leaf first.
    pub cert: PathBuf,
    /// Private key of the client certificate.
    pub key: PathBuf,
    /// CA certificates trusted to sign server certificates.
    pub ca_bundle: PathBuf,
}

impl CredentialPaths {
    /// Groups the three credential paths.
    pub fn new(
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
        ca_bundle: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            ca_bundle: ca_bundle.into(),
        }
    }
}

/// Immutable HTTPS client transport: client identity, trust store and request timeout.
///
/// Built by [`SecureTransport::builder`]. Cloning shares the underlying
/// [`rustls::ClientConfig`].
#[derive(Clone)]
pub struct SecureTransport {
    pub(crate) tls: Arc<ClientConfig>,
    pub(crate) timeout: Duration,
}

impl std::fmt::Debug for SecureTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureTransport")
            .field("tls", &"<Arc<ClientConfig>>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SecureTransport {
    /// Starts building a transport from the given credential files.
    pub fn builder(paths: CredentialPaths) -> SecureTransportBuilder {
        SecureTransportBuilder::new(paths)
    }

    /// Loads the credentials with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`SecureTransportBuilder::build`].
    pub fn load(
        cert: impl AsRef<Path>,
        key: impl AsRef<Path>,
        ca_bundle: impl AsRef<Path>,
    ) -> Result<Self, CredentialError> {
        Self::builder(CredentialPaths::new(
            cert.as_ref(),
            key.as_ref(),
            ca_bundle.as_ref(),
        ))
        .build()
    }

    /// Upper bound on one request, connection and handshake included.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The TLS client configuration presented to every server.
    pub fn client_config(&self) -> &Arc<ClientConfig> {
        &self.tls
    }
}

/// Builds a [`SecureTransport`] from PEM files.
///
/// The resulting transport:
///
/// * presents the client certificate chain, signed by the paired private key
/// * validates each server certificate against the CA bundle only (no system roots)
/// * bounds every request by the configured timeout
///
/// # Examples
///
/// ```no_run
/// use puppet_cache_invalidate::{CredentialPaths, SecureTransport};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = SecureTransport::builder(CredentialPaths::new(
///     "/etc/puppetlabs/puppet/ssl/certs/admin.pem",
///     "/etc/puppetlabs/puppet/ssl/private_keys/admin.pem",
///     "/etc/puppetlabs/puppet/ssl/certs/ca.pem",
/// ))
/// .timeout(Duration::from_secs(5))
/// .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SecureTransportBuilder {
    paths: CredentialPaths,
    timeout: Duration,
}

impl SecureTransportBuilder {
    /// Creates a new builder.
    ///
    /// Defaults:
    /// - Timeout: [`DEFAULT_TIMEOUT`] (10 seconds)
    pub fn new(paths: CredentialPaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the credential files and builds the transport.
    ///
    /// Only the file system is touched; no connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if:
    ///
    /// * any of the three files is missing or unreadable
    /// * the certificate file holds no parseable certificate
    /// * the key file holds no supported private key
    /// * the private key does not match the certificate
    /// * the CA bundle holds no valid certificate
    pub fn build(self) -> Result<SecureTransport, CredentialError> {
        let provider = crypto::provider();
        let paths = &self.paths;

        let cert_chain = parsing::read_certificates(&paths.cert)?;
        let Some(leaf) = cert_chain.first() else {
            return Err(CredentialError::NoCertificate {
                path: paths.cert.clone(),
            });
        };
        parsing::inspect_leaf(leaf, &paths.cert)?;

        let key = parsing::read_private_key(&paths.key)?;
        let certified_key = parsing::certified_key_from_chain_and_key(cert_chain, key, &provider)?;

        let roots = parsing::roots_from_certs(
            parsing::read_certificates(&paths.ca_bundle)?,
            &paths.ca_bundle,
        )?;

        let resolver: Arc<dyn ResolvesClientCert> =
            Arc::new(StaticClientCertResolver { certified_key });

        let mut cfg = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_client_cert_resolver(resolver);

        cfg.alpn_protocols = vec![b"http/1.1".to_vec()];

        debug!(
            "built TLS client configuration (timeout {:?})",
            self.timeout
        );

        Ok(SecureTransport {
            tls: Arc::new(cfg),
            timeout: self.timeout,
        })
    }
}

mod resolve_client {
    use rustls::client::ResolvesClientCert;
    use rustls::sign::CertifiedKey;
    use std::sync::Arc;

    #[derive(Debug)]
    pub(crate) struct StaticClientCertResolver {
        pub certified_key: Arc<CertifiedKey>,
    }

    impl ResolvesClientCert for StaticClientCertResolver {
        fn resolve(
            &self,
            _root_hint_subjects: &[&[u8]],
            _sigschemes: &[rustls::SignatureScheme],
        ) -> Option<Arc<CertifiedKey>> {
            Some(Arc::clone(&self.certified_key))
        }

        fn has_certs(&self) -> bool {
            true
        }
    }
}
