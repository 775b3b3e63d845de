//! Internal PEM reading and key material helpers.

use crate::credentials::error::CredentialError;
use crate::prelude::{debug, warn};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::{InconsistentKeys, RootCertStore};
use std::path::Path;
use std::sync::Arc;
use x509_parser::error::X509Error;
use x509_parser::nom::Err;
use zeroize::Zeroizing;

fn read(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads every PEM `CERTIFICATE` block of a file, in order.
///
/// Other PEM sections are skipped.
pub(crate) fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, CredentialError> {
    let pem = read(path)?;

    rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CredentialError::Pem {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads the first PKCS#8, PKCS#1 or SEC1 private key of a file.
///
/// The file contents are zeroized once parsed.
pub(crate) fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, CredentialError> {
    let pem = Zeroizing::new(read(path)?);

    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| CredentialError::Pem {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CredentialError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

/// Checks that the leaf certificate parses as X.509 and reports its validity window.
///
/// An expired certificate is not rejected here: the server is the authority
/// on what it accepts, so the problem is only surfaced in the logs.
pub(crate) fn inspect_leaf(leaf: &CertificateDer<'_>, path: &Path) -> Result<(), CredentialError> {
    let cert = match x509_parser::parse_x509_certificate(leaf.as_ref()) {
        Ok((_, cert)) => cert,
        Err(Err::Incomplete(_)) => {
            return Err(CredentialError::Certificate {
                path: path.to_path_buf(),
                source: X509Error::InvalidCertificate,
            })
        }
        Err(Err::Error(source) | Err::Failure(source)) => {
            return Err(CredentialError::Certificate {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let validity = cert.validity();
    debug!(
        "loaded client certificate: subject={}, not_after={}",
        cert.subject(),
        validity.not_after
    );

    if !validity.is_valid() {
        warn!(
            "client certificate {} is outside its validity window ({} - {})",
            cert.subject(),
            validity.not_before,
            validity.not_after
        );
    }

    Ok(())
}

/// Build a `RootCertStore` from DER-encoded certificate authorities.
///
/// Certificates that fail to parse are skipped.
///
/// ## Errors
///
/// Returns [`CredentialError::EmptyTrustStore`] if no certificates are accepted into the store.
pub(crate) fn roots_from_certs(
    certs: Vec<CertificateDer<'static>>,
    path: &Path,
) -> Result<Arc<RootCertStore>, CredentialError> {
    let mut store = RootCertStore::empty();

    let (added, ignored) = store.add_parsable_certificates(certs);

    debug!(
        "loaded {added} root cert(s) from {}, ignored {ignored}",
        path.display()
    );

    if store.is_empty() {
        return Err(CredentialError::EmptyTrustStore {
            path: path.to_path_buf(),
        });
    }

    Ok(Arc::new(store))
}

/// Build a rustls `CertifiedKey` from a cert chain and a private key.
///
/// ## Errors
///
/// Returns [`CredentialError::UnsupportedKey`] if the provider can't load the
/// key, and [`CredentialError::KeyMismatch`] if the key does not belong to the
/// leaf certificate.
pub(crate) fn certified_key_from_chain_and_key(
    cert_chain: Vec<CertificateDer<'static>>,
    key_der: PrivateKeyDer<'static>,
    provider: &CryptoProvider,
) -> Result<Arc<CertifiedKey>, CredentialError> {
    let signing_key = provider
        .key_provider
        .load_private_key(key_der)
        .map_err(CredentialError::UnsupportedKey)?;

    let certified_key = CertifiedKey::new(cert_chain, signing_key);

    match certified_key.keys_match() {
        // Some key types cannot report their public half; rustls defers to the handshake.
        Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {}
        Err(rustls::Error::InconsistentKeys(InconsistentKeys::KeyMismatch)) => {
            return Err(CredentialError::KeyMismatch)
        }
        Err(e) => return Err(CredentialError::Rustls(e)),
    }

    Ok(Arc::new(certified_key))
}
