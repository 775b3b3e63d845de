//! Error type for loading TLS client credentials.

use std::path::PathBuf;
use x509_parser::error::X509Error;

/// An error that may arise loading the client identity or the trust store.
///
/// Any of these aborts the run before a server is contacted: bad key
/// material would fail identically against every server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// A credential file could not be read.
    #[error("reading {}: {source}", path.display())]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A file is not valid PEM.
    #[error("decoding PEM from {}: {source}", path.display())]
    Pem {
        /// The offending file.
        path: PathBuf,
        /// The underlying decoding error.
        source: std::io::Error,
    },

    /// The certificate file holds no certificate.
    #[error("no certificate found in {}", path.display())]
    NoCertificate {
        /// The offending file.
        path: PathBuf,
    },

    /// The key file holds no private key.
    #[error("no private key found in {}", path.display())]
    NoPrivateKey {
        /// The offending file.
        path: PathBuf,
    },

    /// The client certificate is not a parseable X.509 certificate.
    #[error("failed parsing X.509 certificate from {}", path.display())]
    Certificate {
        /// The offending file.
        path: PathBuf,
        /// Error returned by the X.509 parsing library.
        #[source]
        source: X509Error,
    },

    /// The private key is of a type or encoding the crypto provider rejects.
    #[error("unsupported private key: {0}")]
    UnsupportedKey(#[source] rustls::Error),

    /// The private key does not belong to the client certificate.
    #[error("private key does not match the client certificate")]
    KeyMismatch,

    /// The CA bundle yielded no usable trust anchor.
    #[error("no valid CA certificate found in {}", path.display())]
    EmptyTrustStore {
        /// The offending file.
        path: PathBuf,
    },

    /// A rustls error occurred while assembling the client configuration.
    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),
}
