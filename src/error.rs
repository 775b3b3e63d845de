//! Crate-level error types.

use crate::credentials::CredentialError;
use thiserror::Error;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole invalidation run before any server is contacted.
///
/// Per-server failures are never reported through this type; they are
/// recorded in the [`InvalidationReport`](crate::InvalidationReport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The client certificate, private key or CA bundle could not be used.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The run is misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Configuration problems detected before any network activity.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The server list is empty.
    #[error("empty puppetservers list")]
    NoServers,

    /// A server address is empty.
    #[error("server address must not be empty")]
    EmptyServerAddress,

    /// The per-request timeout is zero.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// No environment was named and invalidating every environment was not requested.
    #[error("requires a Puppet environment (or --all-environments)")]
    MissingCacheIdentifier,

    /// The home directory needed for the configuration search path is unknown.
    #[cfg(feature = "cli")]
    #[error("cannot determine the home directory")]
    NoHomeDirectory,

    /// The configuration could not be read or deserialized.
    #[cfg(feature = "cli")]
    #[error("loading configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl PartialEq for ConfigurationError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NoServers, Self::NoServers)
            | (Self::EmptyServerAddress, Self::EmptyServerAddress)
            | (Self::ZeroTimeout, Self::ZeroTimeout)
            | (Self::MissingCacheIdentifier, Self::MissingCacheIdentifier) => true,
            #[cfg(feature = "cli")]
            (Self::NoHomeDirectory, Self::NoHomeDirectory) => true,
            _ => false,
        }
    }
}
