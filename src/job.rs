//! One complete invalidation run, described by an explicit value.

use crate::credentials::{CredentialPaths, SecureTransport, DEFAULT_TIMEOUT};
use crate::error::{ConfigurationError, Result};
use crate::fanout::{Coordinator, InvalidationReport};
use crate::{CacheIdentifier, ServerAddress, DEFAULT_ADMIN_PORT};
use std::path::PathBuf;
use std::time::Duration;

/// Everything needed to invalidate one cache across a fleet.
///
/// [`InvalidationJob::run`] fails fast, before contacting any server, on
/// configuration or credential problems. Once requests are issued, every
/// server's result lands in the returned [`InvalidationReport`].
#[derive(Debug, Clone)]
pub struct InvalidationJob {
    /// Servers to invalidate, one request each.
    pub servers: Vec<ServerAddress>,
    /// Environment whose cache is invalidated (empty for every environment).
    pub cache: CacheIdentifier,
    /// Client certificate, private key and CA bundle.
    pub credentials: CredentialPaths,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Admin API port.
    pub admin_port: u16,
}

impl InvalidationJob {
    /// Describes a run with the default timeout and admin port.
    pub fn new(
        servers: Vec<ServerAddress>,
        cache: CacheIdentifier,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
        ca_bundle: impl Into<PathBuf>,
    ) -> Self {
        Self {
            servers,
            cache,
            credentials: CredentialPaths::new(cert, key, ca_bundle),
            timeout: DEFAULT_TIMEOUT,
            admin_port: DEFAULT_ADMIN_PORT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the admin API port.
    #[must_use]
    pub fn admin_port(mut self, port: u16) -> Self {
        self.admin_port = port;
        self
    }

    /// Loads the credentials and invalidates the cache on every server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// server list is empty or the timeout is zero, and [`Error::Credential`](crate::Error::Credential)
    /// if the TLS material cannot be loaded. Neither touches the network.
    pub async fn run(&self) -> Result<InvalidationReport> {
        if self.servers.is_empty() {
            return Err(ConfigurationError::NoServers.into());
        }
        if self.timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout.into());
        }

        let transport = SecureTransport::builder(self.credentials.clone())
            .timeout(self.timeout)
            .build()?;

        let report = Coordinator::new(transport)
            .admin_port(self.admin_port)
            .invalidate_all(&self.servers, &self.cache)
            .await?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn job_with_absent_credentials(dir: &tempfile::TempDir) -> InvalidationJob {
        let absent = dir.path().join("absent.pem");
        InvalidationJob::new(
            vec![ServerAddress::new("puppet01").unwrap()],
            CacheIdentifier::new("production"),
            &absent,
            &absent,
            &absent,
        )
    }

    #[tokio::test]
    async fn test_run_rejects_zero_timeout_before_loading_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_absent_credentials(&dir).timeout(Duration::ZERO);

        let err = job.run().await.unwrap_err();

        assert!(
            matches!(err, Error::Configuration(ConfigurationError::ZeroTimeout)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_run_loads_credentials_with_nonzero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let job = job_with_absent_credentials(&dir).timeout(Duration::from_millis(1));

        let err = job.run().await.unwrap_err();

        assert!(matches!(err, Error::Credential(_)), "{err:?}");
    }
}
