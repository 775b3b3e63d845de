//! Fan-Out Coordinator: one concurrent invalidation per server, all results kept.
//!
//! [`Coordinator::invalidate_all`] spawns one Tokio task per server (no cap,
//! no batching; the fleet is a handful to a few dozen admin hosts), lets them
//! run in parallel against one shared transport, and waits for **every** task
//! before returning. A slow or failing server delays nothing but its own
//! outcome, and no failure short-circuits the batch.

use crate::client::{self, InvalidationError, InvalidationTarget, Transport, DEFAULT_ADMIN_PORT};
use crate::error::ConfigurationError;
use crate::prelude::{debug, error};
use crate::{CacheIdentifier, ServerAddress};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

/// Result of the invalidation request sent to one server.
#[derive(Debug)]
pub struct InvalidationOutcome {
    server: ServerAddress,
    cache: CacheIdentifier,
    error: Option<InvalidationError>,
}

impl InvalidationOutcome {
    fn new(server: ServerAddress, cache: CacheIdentifier, result: Result<(), InvalidationError>) -> Self {
        Self {
            server,
            cache,
            error: result.err(),
        }
    }

    /// The server the request was sent to.
    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// The cache identifier the request carried.
    pub fn cache(&self) -> &CacheIdentifier {
        &self.cache
    }

    /// The failure, if the server's cache was not invalidated.
    pub fn error(&self) -> Option<&InvalidationError> {
        self.error.as_ref()
    }

    /// Returns `true` if the server answered `204 No Content`.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every outcome of one fan-out, one per input server, in input order.
#[derive(Debug)]
pub struct InvalidationReport {
    outcomes: Vec<InvalidationOutcome>,
}

impl InvalidationReport {
    /// The aggregate verdict: `true` only if every server succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(InvalidationOutcome::is_success)
    }

    /// All outcomes, in the order the servers were given.
    pub fn outcomes(&self) -> &[InvalidationOutcome] {
        &self.outcomes
    }

    /// Outcomes of the servers whose cache was invalidated.
    pub fn successes(&self) -> impl Iterator<Item = &InvalidationOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Outcomes of the servers that failed.
    pub fn failures(&self) -> impl Iterator<Item = &InvalidationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Number of outcomes, equal to the number of servers.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Always `false` for a report produced by a coordinator.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Consumes the report, returning the outcomes.
    pub fn into_outcomes(self) -> Vec<InvalidationOutcome> {
        self.outcomes
    }
}

impl IntoIterator for InvalidationReport {
    type Item = InvalidationOutcome;
    type IntoIter = std::vec::IntoIter<InvalidationOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Drives one invalidation request per server over a shared transport.
///
/// # Examples
///
/// ```no_run
/// use puppet_cache_invalidate::{CacheIdentifier, Coordinator, SecureTransport, ServerAddress};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = SecureTransport::load("admin.pem", "admin.key", "ca.pem")?;
///
/// let report = Coordinator::new(transport)
///     .invalidate_all(
///         &[ServerAddress::new("puppet01")?, ServerAddress::new("puppet02")?],
///         &CacheIdentifier::new("production"),
///     )
///     .await?;
///
/// println!("all invalidated: {}", report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Coordinator<T> {
    transport: Arc<T>,
    admin_port: u16,
}

impl<T> std::fmt::Debug for Coordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("transport", &"<Arc<Transport>>")
            .field("admin_port", &self.admin_port)
            .finish()
    }
}

impl<T> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            admin_port: self.admin_port,
        }
    }
}

impl<T: Transport> Coordinator<T> {
    /// Creates a coordinator targeting the default admin port.
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    /// Creates a coordinator over an already shared transport.
    pub fn from_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            admin_port: DEFAULT_ADMIN_PORT,
        }
    }

    /// Sets the admin API port requests are sent to.
    #[must_use]
    pub fn admin_port(mut self, port: u16) -> Self {
        self.admin_port = port;
        self
    }

    /// Invalidates `cache` on every server, concurrently.
    ///
    /// Returns exactly one outcome per entry of `servers` (duplicates
    /// included), only after every request has completed or timed out.
    ///
    /// Must be called from within a Tokio runtime; requests run in parallel
    /// on a multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoServers`] if `servers` is empty, before
    /// any request is issued. Per-server failures are reported in the
    /// [`InvalidationReport`], never here.
    pub async fn invalidate_all(
        &self,
        servers: &[ServerAddress],
        cache: &CacheIdentifier,
    ) -> Result<InvalidationReport, ConfigurationError> {
        if servers.is_empty() {
            return Err(ConfigurationError::NoServers);
        }

        let tasks: Vec<(ServerAddress, JoinHandle<InvalidationOutcome>)> = servers
            .iter()
            .map(|server| {
                let task = tokio::spawn(invalidate_one(
                    Arc::clone(&self.transport),
                    server.clone(),
                    cache.clone(),
                    self.admin_port,
                ));
                (server.clone(), task)
            })
            .collect();

        // Dropping this future mid-flight must not leave requests running.
        let _abort_guard = AbortOnDrop(tasks.iter().map(|(_, task)| task.abort_handle()).collect());

        // Join barrier: every task is awaited, whatever order they finish in.
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (server, task) in tasks {
            let outcome = task.await.unwrap_or_else(|join_error| {
                error!("[{server}] invalidation task ended abnormally: {join_error}");
                InvalidationOutcome::new(
                    server.clone(),
                    cache.clone(),
                    Err(InvalidationError::Aborted {
                        server,
                        reason: join_error.to_string(),
                    }),
                )
            });
            outcomes.push(outcome);
        }

        let report = InvalidationReport { outcomes };
        debug!(
            "invalidation of '{}' finished on {} server(s), {} failed",
            cache,
            report.len(),
            report.failures().count()
        );

        Ok(report)
    }
}

struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn invalidate_one<T: Transport>(
    transport: Arc<T>,
    server: ServerAddress,
    cache: CacheIdentifier,
    port: u16,
) -> InvalidationOutcome {
    let result = match InvalidationTarget::with_port(server.clone(), cache.clone(), port) {
        Ok(target) => client::invalidate_target(&target, transport.as_ref()).await,
        Err(e) => Err(e),
    };
    InvalidationOutcome::new(server, cache, result)
}

/// Invalidates `cache` on every server over `transport`, on the default admin port.
///
/// Shorthand for [`Coordinator::from_shared`] followed by
/// [`Coordinator::invalidate_all`].
///
/// # Errors
///
/// Returns [`ConfigurationError::NoServers`] if `servers` is empty.
pub async fn invalidate_all<T: Transport>(
    servers: &[ServerAddress],
    cache: &CacheIdentifier,
    transport: Arc<T>,
) -> Result<InvalidationReport, ConfigurationError> {
    Coordinator::from_shared(transport)
        .invalidate_all(servers, cache)
        .await
}
