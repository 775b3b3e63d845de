//! Invalidation Client: one `DELETE` request against one server.
//!
//! The request URL is fully determined by the server address, the admin port
//! and the cache identifier; see [`InvalidationTarget`]. The request is sent
//! through a [`Transport`], bounded by the transport's timeout, and succeeds
//! only on `204 No Content`. There are no retries.

use crate::prelude::debug;
use crate::{CacheIdentifier, ServerAddress};
use hyper::StatusCode;
use std::future::Future;
use std::net::Ipv6Addr;
use std::pin::Pin;
use std::time::Duration;
use url::{Host, Position, Url};

mod connector;
mod error;

pub use error::{InvalidationError, TransportError};

/// Port of the Puppet Server administrative API.
pub const DEFAULT_ADMIN_PORT: u16 = 8140;

/// Path of the environment cache resource.
pub const ENVIRONMENT_CACHE_PATH: &str = "/puppet-admin-api/v1/environment-cache";

const ENVIRONMENT_QUERY_KEY: &str = "environment";

/// Future returned by [`Transport::delete`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StatusCode, TransportError>> + Send + 'a>>;

/// Carries one `DELETE` request to a server and reports the response status.
///
/// [`SecureTransport`](crate::SecureTransport) is the production
/// implementation. Implementations are shared read-only by every concurrent
/// request and must not retry.
pub trait Transport: Send + Sync + 'static {
    /// Sends `DELETE` to `target` and returns the response status.
    fn delete<'a>(&'a self, target: &'a InvalidationTarget) -> TransportFuture<'a>;

    /// Upper bound on one call to [`Transport::delete`].
    fn timeout(&self) -> Duration;
}

/// The fully-resolved URL of one invalidation request.
///
/// `https://<server>:<port>/puppet-admin-api/v1/environment-cache`, followed
/// by `?environment=<cache>` unless the cache identifier is empty.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InvalidationTarget {
    server: ServerAddress,
    cache: CacheIdentifier,
    url: Url,
}

impl InvalidationTarget {
    /// Resolves the target on the default admin port.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidationError::InvalidTarget`] if the server address
    /// cannot form a URL host.
    pub fn new(server: ServerAddress, cache: CacheIdentifier) -> Result<Self, InvalidationError> {
        Self::with_port(server, cache, DEFAULT_ADMIN_PORT)
    }

    /// Resolves the target on the given admin port.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidationError::InvalidTarget`] if the server address
    /// cannot form a URL host.
    pub fn with_port(
        server: ServerAddress,
        cache: CacheIdentifier,
        port: u16,
    ) -> Result<Self, InvalidationError> {
        let host = match server.as_str().parse::<Ipv6Addr>() {
            Ok(ip) => format!("[{ip}]"),
            Err(_) => server.as_str().to_owned(),
        };

        let invalid = |source| InvalidationError::InvalidTarget {
            server: server.clone(),
            source,
        };

        let mut url = Url::parse(&format!("https://{host}:{port}{ENVIRONMENT_CACHE_PATH}"))
            .map_err(invalid)?;

        // A host smuggling a path, query, fragment or user info would change the resource.
        if url.path() != ENVIRONMENT_CACHE_PATH
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.port_or_known_default() != Some(port)
        {
            return Err(invalid(url::ParseError::InvalidDomainCharacter));
        }

        if !cache.is_all() {
            url.query_pairs_mut()
                .append_pair(ENVIRONMENT_QUERY_KEY, cache.as_str());
        }

        Ok(Self { server, cache, url })
    }

    /// The server the request is for.
    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    /// The cache identifier carried by the request.
    pub fn cache(&self) -> &CacheIdentifier {
        &self.cache
    }

    /// The complete request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The admin port the request is sent to.
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(DEFAULT_ADMIN_PORT)
    }

    pub(crate) fn host(&self) -> Option<Host<&str>> {
        self.url.host()
    }

    /// `host:port`, as sent in the `Host` header.
    pub(crate) fn authority(&self) -> &str {
        &self.url[Position::BeforeHost..Position::AfterPort]
    }

    /// Origin-form request target: path plus optional query.
    pub(crate) fn path_and_query(&self) -> &str {
        &self.url[Position::BeforePath..Position::AfterQuery]
    }
}

/// Invalidates `cache` on `server`, on the default admin port.
///
/// Issues exactly one `DELETE` request through `transport`. Invalidating an
/// already-invalidated cache is a no-op on the server and succeeds.
///
/// # Errors
///
/// Returns an [`InvalidationError`] naming `server` if the URL cannot be
/// built, the request fails or times out, or the status is not `204`.
pub async fn invalidate<T>(
    server: &ServerAddress,
    cache: &CacheIdentifier,
    transport: &T,
) -> Result<(), InvalidationError>
where
    T: Transport + ?Sized,
{
    let target = InvalidationTarget::new(server.clone(), cache.clone())?;
    invalidate_target(&target, transport).await
}

/// Sends the request for an already-resolved target.
///
/// # Errors
///
/// See [`invalidate`].
pub async fn invalidate_target<T>(
    target: &InvalidationTarget,
    transport: &T,
) -> Result<(), InvalidationError>
where
    T: Transport + ?Sized,
{
    debug!("[{}] DELETE {}", target.server(), target.url());

    let timeout = transport.timeout();
    let status = match tokio::time::timeout(timeout, transport.delete(target)).await {
        Ok(Ok(status)) => status,
        Ok(Err(source)) => {
            return Err(InvalidationError::Transport {
                server: target.server().clone(),
                source,
            })
        }
        Err(_elapsed) => {
            return Err(InvalidationError::Timeout {
                server: target.server().clone(),
                timeout,
            })
        }
    };

    if status != StatusCode::NO_CONTENT {
        return Err(InvalidationError::UnexpectedStatus {
            server: target.server().clone(),
            status,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server(host: &str) -> ServerAddress {
        ServerAddress::new(host).unwrap()
    }

    #[test]
    fn test_target_with_environment() {
        let target =
            InvalidationTarget::new(server("host-a"), CacheIdentifier::new("production")).unwrap();

        assert_eq!(
            target.url().as_str(),
            "https://host-a:8140/puppet-admin-api/v1/environment-cache?environment=production"
        );
        assert_eq!(target.authority(), "host-a:8140");
        assert_eq!(
            target.path_and_query(),
            "/puppet-admin-api/v1/environment-cache?environment=production"
        );
    }

    #[test]
    fn test_target_all_environments_omits_query() {
        let target = InvalidationTarget::new(server("host-a"), CacheIdentifier::all()).unwrap();

        assert_eq!(
            target.url().as_str(),
            "https://host-a:8140/puppet-admin-api/v1/environment-cache"
        );
        assert_eq!(target.url().query(), None);
        assert_eq!(
            target.path_and_query(),
            "/puppet-admin-api/v1/environment-cache"
        );
    }

    #[test]
    fn test_target_encodes_environment() {
        let target =
            InvalidationTarget::new(server("host-a"), CacheIdentifier::new("feature/a b&c"))
                .unwrap();

        assert_eq!(
            target.url().query(),
            Some("environment=feature%2Fa+b%26c")
        );
    }

    #[test]
    fn test_target_ip_hosts() {
        let v4 = InvalidationTarget::new(server("10.0.0.7"), CacheIdentifier::all()).unwrap();
        assert_eq!(v4.authority(), "10.0.0.7:8140");

        let v6 = InvalidationTarget::new(server("::1"), CacheIdentifier::all()).unwrap();
        assert_eq!(
            v6.url().as_str(),
            "https://[::1]:8140/puppet-admin-api/v1/environment-cache"
        );
    }

    #[test]
    fn test_target_custom_port() {
        let target =
            InvalidationTarget::with_port(server("host-a"), CacheIdentifier::all(), 443).unwrap();
        assert_eq!(target.port(), 443);
        assert_eq!(target.authority(), "host-a");
    }

    #[test]
    fn test_target_rejects_smuggled_path() {
        for host in ["host-a/other", "host-a?x=1", "user@host-a", "host a", "host-a:99"] {
            let err = InvalidationTarget::new(server(host), CacheIdentifier::all()).unwrap_err();
            assert!(
                matches!(err, InvalidationError::InvalidTarget { .. }),
                "{host}: {err:?}"
            );
            assert_eq!(err.server().as_str(), host);
        }
    }

    struct FixedStatus {
        status: StatusCode,
        calls: AtomicUsize,
    }

    impl Transport for FixedStatus {
        fn delete<'a>(&'a self, _target: &'a InvalidationTarget) -> TransportFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.status;
            Box::pin(async move { Ok(status) })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    #[tokio::test]
    async fn test_invalidate_no_content_is_success() {
        let transport = FixedStatus {
            status: StatusCode::NO_CONTENT,
            calls: AtomicUsize::new(0),
        };

        invalidate(&server("host-a"), &CacheIdentifier::new("production"), &transport)
            .await
            .unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_other_status_is_error() {
        for status in [StatusCode::OK, StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR] {
            let transport = FixedStatus {
                status,
                calls: AtomicUsize::new(0),
            };

            let err = invalidate(&server("host-a"), &CacheIdentifier::all(), &transport)
                .await
                .unwrap_err();

            assert_eq!(err.status(), Some(status));
            assert_eq!(err.server().as_str(), "host-a");
            assert!(err.to_string().contains(&status.as_u16().to_string()));
            assert_eq!(transport.calls.load(Ordering::SeqCst), 1, "no retries");
        }
    }

    struct Hanging;

    impl Transport for Hanging {
        fn delete<'a>(&'a self, _target: &'a InvalidationTarget) -> TransportFuture<'a> {
            Box::pin(std::future::pending::<Result<StatusCode, TransportError>>())
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_times_out() {
        let start = tokio::time::Instant::now();

        let err = invalidate(&server("host-a"), &CacheIdentifier::all(), &Hanging)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    struct Refused;

    impl Transport for Refused {
        fn delete<'a>(&'a self, _target: &'a InvalidationTarget) -> TransportFuture<'a> {
            Box::pin(async {
                Err(TransportError::Connect(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )))
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    #[tokio::test]
    async fn test_invalidate_wraps_transport_error() {
        let err = invalidate(&server("host-b"), &CacheIdentifier::all(), &Refused)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InvalidationError::Transport {
                source: TransportError::Connect(_),
                ..
            }
        ));
        assert_eq!(err.server().as_str(), "host-b");
    }
}
