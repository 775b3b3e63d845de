//! Error types for a single invalidation request.

use crate::ServerAddress;
use hyper::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by a [`Transport`](crate::Transport) while exchanging one request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// DNS resolution or the TCP connection failed.
    #[error("connecting: {0}")]
    Connect(#[source] std::io::Error),

    /// The TLS handshake failed (including certificate rejection on either side).
    #[error("TLS handshake: {0}")]
    Tls(#[source] std::io::Error),

    /// The host cannot be used as a TLS server name.
    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    /// The HTTP request could not be built.
    #[error("building HTTP request: {0}")]
    Request(#[from] hyper::http::Error),

    /// The HTTP exchange failed.
    #[error("performing HTTP request: {0}")]
    Http(#[from] hyper::Error),
}

/// Failure of the invalidation request sent to one server.
///
/// Every variant names the server it concerns. These errors are recorded in
/// the outcome for that server; they never abort requests to other servers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvalidationError {
    /// No request URL can be built for the server.
    #[error("[{server}] invalid request target: {source}")]
    InvalidTarget {
        /// The server the request was meant for.
        server: ServerAddress,
        /// The URL parsing error.
        source: url::ParseError,
    },

    /// The request could not be carried out.
    #[error("[{server}] {source}")]
    Transport {
        /// The server the request was sent to.
        server: ServerAddress,
        /// The underlying transport failure.
        source: TransportError,
    },

    /// The server did not answer within the transport timeout.
    #[error("[{server}] no response within {timeout:?}")]
    Timeout {
        /// The server the request was sent to.
        server: ServerAddress,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The server answered with something other than `204 No Content`.
    #[error("[{server}] bad HTTP status response. Got {}", status.as_u16())]
    UnexpectedStatus {
        /// The server that answered.
        server: ServerAddress,
        /// The status it answered with.
        status: StatusCode,
    },

    /// The task carrying the request ended abnormally.
    #[error("[{server}] invalidation task aborted: {reason}")]
    Aborted {
        /// The server the request was meant for.
        server: ServerAddress,
        /// Why the task ended.
        reason: String,
    },
}

impl InvalidationError {
    /// Returns the server the failed request was meant for.
    pub fn server(&self) -> &ServerAddress {
        match self {
            Self::InvalidTarget { server, .. }
            | Self::Transport { server, .. }
            | Self::Timeout { server, .. }
            | Self::UnexpectedStatus { server, .. }
            | Self::Aborted { server, .. } => server,
        }
    }

    /// Returns the HTTP status when the server answered with an unexpected one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the request hit the transport timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
