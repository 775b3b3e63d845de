#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # puppet-cache-invalidate
//!
//! Invalidates the Puppet Server environment cache on a fleet of servers.
//!
//! One `DELETE /puppet-admin-api/v1/environment-cache` request is issued to
//! every server **concurrently**, over mutual TLS, and every server's result
//! is collected before returning. The aggregate succeeds only when every
//! server answered `204 No Content`; individual failures stay attached to the
//! server that produced them.
//!
//! The crate is split along the data flow:
//!
//! * [`credentials`] turns a client certificate, private key and CA bundle into
//!   an immutable [`SecureTransport`], failing fast on bad material.
//! * [`client`] builds and sends the single invalidation request for one server.
//! * [`fanout`] drives one request per server in parallel and gathers an
//!   [`InvalidationReport`].
//!
//! [`InvalidationJob`] ties the three together behind one explicit value.
//!
//! ## Example
//!
//! ```no_run
//! use puppet_cache_invalidate::{CacheIdentifier, InvalidationJob, ServerAddress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let report = InvalidationJob::new(
//!     vec![
//!         ServerAddress::new("puppet01.example.org")?,
//!         ServerAddress::new("puppet02.example.org")?,
//!     ],
//!     CacheIdentifier::new("production"),
//!     "/etc/puppetlabs/puppet/ssl/certs/admin.pem",
//!     "/etc/puppetlabs/puppet/ssl/private_keys/admin.pem",
//!     "/etc/puppetlabs/puppet/ssl/certs/ca.pem",
//! )
//! .run()
//! .await?;
//!
//! for outcome in report.failures() {
//!     eprintln!("{}: {}", outcome.server(), outcome.error().unwrap());
//! }
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! Exactly **one** `rustls` crypto provider must be enabled:
//!
//! * `ring` (default)
//! * `aws-lc-rs`
//!
//! Logging is emitted through `tracing` (default feature `tracing`) or `log`
//! (feature `logging`). The `cli` feature (default) adds configuration file
//! loading and the command-line binary.

#[cfg(all(feature = "ring", feature = "aws-lc-rs"))]
compile_error!("Enable only one crypto provider feature: `ring` or `aws-lc-rs`.");

#[cfg(not(any(feature = "ring", feature = "aws-lc-rs")))]
compile_error!("Enable one crypto provider feature: `ring` (default) or `aws-lc-rs`.");

mod observability;
mod prelude;

mod crypto;
mod types;

pub mod client;
pub mod credentials;
pub mod error;
pub mod fanout;
pub mod job;

#[cfg(feature = "cli")]
pub mod settings;

// Public re-exports
pub use client::{
    invalidate, InvalidationError, InvalidationTarget, Transport, TransportError,
    TransportFuture, DEFAULT_ADMIN_PORT, ENVIRONMENT_CACHE_PATH,
};
pub use credentials::{CredentialError, CredentialPaths, SecureTransport, SecureTransportBuilder};
pub use error::{ConfigurationError, Error, Result};
pub use fanout::{invalidate_all, Coordinator, InvalidationOutcome, InvalidationReport};
pub use job::InvalidationJob;
pub use types::{CacheIdentifier, ServerAddress};
