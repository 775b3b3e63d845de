//! Configuration file and environment loading for the command-line tool.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. either the file given explicitly, or the optional search path
//!    `/etc/puppet-environment-cache-invalidate.{yaml,toml,json,...}` then
//!    `$HOME/.puppet-environment-cache-invalidate/puppet-environment-cache-invalidate.*`
//! 2. environment variables prefixed with `PUPPET_CACHE_INVALIDATE_`, nested
//!    keys separated by `__` (e.g. `PUPPET_CACHE_INVALIDATE_AUTH__CERTFILE`),
//!    `PUPPET_CACHE_INVALIDATE_PUPPETSERVERS` as a comma-separated list.
//!
//! ```yaml
//! puppetservers:
//!   - puppet01.example.org
//!   - puppet02.example.org
//! auth:
//!   certfile: /etc/puppetlabs/puppet/ssl/certs/admin.pem
//!   pkfile: /etc/puppetlabs/puppet/ssl/private_keys/admin.pem
//!   ca-bundle: /etc/puppetlabs/puppet/ssl/certs/ca.pem
//! timeout: 10
//! log-syslog: true
//! ```

use crate::credentials::{CredentialPaths, DEFAULT_TIMEOUT};
use crate::error::ConfigurationError;
use crate::{CacheIdentifier, InvalidationJob, ServerAddress, DEFAULT_ADMIN_PORT};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the tool, used for configuration file names.
pub const APP_NAME: &str = "puppet-environment-cache-invalidate";

/// Prefix of the environment variables overriding file settings.
pub const ENV_PREFIX: &str = "PUPPET_CACHE_INVALIDATE";

/// Settings of one invalidation run, as read from files and the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Hosts of the Puppet servers.
    #[serde(default)]
    pub puppetservers: Vec<String>,
    /// TLS client credentials.
    pub auth: AuthSettings,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// Admin API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,
    /// Log in JSON format.
    #[serde(default, rename = "log-json", alias = "log_json")]
    pub log_json: bool,
    /// Send logs to the local syslog daemon instead of stdout.
    #[serde(default, rename = "log-syslog", alias = "log_syslog")]
    pub log_syslog: bool,
}

/// Paths of the TLS client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSettings {
    /// Client certificate (PEM).
    pub certfile: PathBuf,
    /// Client private key (PEM).
    pub pkfile: PathBuf,
    /// CA certificates trusted to sign the servers' certificates (PEM).
    #[serde(rename = "ca-bundle", alias = "ca_bundle")]
    pub ca_bundle: PathBuf,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_port() -> u16 {
    DEFAULT_ADMIN_PORT
}

impl Settings {
    /// Loads settings from `explicit` if given, otherwise from the search path,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Load`] if an explicit file is missing or
    /// any source is malformed or incomplete, and
    /// [`ConfigurationError::NoHomeDirectory`] if the search path cannot be built.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();

        match explicit {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                for stem in search_path()? {
                    builder = builder
                        .add_source(File::with_name(&stem.to_string_lossy()).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("puppetservers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Validated server addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoServers`] if the list is empty and
    /// [`ConfigurationError::EmptyServerAddress`] if an entry is blank.
    pub fn servers(&self) -> Result<Vec<ServerAddress>, ConfigurationError> {
        if self.puppetservers.is_empty() {
            return Err(ConfigurationError::NoServers);
        }
        self.puppetservers
            .iter()
            .map(|s| ServerAddress::new(s.as_str()))
            .collect()
    }

    /// Credential file paths.
    pub fn credentials(&self) -> CredentialPaths {
        CredentialPaths::new(
            &self.auth.certfile,
            &self.auth.pkfile,
            &self.auth.ca_bundle,
        )
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Describes the run invalidating `cache` with these settings.
    ///
    /// # Errors
    ///
    /// See [`Settings::servers`]. Returns [`ConfigurationError::ZeroTimeout`]
    /// if the timeout is zero.
    pub fn into_job(self, cache: CacheIdentifier) -> Result<InvalidationJob, ConfigurationError> {
        let servers = self.servers()?;
        if self.timeout == 0 {
            return Err(ConfigurationError::ZeroTimeout);
        }
        Ok(InvalidationJob {
            servers,
            cache,
            credentials: self.credentials(),
            timeout: self.timeout(),
            admin_port: self.port,
        })
    }
}

/// Configuration file stems searched when no file is given, lowest precedence first.
///
/// # Errors
///
/// Returns [`ConfigurationError::NoHomeDirectory`] if the home directory is unknown.
pub fn search_path() -> Result<Vec<PathBuf>, ConfigurationError> {
    let home = directories::BaseDirs::new()
        .ok_or(ConfigurationError::NoHomeDirectory)?
        .home_dir()
        .to_path_buf();

    Ok(vec![
        Path::new("/etc").join(APP_NAME),
        home.join(format!(".{APP_NAME}")).join(APP_NAME),
    ])
}
