use crate::error::ConfigurationError;
use std::fmt;

/// One target host, as a hostname or an IP address.
///
/// Invariant: never empty and carries no surrounding whitespace. No other
/// structural validation is performed; a host that cannot be turned into a
/// URL fails later, for that server only.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ServerAddress(String);

impl ServerAddress {
    /// Creates a server address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyServerAddress`] if `host` is empty or
    /// only whitespace.
    pub fn new(host: impl Into<String>) -> Result<Self, ConfigurationError> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(ConfigurationError::EmptyServerAddress);
        }
        if trimmed.len() == host.len() {
            Ok(Self(host))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    /// Returns the host as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServerAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ServerAddress {
    type Error = ConfigurationError;

    fn try_from(host: &str) -> Result<Self, Self::Error> {
        Self::new(host)
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = ConfigurationError;

    fn try_from(host: String) -> Result<Self, Self::Error> {
        Self::new(host)
    }
}

/// Name of the environment whose cache is invalidated.
///
/// The empty identifier is legal: the request then carries no `environment`
/// query parameter, which the server interprets as "every environment".
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct CacheIdentifier(String);

impl CacheIdentifier {
    /// Creates an identifier for the named environment.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The empty identifier, addressing every environment on the server.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns `true` when this identifier addresses every environment.
    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the environment name (empty for [`CacheIdentifier::all`]).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CacheIdentifier {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
