//! Endpoint abstraction for transport-agnostic addressing.
//!
//! An [`Endpoint`] names a bindable or connectable address: a transport kind
//! plus host, port and path. Equality and hashing follow the rules in the
//! data model: `Tcp` endpoints compare only `(host, port)` — the path is
//! irrelevant to TCP identity — while every other transport compares all
//! four fields. Host comparison is always case-insensitive.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The transport family an [`Endpoint`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// In-process byte-queue transport, scoped to the current process.
    Inproc,
    /// TCP stream transport.
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inproc => write!(f, "inproc"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

/// Addressable endpoint: `(transport, host, port, path)`.
///
/// `path` defaults to `"/"` when empty or omitted. String form is
/// `"<transport>://<host>:<port><path>"`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    transport: Transport,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Build an endpoint directly, normalizing host case and empty paths.
    #[must_use]
    pub fn new(transport: Transport, host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        let host = host.into().to_lowercase();
        let mut path = path.into();
        if path.is_empty() {
            path = "/".to_string();
        }
        Self {
            transport,
            host,
            port,
            path,
        }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parse an endpoint URI: `<scheme>://<host>:<port><path>`.
    ///
    /// `scheme` is one of `tcp` or `inproc`, case-insensitively. `inproc`
    /// endpoints need not carry a real port; `0` is substituted when absent,
    /// since the transport never binds an OS socket.
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| EndpointError::InvalidScheme(s.to_string()))?;

        let transport = match scheme.to_lowercase().as_str() {
            "tcp" => Transport::Tcp,
            "inproc" => Transport::Inproc,
            other => return Err(EndpointError::InvalidScheme(other.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(authority.to_string()))?;

        if host.is_empty() {
            return Err(EndpointError::MissingHost(s.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(port.to_string()))?;

        Ok(Self::new(transport, host, port, path))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.transport, self.host, self.port, self.path)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        if self.transport != other.transport {
            return false;
        }
        if self.transport == Transport::Tcp {
            self.host == other.host && self.port == other.port
        } else {
            self.host == other.host && self.port == other.port && self.path == other.path
        }
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.transport.hash(state);
        self.host.hash(state);
        self.port.hash(state);
        if self.transport != Transport::Tcp {
            self.path.hash(state);
        }
    }
}

/// Errors parsing or validating an endpoint URI.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid scheme in endpoint: {0} (expected tcp:// or inproc://)")]
    InvalidScheme(String),

    #[error("endpoint missing host: {0}")]
    MissingHost(String),

    #[error("endpoint missing port: {0}")]
    MissingPort(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp() {
        let ep = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert_eq!(ep.transport(), Transport::Tcp);
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 5555);
        assert_eq!(ep.path(), "/");
        assert_eq!(ep.to_string(), "tcp://127.0.0.1:5555/");
    }

    #[test]
    fn parses_tcp_with_path() {
        let ep = Endpoint::parse("tcp://127.0.0.1:5555/queue").unwrap();
        assert_eq!(ep.path(), "/queue");
    }

    #[test]
    fn parses_inproc() {
        let ep = Endpoint::parse("inproc://broker:0/jobs").unwrap();
        assert_eq!(ep.transport(), Transport::Inproc);
        assert_eq!(ep.path(), "/jobs");
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            Endpoint::parse("http://host:1"),
            Err(EndpointError::InvalidScheme(_))
        ));
    }

    #[test]
    fn tcp_equality_ignores_path() {
        let a = Endpoint::new(Transport::Tcp, "Host", 1234, "/a");
        let b = Endpoint::new(Transport::Tcp, "host", 1234, "/b");
        assert_eq!(a, b);
    }

    #[test]
    fn inproc_equality_requires_matching_path() {
        let a = Endpoint::new(Transport::Inproc, "x", 0, "/a");
        let b = Endpoint::new(Transport::Inproc, "x", 0, "/b");
        assert_ne!(a, b);
    }

    #[test]
    fn host_is_case_insensitive() {
        let a = Endpoint::new(Transport::Tcp, "Example.COM", 80, "/");
        let b = Endpoint::new(Transport::Tcp, "example.com", 80, "/");
        assert_eq!(a, b);
        assert_eq!(a.host(), "example.com");
    }

    #[test]
    fn empty_path_defaults_to_slash() {
        let ep = Endpoint::new(Transport::Tcp, "h", 1, "");
        assert_eq!(ep.path(), "/");
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(e: &Endpoint) -> u64 {
            let mut h = DefaultHasher::new();
            e.hash(&mut h);
            h.finish()
        }

        let a = Endpoint::new(Transport::Tcp, "Host", 1, "/a");
        let b = Endpoint::new(Transport::Tcp, "host", 1, "/b");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
