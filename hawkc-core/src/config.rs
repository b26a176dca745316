//! # Client Configuration
//!
//! [`ClientConfig`] describes how to reach a Hawk server and builds the matching
//! transport stack.
use crate::protocol::DecodeLimits;
use crate::transport::{Endpoint, HttpTransport, TcpTransport, Transport};
use http::uri::{InvalidUri, PathAndQuery};
use http::{HeaderName, HeaderValue};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PATH: &str = "/thrift/hawk/compact";

/// How messages are carried to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// Compact messages tunnelled through HTTP `POST` requests.
    #[default]
    Http,
    /// Compact messages written straight to the socket.
    Socket,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "socket" | "tcp" => Ok(TransportKind::Socket),
            _ => Err(ConfigError::UnknownTransport(s.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::Socket => f.write_str("socket"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown transport '{0}', expected 'http' or 'socket'")]
    UnknownTransport(String),
    #[error("Invalid HTTP path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: InvalidUri,
    },
    #[error("Invalid header '{0}', expected 'name: value'")]
    MalformedHeader(String),
    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),
    #[error("Invalid value for header '{0}'")]
    InvalidHeaderValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Request path, only used by [`TransportKind::Http`].
    pub path: String,
    pub transport: TransportKind,
    /// Read, write and connect timeout. `None` blocks forever.
    pub timeout: Option<Duration>,
    /// Extra HTTP headers sent with every request.
    pub headers: Vec<(String, String)>,
    pub limits: DecodeLimits,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            transport: TransportKind::default(),
            timeout: None,
            headers: Vec::new(),
            limits: DecodeLimits::default(),
        }
    }
}

impl ClientConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Builds the (still closed) transport stack described by this configuration.
    pub fn build_transport(&self) -> Result<Box<dyn Transport>, ConfigError> {
        let endpoint = self.endpoint();
        let socket = TcpTransport::new(endpoint.clone()).with_timeout(self.timeout);

        match self.transport {
            TransportKind::Socket => Ok(Box::new(socket)),
            TransportKind::Http => {
                let path =
                    PathAndQuery::from_str(&self.path).map_err(|source| ConfigError::InvalidPath {
                        path: self.path.clone(),
                        source,
                    })?;

                let mut http = HttpTransport::new(socket, endpoint, path);
                for (name, value) in &self.headers {
                    let (name, value) = parse_header(name, value)?;
                    http = http.with_header(name, value);
                }
                Ok(Box::new(http))
            }
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let header_name = HeaderName::from_str(name.trim())
        .map_err(|_| ConfigError::InvalidHeaderName(name.to_string()))?;
    let header_value = HeaderValue::from_str(value.trim())
        .map_err(|_| ConfigError::InvalidHeaderValue(name.to_string()))?;
    Ok((header_name, header_value))
}

/// Splits a `name: value` header given on the command line.
pub fn split_header(raw: &str) -> Result<(String, String), ConfigError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::MalformedHeader(raw.to_string()))?;
    parse_header(name, value)?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_hawk_over_http() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint().to_string(), "localhost:8080");
        assert_eq!(config.path, "/thrift/hawk/compact");
        assert_eq!(config.transport, TransportKind::Http);
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!("socket".parse::<TransportKind>().unwrap(), TransportKind::Socket);
        assert!(matches!(
            "udp".parse::<TransportKind>(),
            Err(ConfigError::UnknownTransport(_))
        ));
    }

    #[test]
    fn built_transport_starts_closed() {
        for transport in [TransportKind::Http, TransportKind::Socket] {
            let config = ClientConfig {
                transport,
                ..ClientConfig::default()
            };
            assert!(!config.build_transport().unwrap().is_open());
        }
    }

    #[test]
    fn invalid_path_is_rejected() {
        let config = ClientConfig {
            path: "not a path".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.build_transport(),
            Err(ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn headers_are_split_and_validated() {
        assert_eq!(
            split_header("Authorization: Bearer abc").unwrap(),
            ("Authorization".to_string(), "Bearer abc".to_string())
        );
        assert!(matches!(
            split_header("no-colon"),
            Err(ConfigError::MalformedHeader(_))
        ));
        assert!(matches!(
            split_header("bad name: x"),
            Err(ConfigError::InvalidHeaderName(_))
        ));
    }
}
