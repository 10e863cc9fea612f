//! TCP connection to the easyq server.

use crate::error::{FotaError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Host used when the address is a bare port
pub const DEFAULT_HOST: &str = "localhost";

/// Server endpoint, parsed from `HOST:PORT`, `[V6]:PORT` or `PORT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest
                .split_once("]:")
                .ok_or_else(|| FotaError::config(format!("malformed address: {:?}", s)))?;
            (host, port)
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) if !host.contains(':') => (host, port),
                Some(_) => {
                    return Err(FotaError::config(format!(
                        "IPv6 address must be bracketed: {:?}",
                        s
                    )))
                }
                None => ("", s),
            }
        };

        let port: u16 = port
            .parse()
            .map_err(|_| FotaError::config(format!("invalid port in address {:?}", s)))?;
        if port == 0 {
            return Err(FotaError::config("port must be non-zero"));
        }

        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl FromStr for Address {
    type Err = FotaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Open the connection. A `timeout` of `None` waits as long as the OS does.
pub async fn connect(addr: &Address, timeout: Option<Duration>) -> Result<TcpStream> {
    let connecting = TcpStream::connect((addr.host.as_str(), addr.port));
    let stream = match timeout {
        Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
            FotaError::transport(
                "connecting",
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no connection to {} within {:?}", addr, limit),
                ),
            )
        })?,
        None => connecting.await,
    }
    .map_err(|e| FotaError::transport("connecting", e))?;

    // Commands are small and latency matters more than batching.
    stream
        .set_nodelay(true)
        .map_err(|e| FotaError::transport("configuring socket", e))?;

    tracing::debug!(%addr, peer = ?stream.peer_addr().ok(), "connected");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_host_port() {
        let addr = Address::parse("queue.local:1085").unwrap();
        assert_eq!(addr.host, "queue.local");
        assert_eq!(addr.port, 1085);
        assert_eq!(addr.to_string(), "queue.local:1085");
    }

    #[test]
    fn test_parse_bare_port_uses_default_host() {
        let addr: Address = "1085".parse().unwrap();
        assert_eq!(addr.host, DEFAULT_HOST);
        assert_eq!(addr.port, 1085);

        let addr = Address::parse(":1085").unwrap();
        assert_eq!(addr.host, DEFAULT_HOST);
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let addr = Address::parse("[::1]:1085").unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.to_string(), "[::1]:1085");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "host:", "host:abc", "host:70000", "host:0", "::1:80", "[::1]80"] {
            assert!(
                matches!(Address::parse(bad), Err(FotaError::Config(_))),
                "expected config error for {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_connect_and_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let addr = Address {
            host: "127.0.0.1".to_string(),
            port,
        };
        let stream = connect(&addr, Some(Duration::from_secs(5))).await.unwrap();
        assert!(stream.nodelay().unwrap());

        drop(stream);
        drop(listener);
        let err = connect(&addr, Some(Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, FotaError::Transport { .. }));
    }
}
