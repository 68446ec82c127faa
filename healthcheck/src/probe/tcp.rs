//! Reachability probe: can a TCP connection be opened to the dependency

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use url::Url;

use super::Probe;
use crate::{check::CheckResult, error::HealthError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a connection string (`scheme://[user[:pw]@]host[:port][/db]`) or `host:port`
    ///
    /// `default_port` is used when the target does not name a port.
    pub fn parse(target: &str, default_port: Option<u16>) -> Result<Self, HealthError> {
        let (host, port) = if target.contains("://") {
            let url = Url::parse(target).map_err(|err| {
                HealthError::configuration(format!("Invalid connection string {}: {}", target, err))
            })?;
            let host = url
                .host_str()
                .map(|host| trim_brackets(host).to_string())
                .unwrap_or_default();
            (host, url.port().or(default_port))
        } else {
            match target.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| {
                        HealthError::configuration(format!("Invalid port in {}", target))
                    })?;
                    (trim_brackets(host).to_string(), Some(port))
                }
                None => (target.to_string(), default_port),
            }
        };

        if host.is_empty() {
            return Err(HealthError::configuration(format!(
                "Missing host in {}",
                target
            )));
        }
        let port = port
            .ok_or_else(|| HealthError::configuration(format!("Missing port in {}", target)))?;

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// IPv6 literals are written `[::1]` in targets but resolved without the brackets
fn trim_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

#[async_trait]
impl Probe for TcpProbe {
    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn probe(&self) -> CheckResult {
        // An unresolvable host is a mistake in the target, not an unreachable dependency
        let addrs: Vec<_> = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|err| {
                HealthError::configuration(format!("Failed to resolve {}: {}", self.target(), err))
            })?
            .collect();
        if addrs.is_empty() {
            return Err(HealthError::configuration(format!(
                "No addresses found for {}",
                self.target()
            )));
        }

        let stream = TcpStream::connect(addrs.as_slice())
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::TimedOut => HealthError::timeout(format!(
                    "Connection to {} timed out",
                    self.target()
                )),
                _ => HealthError::connection(format!(
                    "Failed to connect to {}: {}",
                    self.target(),
                    err
                )),
            })?;

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.target());
        drop(stream);

        Ok(Some(format!("connected to {}", peer)))
    }
}
