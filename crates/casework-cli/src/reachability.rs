//! TCP reachability check feeding the connectivity monitor.

use std::sync::Arc;
use std::time::Duration;

use casework_core::SignalConnectivity;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::CliError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityProbe {
    host: String,
    port: u16,
}

impl ReachabilityProbe {
    /// Probe the host serving `base_url`.
    pub fn from_base_url(base_url: &str) -> Result<Self, CliError> {
        let url = Url::parse(base_url)
            .map_err(|error| CliError::Config(format!("Invalid API base URL: {error}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| CliError::Config(format!("API base URL has no host: {base_url}")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| CliError::Config(format!("API base URL has no port: {base_url}")))?;
        Ok(Self { host, port })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a TCP connection to the API host can be opened right now.
    pub async fn check(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!(address = %self.address(), "Reachability check failed: {error}");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address(), "Reachability check timed out");
                false
            }
        }
    }

    /// Re-check every `every` and report the result to `monitor`.
    pub fn spawn(self, monitor: Arc<SignalConnectivity>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            loop {
                ticks.tick().await;
                monitor.set_online(self.check().await);
            }
        })
    }
}
