//! HTTP settings of the API binary.
//!
//! Pipeline settings (storage, Label Studio, dataset paths) live in
//! [`PipelineConfig`](lswb_core::config::PipelineConfig); this only covers
//! how the service listens and how long it lets requests run.

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

use lswb_core::config::{env_list, env_or, env_parse};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:8080"];

/// `POST /frames/load` answers only once the harvest pass ends, which can
/// take most of an hour.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3600;

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API and download the archive.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Time in-flight requests get after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `8000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:8080` |
    /// | `REQUEST_TIMEOUT_SECS`  | `3600`                  |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", DEFAULT_PORT),
            cors_origins: env_list("CORS_ORIGINS", DEFAULT_CORS_ORIGINS),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.trim().parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            request_timeout_secs: 3600,
            shutdown_timeout_secs: 30,
        }
    }

    #[test]
    fn bind_addr_accepts_v4_and_v6() {
        assert_eq!(config("0.0.0.0").bind_addr().unwrap().to_string(), "0.0.0.0:8000");
        assert_eq!(config("::1").bind_addr().unwrap().to_string(), "[::1]:8000");
        assert!(config("localhost").bind_addr().is_err());
    }

    #[test]
    fn timeouts_are_whole_seconds() {
        let c = config("127.0.0.1");
        assert_eq!(c.request_timeout(), Duration::from_secs(3600));
        assert_eq!(c.shutdown_timeout(), Duration::from_secs(30));
    }
}
