//! Service configuration from environment variables

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hikconnect_client::{DEFAULT_BASE_URL, DEFAULT_USERNAME};
use url::Url;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized cloud base URL (`scheme://host[:port]`)
    pub base_url: String,
    /// Opaque session token for cloud calls
    pub session_id: Option<String>,
    /// Local device address; empty disables the local-first path
    pub local_ip: String,
    pub local_username: String,
    /// Local device password; empty disables the local-first path
    pub local_password: String,
    pub poll_interval: Duration,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Read configuration from the environment
    pub fn from_env() -> Result<Self> {
        let base_url = normalize_base_url(&env_or("HIKCONNECT_BASE_URL", DEFAULT_BASE_URL))?;

        let session_id = std::env::var("HIKCONNECT_SESSION_ID")
            .ok()
            .filter(|s| !s.is_empty());

        let poll_interval_secs = env_or("POLL_INTERVAL_SECS", "5")
            .parse::<u64>()
            .context("POLL_INTERVAL_SECS must be an integer")?;
        if poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be positive");
        }

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000")
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address")?;

        Ok(Self {
            base_url,
            session_id,
            local_ip: env_or("INTERCOM_LOCAL_IP", ""),
            local_username: env_or("INTERCOM_LOCAL_USERNAME", DEFAULT_USERNAME),
            local_password: env_or("INTERCOM_LOCAL_PASSWORD", ""),
            poll_interval: Duration::from_secs(poll_interval_secs),
            bind_addr,
        })
    }

    /// The local-first path runs only when address and credential are
    /// both configured
    #[must_use]
    pub fn local_enabled(&self) -> bool {
        !self.local_ip.is_empty() && !self.local_password.is_empty()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate the cloud base URL and normalize it to `scheme://host[:port]`
fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid base URL: {raw}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("base URL scheme must be http or https: {raw}");
    }
    if !url.path().is_empty() && url.path() != "/" {
        bail!("base URL must not carry a path: {raw}");
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("base URL must not carry a query or fragment: {raw}");
    }

    let host = url.host_str().context("base URL is missing a host")?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_host() {
        assert_eq!(
            normalize_base_url("https://api.hik-connect.com").unwrap(),
            "https://api.hik-connect.com"
        );
    }

    #[test]
    fn test_normalize_strips_trailing_slash_keeps_port() {
        assert_eq!(
            normalize_base_url("http://apiieu.hik-connect.com:8080/").unwrap(),
            "http://apiieu.hik-connect.com:8080"
        );
    }

    #[test]
    fn test_rejects_bad_scheme() {
        assert!(normalize_base_url("ftp://api.hik-connect.com").is_err());
    }

    #[test]
    fn test_rejects_path_and_query() {
        assert!(normalize_base_url("https://api.hik-connect.com/v3").is_err());
        assert!(normalize_base_url("https://api.hik-connect.com?x=1").is_err());
    }

    #[test]
    fn test_local_requires_address_and_password() {
        let mut config = Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_id: None,
            local_ip: String::new(),
            local_username: DEFAULT_USERNAME.to_string(),
            local_password: String::new(),
            poll_interval: Duration::from_secs(5),
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
        };
        assert!(!config.local_enabled());

        config.local_ip = "192.168.1.50".to_string();
        assert!(!config.local_enabled());

        config.local_password = "secret".to_string();
        assert!(config.local_enabled());
    }
}
