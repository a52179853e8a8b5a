//! towel.toml configuration

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "towel.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowelConfig {
    /// Server under test
    pub server: ServerConfig,

    /// In-process determinism service
    pub mock_server: MockServerConfig,

    /// Setup script execution
    pub setup: SetupConfig,
}

/// Server under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Scheme and host, e.g. `http://127.0.0.1`
    pub address: String,

    pub port: u16,

    /// Per-request timeout; unset waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1".to_string(),
            port: 9292,
            timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Determinism service started around `run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockServerConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".to_string(),
            port: 8029,
        }
    }
}

impl MockServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let raw = format!("{}:{}", self.address, self.port);
        raw.parse()
            .with_context(|| format!("invalid mock_server address {}", raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Interpreter setup scripts are handed to
    pub shell: String,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl TowelConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Command-line values take precedence over the `[server]` table
    pub fn with_overrides(mut self, address: Option<String>, port: Option<u16>) -> Self {
        if let Some(address) = address {
            self.server.address = address;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TowelConfig::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, TowelConfig::default());
        assert_eq!(config.server.address, "http://127.0.0.1");
        assert_eq!(config.server.port, 9292);
        assert!(!config.mock_server.enabled);
        assert_eq!(config.setup.shell, "bash");
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "[server]\nport = 8080\ntimeout_secs = 5\n\n[mock_server]\nenabled = true\n",
        )
        .unwrap();

        let config = TowelConfig::load(&path).unwrap();
        assert_eq!(config.server.address, "http://127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.timeout(), Some(Duration::from_secs(5)));
        assert!(config.mock_server.enabled);
        assert_eq!(
            config.mock_server.socket_addr().unwrap(),
            "127.0.0.1:8029".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[server]\nport = \"not a port\"\n").unwrap();
        assert!(TowelConfig::load(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = TowelConfig::default().with_overrides(Some("http://10.0.0.5".to_string()), None);
        assert_eq!(config.server.address, "http://10.0.0.5");
        assert_eq!(config.server.port, 9292);

        let config = config.with_overrides(None, Some(1234));
        assert_eq!(config.server.port, 1234);
    }

    #[test]
    fn test_bad_mock_address() {
        let mock = MockServerConfig {
            address: "not-an-ip".to_string(),
            ..MockServerConfig::default()
        };
        assert!(mock.socket_addr().is_err());
    }
}
