use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::AuditRetention;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: i64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Lifetime of a login session.
    pub session_ttl_seconds: i64,
    /// Whether `/auth/signup` may create accounts without an admin.
    pub allow_signup: bool,
    pub audit_retention: AuditRetention,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ServerConfig {
    /// Loads a config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_seconds <= 0 {
            return Err(Error::Config(
                "session_ttl_seconds must be positive".to_string(),
            ));
        }
        if self.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(Error::Config(format!(
                "session_ttl_seconds must be at most {MAX_SESSION_TTL_SECONDS}"
            )));
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(Error::Config(
                    "bootstrap_admin requires a username and password".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("bucketward.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            data_dir: PathBuf::from("./data"),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            allow_signup: false,
            audit_retention: AuditRetention::Preserve,
            bootstrap_admin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ServerConfig::from_toml("port = 9000\naudit_retention = \"purge\"\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.audit_retention, AuditRetention::Purge);
        assert_eq!(config.session_ttl_seconds, 3600);
        assert!(config.db_path().ends_with("bucketward.db"));
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let result = ServerConfig::from_toml("session_ttl_seconds = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_oversized_ttl() {
        let result = ServerConfig::from_toml("session_ttl_seconds = 9223372036854775807");
        assert!(matches!(result, Err(Error::Config(_))));

        let toml = format!("session_ttl_seconds = {MAX_SESSION_TTL_SECONDS}");
        let config = ServerConfig::from_toml(&toml).unwrap();
        assert_eq!(config.session_ttl_seconds, MAX_SESSION_TTL_SECONDS);
    }

    #[test]
    fn test_bootstrap_admin_section() {
        let config = ServerConfig::from_toml(
            "[bootstrap_admin]\nusername = \"root\"\npassword = \"hunter22\"\n",
        )
        .unwrap();
        assert_eq!(config.bootstrap_admin.unwrap().username, "root");
    }
}
