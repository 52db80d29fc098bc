use crate::error::{ImportError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_root")]
    pub upload_root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Minutes a staged import survives without being committed.
    #[serde(default = "default_staging_ttl")]
    pub ttl_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_upload_root() -> String {
    "uploads".to_string()
}

fn default_db_path() -> String {
    "menu_import.db".to_string()
}

fn default_staging_ttl() -> u64 {
    30
}

fn default_admin_email() -> String {
    "admin@site.com".to_string()
}

fn default_admin_password() -> String {
    "Admin123!".to_string()
}

fn default_session_ttl() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upload_root: default_upload_root(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_staging_ttl(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            session_ttl_minutes: default_session_ttl(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Loads the config file when it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config: Config = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.upload_root, "uploads");
        assert_eq!(config.database.path, "menu_import.db");
        assert_eq!(config.staging.ttl_minutes, 30);
        assert_eq!(config.auth.admin_email, "admin@site.com");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
