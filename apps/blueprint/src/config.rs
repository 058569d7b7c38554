//! # Application Configuration
//!
//! Settings come from four layers, highest priority first:
//! 1. CLI flags
//! 2. Environment variables (`BLUEPRINT_HOST`, `BLUEPRINT_PORT`)
//! 3. Optional TOML file (`--config`)
//! 4. Built-in defaults
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! body_limit_bytes = 2097152
//!
//! [validation]
//! default_version = "cloudify_dsl_1_3"
//! ```
//!
//! `BLUEPRINT_CORS_ORIGINS` and `BLUEPRINT_LOG_FORMAT` are read where they
//! are used (router construction and tracing setup).

use blueprint_core::{BlueprintError, DslVersion};
use serde::Deserialize;
use std::path::Path;

pub const HOST_ENV: &str = "BLUEPRINT_HOST";
pub const PORT_ENV: &str = "BLUEPRINT_PORT";
pub const CORS_ORIGINS_ENV: &str = "BLUEPRINT_CORS_ORIGINS";
pub const LOG_FORMAT_ENV: &str = "BLUEPRINT_LOG_FORMAT";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Maximum request body (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Largest config file accepted.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// FILE LAYER
// =============================================================================

/// Contents of the TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub validation: ValidationSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub body_limit_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    pub default_version: Option<String>,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn parse(raw: &str) -> Result<Self, BlueprintError> {
        toml::from_str(raw)
            .map_err(|e| BlueprintError::SerializationError(format!("Invalid config file: {}", e)))
    }

    /// Read and parse a TOML file.
    pub fn read(path: &Path) -> Result<Self, BlueprintError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            BlueprintError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(BlueprintError::SerializationError(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BlueprintError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }
}

// =============================================================================
// ENVIRONMENT LAYER
// =============================================================================

/// Values taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl EnvOverrides {
    #[must_use]
    pub fn from_env() -> Self {
        let port = read_non_empty_env(PORT_ENV).and_then(|raw| match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(e) => {
                tracing::warn!("{}: ignoring invalid port '{}': {}", PORT_ENV, raw, e);
                None
            }
        });
        Self {
            host: read_non_empty_env(HOST_ENV),
            port,
        }
    }
}

#[must_use]
pub fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

// =============================================================================
// RESOLVED CONFIG
// =============================================================================

/// The effective configuration after all layers are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub body_limit: usize,
    /// Version assumed for templates that do not declare one.
    pub default_version: Option<DslVersion>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            body_limit: DEFAULT_BODY_LIMIT,
            default_version: None,
        }
    }
}

impl AppConfig {
    /// Load the file (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, BlueprintError> {
        let file = match path {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(file, EnvOverrides::from_env())
    }

    /// Combine a file layer and an environment layer over the defaults.
    pub fn from_layers(file: FileConfig, env: EnvOverrides) -> Result<Self, BlueprintError> {
        let defaults = Self::default();
        let default_version = file
            .validation
            .default_version
            .as_deref()
            .map(DslVersion::parse)
            .transpose()?;
        let body_limit = match file.server.body_limit_bytes {
            Some(0) => {
                return Err(BlueprintError::SerializationError(
                    "server.body_limit_bytes must be greater than zero".to_string(),
                ));
            }
            Some(limit) => limit,
            None => defaults.body_limit,
        };

        Ok(Self {
            host: env.host.or(file.server.host).unwrap_or(defaults.host),
            port: env.port.or(file.server.port).unwrap_or(defaults.port),
            body_limit,
            default_version,
        })
    }

    /// Apply CLI flags on top.
    #[must_use]
    pub fn with_cli(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_layers() {
        let config = AppConfig::from_layers(FileConfig::default(), EnvOverrides::default())
            .expect("config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn precedence_cli_env_file() {
        let file = FileConfig::parse(
            r#"
            [server]
            host = "file-host"
            port = 7000
            "#,
        )
        .expect("parse");
        let env = EnvOverrides {
            host: Some("env-host".into()),
            port: None,
        };

        let config = AppConfig::from_layers(file, env).expect("config");
        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, 7000);

        let config = config.with_cli(None, Some(9000));
        assert_eq!(config.host, "env-host");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn default_version_parsed() {
        let file = FileConfig::parse("[validation]\ndefault_version = \"cloudify_dsl_1_3\"\n")
            .expect("parse");
        let config = AppConfig::from_layers(file, EnvOverrides::default()).expect("config");
        assert_eq!(config.default_version, Some(DslVersion::V1_3));

        let file = FileConfig::parse("[validation]\ndefault_version = \"dsl_2\"\n").expect("parse");
        assert!(AppConfig::from_layers(file, EnvOverrides::default()).is_err());
    }

    #[test]
    fn unknown_keys_and_zero_limit_rejected() {
        assert!(FileConfig::parse("[server]\nhots = \"x\"\n").is_err());

        let file = FileConfig::parse("[server]\nbody_limit_bytes = 0\n").expect("parse");
        assert!(AppConfig::from_layers(file, EnvOverrides::default()).is_err());
    }

    #[test]
    fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[server]\nport = 9100\nbody_limit_bytes = 4096").expect("write");

        let parsed = FileConfig::read(file.path()).expect("read");
        assert_eq!(parsed.server.port, Some(9100));
        assert_eq!(parsed.server.body_limit_bytes, Some(4096));
    }
}
