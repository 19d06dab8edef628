//! Configuration management infrastructure.
//!
//! This module provides configuration file support, allowing users to save
//! and load signing preferences and relay settings.

use crate::infra::error::{SigningError, SigningResult};
use crate::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Raw signature bytes reserved in `/Contents` unless configured otherwise.
pub const DEFAULT_SIGNATURE_CAPACITY: usize = 4096;

/// Application configuration with all signing preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfiguration {
    /// Digest algorithm for the content and attribute hashes
    pub hash_algorithm: String,

    /// Raw DER bytes reserved for the PKCS#7 blob (hex width is twice this)
    pub signature_capacity: usize,

    /// `/Reason` written into the signature dictionary
    pub reason: String,

    /// Label drawn as "Signed by ..." when the request carries no signer name
    pub default_signer_label: String,

    /// Partial name of the signature form field
    pub field_name: String,

    /// How long the coordinator waits for the remote signer
    pub signer_timeout_seconds: u64,

    /// Concurrent requests the remote signer may have outstanding
    pub max_in_flight: usize,

    /// Relay settings
    pub relay: RelayConfig,
}

/// WebSocket relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay listens on
    pub bind_address: String,

    /// Optional bearer token the remote signer must present
    pub signer_token: Option<String>,
}

impl Default for SigningConfiguration {
    fn default() -> Self {
        Self {
            hash_algorithm: "sha256".to_string(),
            signature_capacity: DEFAULT_SIGNATURE_CAPACITY,
            reason: "Document digitally signed".to_string(),
            default_signer_label: "Remote Signer".to_string(),
            field_name: "Signature1".to_string(),
            signer_timeout_seconds: 60,
            max_in_flight: 1,
            relay: RelayConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            signer_token: None,
        }
    }
}

impl SigningConfiguration {
    /// Parsed hash algorithm.
    pub fn hash_algorithm(&self) -> SigningResult<HashAlgorithm> {
        self.hash_algorithm.parse::<HashAlgorithm>().map_err(|_| {
            SigningError::ConfigurationError(format!(
                "Invalid hash algorithm: {}",
                self.hash_algorithm
            ))
        })
    }

    #[must_use]
    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer_timeout_seconds)
    }

    /// Validate configuration values
    pub fn validate(&self) -> SigningResult<()> {
        self.hash_algorithm()?;

        if self.signature_capacity == 0 {
            return Err(SigningError::ConfigurationError(
                "Signature capacity must be greater than 0".to_string(),
            ));
        }

        if self.signer_timeout_seconds == 0 {
            return Err(SigningError::ConfigurationError(
                "Signer timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_in_flight == 0 {
            return Err(SigningError::ConfigurationError(
                "max_in_flight must be at least 1".to_string(),
            ));
        }

        if self.field_name.is_empty() {
            return Err(SigningError::ConfigurationError(
                "Signature field name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("pdf-remote-signer").join("config.toml"))
        } else {
            // Fallback to current directory
            Ok(PathBuf::from("pdf-remote-signer-config.toml"))
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SigningConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SigningConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file, falling back to defaults when absent.
    pub fn load_or_default(&self) -> SigningResult<SigningConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(SigningConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SigningConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SigningConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SigningConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SigningError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved successfully");
        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;

        match key {
            "hash_algorithm" => {
                value.parse::<HashAlgorithm>().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid hash algorithm: {value}"))
                })?;
                config.hash_algorithm = value.to_string();
            }
            "signature_capacity" => {
                config.signature_capacity = parse_number(key, value)?;
            }
            "reason" => config.reason = value.to_string(),
            "default_signer_label" => config.default_signer_label = value.to_string(),
            "field_name" => config.field_name = value.to_string(),
            "signer_timeout_seconds" => {
                config.signer_timeout_seconds = parse_number(key, value)?;
            }
            "max_in_flight" => {
                config.max_in_flight = parse_number(key, value)?;
            }
            "relay.bind_address" => {
                value.parse::<std::net::SocketAddr>().map_err(|e| {
                    SigningError::ConfigurationError(format!("Invalid bind address {value}: {e}"))
                })?;
                config.relay.bind_address = value.to_string();
            }
            "relay.signer_token" => {
                config.relay.signer_token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }
}

/// Configuration export formats
#[derive(Debug, Clone, Copy)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SigningResult<T> {
    value
        .parse::<T>()
        .map_err(|_| SigningError::ConfigurationError(format!("Invalid number for {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = SigningConfiguration::default();
        assert_eq!(config.hash_algorithm, "sha256");
        assert_eq!(config.signature_capacity, 4096);
        assert_eq!(config.max_in_flight, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SigningConfiguration::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SigningConfiguration = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.signature_capacity, deserialized.signature_capacity);
        assert_eq!(config.relay.bind_address, deserialized.relay.bind_address);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SigningConfiguration = toml::from_str("max_in_flight = 4\n").unwrap();
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.signature_capacity, DEFAULT_SIGNATURE_CAPACITY);
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());

        let loaded_config = manager.load().unwrap();
        assert_eq!(config.signature_capacity, loaded_config.signature_capacity);
    }

    #[test]
    fn test_update_value_validates() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.update_value("signature_capacity", "8192").unwrap();
        assert_eq!(manager.load().unwrap().signature_capacity, 8192);

        assert!(manager.update_value("max_in_flight", "0").is_err());
        assert!(manager.update_value("hash_algorithm", "md5").is_err());
        assert!(manager.update_value("no_such_key", "1").is_err());
    }
}
