//! Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::compression::Encoding;

/// Settings threaded through every cache call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBankConfig {
    /// Encoding to cache in when the client asks for none we support
    #[serde(default = "default_encoding")]
    pub default_encoding: Encoding,

    /// TTL handed to the backing store; absent means the store's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,

    /// Upper bound when decompressing payloads read back from the store
    #[serde(default = "default_max_decompressed_size_bytes")]
    pub max_decompressed_size_bytes: usize,

    #[serde(default)]
    pub memory_store: MemoryStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    #[serde(default = "default_max_capacity_bytes")]
    pub max_capacity_bytes: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity_bytes: default_max_capacity_bytes(),
        }
    }
}

fn default_encoding() -> Encoding {
    Encoding::Brotli
}

fn default_max_decompressed_size_bytes() -> usize {
    104857600 // 100MB
}

fn default_max_capacity_bytes() -> u64 {
    268435456 // 256MB
}

impl Default for ResponseBankConfig {
    fn default() -> Self {
        Self {
            default_encoding: default_encoding(),
            expires_in_seconds: None,
            max_decompressed_size_bytes: default_max_decompressed_size_bytes(),
            memory_store: MemoryStoreConfig::default(),
        }
    }
}

impl ResponseBankConfig {
    /// Parse YAML, replacing `${VAR_NAME}` with environment variable values
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // Every referenced variable must exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.default_encoding.is_supported() {
            return Err(format!(
                "default_encoding must be gzip or br, got '{}'",
                self.default_encoding
            ));
        }

        if self.expires_in_seconds == Some(0) {
            return Err("expires_in_seconds must be greater than 0 when set".to_string());
        }

        if self.max_decompressed_size_bytes == 0 {
            return Err("max_decompressed_size_bytes must be greater than 0".to_string());
        }

        if self.memory_store.max_capacity_bytes == 0 {
            return Err("memory_store.max_capacity_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// TTL as a Duration for the backing store
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in_seconds.map(Duration::from_secs)
    }
}
