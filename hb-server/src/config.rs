//! Persistent bridge configuration
//!
//! Stored as pretty-printed JSON with the same camelCase keys the dashboard
//! form uses. Loaded once at startup (file first, then environment fallbacks
//! for the account credentials) and rewritten on every update.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_PORT: u16 = 8444;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid config update: {0}")]
    InvalidUpdate(String),
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub bluelink_user: String,
    pub bluelink_pass: String,
    pub bluelink_pin: String,
    pub bluelink_vin: String,
    pub region: String,
    pub brand: String,

    pub udp_host: String,
    #[serde(deserialize_with = "lenient_port")]
    pub udp_port: u16,
    pub enable_udp: bool,

    pub mqtt_host: String,
    #[serde(deserialize_with = "lenient_port")]
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_topic: String,
    pub enable_mqtt: bool,

    /// Background status poll interval; 0 disables polling
    pub poll_interval_secs: u64,
    /// Attach the simulated vehicle instead of a real account
    pub demo_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bluelink_user: String::new(),
            bluelink_pass: String::new(),
            bluelink_pin: String::new(),
            bluelink_vin: String::new(),
            region: "EU".to_string(),
            brand: "hyundai".to_string(),
            udp_host: String::new(),
            udp_port: 0,
            enable_udp: false,
            mqtt_host: String::new(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_topic: "hyundai".to_string(),
            enable_mqtt: false,
            poll_interval_secs: 0,
            demo_mode: false,
        }
    }
}

impl AppConfig {
    pub fn has_credentials(&self) -> bool {
        !self.bluelink_user.is_empty()
            && !self.bluelink_pass.is_empty()
            && !self.bluelink_pin.is_empty()
    }

    /// Fill empty credentials from the environment
    ///
    /// Only the account credentials are taken from the environment, and only
    /// when the file leaves them empty.
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            (&mut self.bluelink_user, "BLUELINK_USERNAME"),
            (&mut self.bluelink_pass, "BLUELINK_PASSWORD"),
            (&mut self.bluelink_pin, "BLUELINK_PIN"),
            (&mut self.bluelink_vin, "BLUELINK_VIN"),
        ];
        for (field, var) in fields {
            if !field.is_empty() {
                continue;
            }
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
        if lookup("BRIDGE_DEMO").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            self.demo_mode = true;
        }
    }

    /// Shallow-merge a partial update over this config
    ///
    /// Top-level keys present in `patch` replace the current values; keys not
    /// present are kept.
    pub fn merged(&self, patch: &Value) -> Result<AppConfig, ConfigError> {
        let patch = patch
            .as_object()
            .ok_or_else(|| ConfigError::InvalidUpdate("expected a JSON object".to_string()))?;

        let mut current = serde_json::to_value(self).map_err(ConfigError::Serialize)?;
        if let Some(fields) = current.as_object_mut() {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(current).map_err(|e| ConfigError::InvalidUpdate(e.to_string()))
    }
}

/// Location of the persisted config
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `BRIDGE_CONFIG` if set, otherwise `config.json` in the working directory
    pub fn from_env() -> Self {
        let path =
            std::env::var("BRIDGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config file; a missing file yields the defaults
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(AppConfig::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Startup load: file, then environment fallbacks
    ///
    /// A broken file is logged and replaced by the defaults.
    pub fn load_with_env(&self) -> AppConfig {
        let mut config = match self.load() {
            Ok(config) => {
                info!("Configuration loaded from {}", self.path.display());
                config
            }
            Err(e) => {
                error!("Error loading config: {}", e);
                AppConfig::default()
            }
        };
        config.apply_env_fallbacks(|var| std::env::var(var).ok());
        config
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
        std::fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Listen port from `PORT`, default 8444
pub fn listen_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Ports arrive as numbers or as strings from the dashboard form
fn lenient_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid port: {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid port: {:?}", s))),
        other => Err(D::Error::custom(format!("invalid port: {}", other))),
    }
}
