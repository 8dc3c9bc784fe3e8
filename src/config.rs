//! Gateway configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid configuration.

use crate::abi::ABI_VERSION;
use crate::stream::DEFAULT_SYNTHETIC_BASE;
use crate::sysfs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable naming a JSON configuration file
pub const CONFIG_ENV: &str = "SYSGATE_CONFIG";

/// Default trace ring buffer size
pub const DEFAULT_TRACE_BUFFER: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Platform identifier reported by `/sys/uname`
    pub platform: String,
    /// ABI version reported by `/sys/uname`
    pub abi_version: u32,
    /// First descriptor number used for synthetic streams
    pub synthetic_fd_base: i32,
    /// Record calls in the tracer
    pub trace: bool,
    /// Number of trace events kept
    pub trace_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            platform: sysfs::platform_id(),
            abi_version: ABI_VERSION,
            synthetic_fd_base: DEFAULT_SYNTHETIC_BASE,
            trace: false,
            trace_buffer: DEFAULT_TRACE_BUFFER,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io(std::io::Error),
    /// The file is not valid configuration JSON
    Parse(serde_json::Error),
    /// A field has an unusable value
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl GatewayConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load from the file named by `SYSGATE_CONFIG`, or use the defaults
    ///
    /// A broken file is logged and ignored; the gateway must come up.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}: {}; using defaults", Path::new(&path).display(), e);
                Self::default()
            }
        }
    }

    /// Check the fields that cannot be expressed in the types
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 0, 1 and 2 are always host streams
        if self.synthetic_fd_base < 3 {
            return Err(ConfigError::Invalid(format!(
                "synthetic_fd_base {} overlaps the standard descriptors",
                self.synthetic_fd_base
            )));
        }
        if self.platform.is_empty() || self.platform.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "platform {:?} must be a single non-empty word",
                self.platform
            )));
        }
        Ok(())
    }
}
