use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ZseekError, ZseekResult};
use crate::types::IndexMode;

/// Default cap on the decoded size of a single frame (1 GiB)
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 1024 * 1024 * 1024;

/// Top-level configuration (loaded from zseek.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZseekConfig {
    pub index: IndexConfig,
    pub decoder: DecoderConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Jump table strategy: "eager" (scan at open) or "lazy" (grow on demand)
    pub mode: IndexMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Bytes read from the source per refill (0 = zstd's recommended input size)
    pub input_buffer_size: usize,
    /// Largest decoded frame accepted, in bytes
    pub max_frame_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            input_buffer_size: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ZseekConfig {
    /// Load the config at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> ZseekResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| ZseekError::Config(format!("parsing config {}: {e}", path.display())))
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> ZseekResult<Self> {
        let config: ZseekConfig =
            toml::from_str(content).map_err(|e| ZseekError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ZseekResult<()> {
        if self.decoder.max_frame_size == 0 {
            return Err(ZseekError::Config(
                "decoder.max_frame_size must be greater than zero".into(),
            ));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(ZseekError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}
