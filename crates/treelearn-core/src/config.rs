//! Configuration for a learning session.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use treelearn_tree::{LayoutConfig, TreeLimits};

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Layout constants for the tree view
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Title/summary truncation for the root node
    #[serde(default)]
    pub limits: TreeLimits,

    /// Maximum topics suggested when expanding without titles
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    /// Seconds before a generation call is abandoned (None = wait forever)
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: Option<u64>,

    /// Byte budget for ancestry context (None = unlimited)
    #[serde(default)]
    pub context_max_chars: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_suggestions() -> usize {
    5
}

fn default_generation_timeout_secs() -> Option<u64> {
    Some(60)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            limits: TreeLimits::default(),
            max_suggestions: default_max_suggestions(),
            generation_timeout_secs: default_generation_timeout_secs(),
            context_max_chars: None,
            log_level: default_log_level(),
        }
    }
}

impl SessionConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("treelearn")
            .join("config.yaml")
    }

    /// Load configuration from the default file, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_path();

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), "Failed to load config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Generation timeout as a duration
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }
}
