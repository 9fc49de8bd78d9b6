//! Application configuration
//!
//! Loaded from the embedded defaults, optional files under `config/`, and
//! `PARLEY_*` environment variables, in that order of priority.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use parley_core::{GroupChatConfig, HandoffConfig, RetrySettings, RuntimeConfig};
use parley_tools::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub group: GroupChatConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl AppConfig {
    /// Tool runner settings with the configured timeouts and retries
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            default_timeout: Duration::from_secs(self.tools.timeout_secs),
            max_timeout: Duration::from_secs(self.tools.max_timeout_secs),
            retry: self.retry.tools.clone(),
        }
    }
}

/// Tool execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_timeout_secs: default_max_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_timeout_secs() -> u64 {
    300
}

/// Memory store location and query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_k: default_k(),
        }
    }
}

impl MemoryConfig {
    /// Configured database path, or `parley/memory.db` in the data directory
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("parley")
                .join("memory.db")
        })
    }
}

fn default_k() -> usize {
    4
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("PARLEY_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. PARLEY_HANDOFF__MAX_HOPS
        .add_source(
            Environment::with_prefix("PARLEY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
