//! Device configuration for espbundle.
//!
//! Configuration is read once at startup from the first file found, in order:
//! 1. `--config <path>` (or `ESPBUNDLE_CONFIG`)
//! 2. `./device_config.toml`
//! 3. `./device_config.json`
//! 4. Global config file (`~/.config/espbundle/config.toml`)
//!
//! A missing or malformed file is fatal. Command-line and environment
//! overrides (`--baud`, `--tool`, `--echo-tool-output`) are applied on top.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use espbundle::{DEFAULT_CHUNK_SIZE, SessionConfig, ToolConfig};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local configuration file names, in lookup order.
const LOCAL_CONFIG_FILES: &[&str] = &["device_config.toml", "device_config.json"];

/// Default status poll interval in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (default for unknown extensions).
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Serial baud rate passed to the flashing tool.
    #[serde(deserialize_with = "deserialize_baud_rate")]
    pub baud_rate: u32,
    /// Operator instructions shown next to the device status.
    pub instructions: String,
    /// Flash alignment boundary between bundle entries.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Status poll interval for `watch`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Flashing tool executable.
    #[serde(default = "default_tool")]
    pub tool: String,
    /// Arguments placed before the esptool arguments.
    #[serde(default)]
    pub tool_args: Vec<String>,
    /// Echo tool output to the log.
    #[serde(default)]
    pub echo_tool_output: bool,
    /// Directory for transient files.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_tool() -> String {
    espbundle::tool::DEFAULT_TOOL.to_string()
}

/// Accept the baud rate as a number or as a numeric string.
fn deserialize_baud_rate<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BaudRate {
        Number(u32),
        Text(String),
    }

    match BaudRate::deserialize(deserializer)? {
        BaudRate::Number(value) => Ok(value),
        BaudRate::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid baud rate `{text}`"))),
    }
}

/// Overrides taken from the command line or the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replacement baud rate.
    pub baud_rate: Option<u32>,
    /// Replacement tool executable.
    pub tool: Option<String>,
    /// Force tool output echo on.
    pub echo_tool_output: bool,
}

impl Config {
    /// Load configuration from an explicit path, or from the first existing
    /// default location.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::find_config_file().with_context(|| {
                format!(
                    "No configuration file found (looked for {})",
                    Self::search_paths()
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?,
        };
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: Self = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            bail!("baud_rate must be greater than zero");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than zero");
        }
        if self.tool.trim().is_empty() {
            bail!("tool must not be empty");
        }
        Ok(())
    }

    /// Default config locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = LOCAL_CONFIG_FILES.iter().map(PathBuf::from).collect();
        if let Some(global) = Self::global_config_path() {
            paths.push(global);
        }
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.is_file())
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "espbundle").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Apply command-line and environment overrides.
    pub fn apply(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(baud_rate) = overrides.baud_rate {
            self.baud_rate = baud_rate;
        }
        if let Some(tool) = &overrides.tool {
            self.tool.clone_from(tool);
        }
        if overrides.echo_tool_output {
            self.echo_tool_output = true;
        }
        self.validate()
    }

    /// Flashing tool settings.
    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig::new(self.tool.clone(), self.baud_rate)
            .with_args(self.tool_args.iter().cloned())
            .with_echo(self.echo_tool_output)
    }

    /// Upload session settings.
    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::default().with_chunk_size(self.chunk_size);
        match &self.temp_dir {
            Some(dir) => config.with_temp_dir(dir),
            None => config,
        }
    }
}
