use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::ConfigError;
use crate::logging::{LogConfig, LogFormat, LogOutput};

pub const CONFIG_FILE_NAME: &str = ".unwindprotect.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Nested host function applications allowed before evaluation fails.
    #[serde(default = "default_max_eval_depth")]
    pub max_eval_depth: usize,

    /// Mirror console output to stdout.
    #[serde(default = "default_false")]
    pub echo_console: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Print a line before and after each guarded call.
    #[serde(default = "default_true")]
    pub announce_calls: bool,

    /// Prefix of the host error raised for a native fault.
    #[serde(default = "default_fault_prefix")]
    pub fault_prefix: String,

    /// Protected native calls allowed on the stack at once. Each level costs
    /// several native frames, so this stays well below `max_eval_depth`.
    #[serde(default = "default_max_nesting")]
    pub max_nesting: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Write to daily-rotated files in this directory instead of stderr.
    #[serde(default)]
    pub directory: Option<String>,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_false")]
    pub span_events: bool,

    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_eval_depth: default_max_eval_depth(),
            echo_console: false,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            announce_calls: true,
            fault_prefix: default_fault_prefix(),
            max_nesting: default_max_nesting(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
            prefix: default_prefix(),
            span_events: false,
            filter: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_max_eval_depth() -> usize { 500 }
fn default_max_nesting() -> usize { 100 }
fn default_level() -> String { "info".to_string() }
fn default_prefix() -> String { "unwindprotect".to_string() }
fn default_fault_prefix() -> String { "A native exception occurred".to_string() }

impl LogSection {
    pub fn to_log_config(&self) -> LogConfig {
        let output = match &self.directory {
            Some(directory) => LogOutput::File {
                directory: directory.clone(),
                prefix: self.prefix.clone(),
            },
            None => LogOutput::Stderr,
        };

        let mut config = LogConfig::new()
            .with_level(crate::logging::parse_level(&self.level))
            .with_format(self.format)
            .with_output(output)
            .with_span_events(self.span_events);

        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }
        config
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Find `.unwindprotect.toml` in the current directory or its parents.
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(err) => tracing::warn!(path = %config_path.display(), error = %err, "ignoring config"),
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }
}
