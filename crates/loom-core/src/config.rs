//! Configuration types for loom.
//!
//! [`Config::load`] layers, lowest precedence first:
//!
//! 1. the built-in defaults below,
//! 2. a TOML file (`--config`, else `$XDG_CONFIG_HOME/loom/config.toml`),
//! 3. `LOOM_*` environment variables (`LOOM_OUTPUT__FORMAT=json`).
//!
//! [`Config::defaults`] returns layer 1 alone without touching the filesystem
//! or the environment (useful in tests). Command-line flags are applied on top
//! by the binary.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::parser::ParserFormat;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[watch]
patterns   = []
checkpoint = ".loom-state.json"

[parser]
format  = "auto"
pattern = ""

[output]
format = "text"
levels = []

[dashboard]
enabled = false
addr    = "127.0.0.1:8080"
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Glob patterns; `**` crosses directory boundaries.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,
}

fn default_checkpoint() -> PathBuf { PathBuf::from(".loom-state.json") }

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            checkpoint: default_checkpoint(),
        }
    }
}

/// `[parser]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub format: ParserFormat,
    /// Named-capture regex; required when `format = "regex"`.
    #[serde(default)]
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::UnknownOutput(other.to_string())),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Levels to show; empty shows everything.
    #[serde(default)]
    pub levels: Vec<String>,
}

/// `[dashboard]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String { "127.0.0.1:8080".to_string() }

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_addr(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        let cfg = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("LOOM")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("watch.patterns")
                    .with_list_parse_key("output.levels")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("loom")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
