//! Settings resolution: CLI/env flags, then the TOML file, then defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use dockscope_stream::{DEFAULT_API_URL, ReconnectPolicy, StreamConfig};
use dockscope_logs::DEFAULT_CAPACITY;

/// Contents of `config.toml`
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub stream_url: Option<String>,
    pub session_cookie: Option<String>,
    pub token: Option<String>,
    pub buffer_size: Option<usize>,
    pub reconnect: ReconnectSection,
}

/// `[reconnect]` table
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectSection {
    pub base_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub max_attempts: Option<u32>,
}

impl FileConfig {
    /// Default location: `$XDG_CONFIG_HOME/dockscope/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dockscope").join("config.toml"))
    }

    /// Load the file at `path`, or the default location when `None`
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                bail!("config file {} does not exist", path.display());
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub stream_url: Option<String>,
    pub session_cookie: Option<String>,
    pub token: Option<String>,
    pub buffer_size: Option<usize>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub stream: StreamConfig,
    pub session_cookie: Option<String>,
    pub token: Option<String>,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            base_delay: file
                .reconnect
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            multiplier: file.reconnect.multiplier.unwrap_or(defaults.multiplier),
            max_attempts: file.reconnect.max_attempts.unwrap_or(defaults.max_attempts),
        };
        if !(reconnect.multiplier.is_finite() && reconnect.multiplier >= 1.0) {
            bail!("reconnect.multiplier must be at least 1.0, got {}", reconnect.multiplier);
        }

        let buffer_size = overrides
            .buffer_size
            .or(file.buffer_size)
            .unwrap_or(DEFAULT_CAPACITY);
        if buffer_size == 0 {
            bail!("buffer_size must be at least 1");
        }

        Ok(Self {
            stream: StreamConfig {
                api_url: overrides
                    .api_url
                    .or(file.api_url)
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                stream_url: overrides.stream_url.or(file.stream_url),
                buffer_size,
                reconnect,
            },
            session_cookie: non_empty(overrides.session_cookie.or(file.session_cookie)),
            token: non_empty(overrides.token.or(file.token)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
