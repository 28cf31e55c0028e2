use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use engine_logging::{engine_debug, engine_info};
use serde::{Deserialize, Serialize};
use wallbatch_engine::EngineSettings;

pub const CONFIG_FILENAME: &str = "wallbatch.ron";
pub const API_URL_ENV: &str = "WALLBATCH_API_URL";

/// Optional settings read from `wallbatch.ron`. Every field may be omitted.
///
/// ```ron
/// (
///     api_url: Some("http://localhost:3001/api/"),
///     token_count: Some(20),
///     poll_interval_secs: Some(5),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api_url: Option<String>,
    /// Accounts per post for `like`, used when `--count` is not given.
    pub token_count: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub poll_initial_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub poll_max_attempts: Option<u32>,
}

impl AppConfig {
    /// Loads `explicit`, which must exist, or else `wallbatch.ron` in `dir`
    /// when present. No file at all yields the defaults.
    pub fn locate(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = dir.join(CONFIG_FILENAME);
        if implicit.is_file() {
            return Self::load(&implicit);
        }
        engine_debug!("no {} in {:?}, using defaults", CONFIG_FILENAME, dir);
        Ok(Self::default())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: AppConfig = ron::from_str(&text)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        engine_info!("loaded config from {:?}", path);
        Ok(config)
    }

    /// Base URL precedence: command line, then environment, then file, then
    /// the built-in default.
    pub fn engine_settings(
        &self,
        env_url: Option<String>,
        cli_url: Option<&str>,
    ) -> EngineSettings {
        let mut settings = EngineSettings::default();

        let base_url = cli_url
            .map(str::to_string)
            .or(env_url.filter(|url| !url.trim().is_empty()))
            .or_else(|| self.api_url.clone());
        if let Some(url) = base_url {
            settings.base_url = url;
        }

        if let Some(secs) = self.connect_timeout_secs {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.poll_initial_delay_secs {
            settings.poll.initial_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = self.poll_interval_secs {
            settings.poll.interval = Duration::from_secs(secs);
        }
        if let Some(max) = self.poll_max_attempts {
            settings.poll.max_attempts = max.max(1);
        }
        settings
    }
}

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
