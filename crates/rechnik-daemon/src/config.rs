//! Configuration loading for rechnik-daemon.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rechnik_core::breaker::BreakerConfig;
use rechnik_core::ollama::{ModelOptions, DEFAULT_BASE_URL};
use rechnik_core::pipeline::PipelineConfig;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub daemon: Option<DaemonConfig>,
    pub ollama: Option<OllamaConfig>,
    pub cache: Option<CacheConfig>,
    pub breaker: Option<BreakerSection>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DaemonConfig {
    pub socket: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct OllamaConfig {
    pub url: Option<String>,
    pub word_model: Option<String>,
    pub sentence_model: Option<String>,
    pub word_timeout_secs: Option<u64>,
    pub sentence_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CacheConfig {
    pub ttl_hours: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BreakerSection {
    pub failure_rate_threshold: Option<f64>,
    pub min_calls: Option<usize>,
    pub window: Option<usize>,
    pub cooldown_secs: Option<u64>,
}

/// Default response cache TTL in hours
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 24;

impl Config {
    pub fn daemon_socket_path(&self) -> Option<PathBuf> {
        self.daemon.as_ref().and_then(|daemon| daemon.socket.clone())
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        self.daemon.as_ref().and_then(|daemon| daemon.database.clone())
    }

    pub fn ollama_url(&self) -> String {
        self.ollama
            .as_ref()
            .and_then(|o| o.url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn word_model_options(&self) -> ModelOptions {
        let mut options = ModelOptions::word_model();
        if let Some(ollama) = &self.ollama {
            if let Some(model) = &ollama.word_model {
                options.model = model.clone();
            }
            if let Some(secs) = ollama.word_timeout_secs {
                options.timeout = Duration::from_secs(secs);
            }
        }
        options
    }

    pub fn sentence_model_options(&self) -> ModelOptions {
        let mut options = ModelOptions::sentence_model();
        if let Some(ollama) = &self.ollama {
            if let Some(model) = &ollama.sentence_model {
                options.model = model.clone();
            }
            if let Some(secs) = ollama.sentence_timeout_secs {
                options.timeout = Duration::from_secs(secs);
            }
        }
        options
    }

    pub fn cache_ttl(&self) -> Duration {
        let hours = self
            .cache
            .as_ref()
            .and_then(|c| c.ttl_hours)
            .unwrap_or(DEFAULT_CACHE_TTL_HOURS);
        Duration::from_secs(hours * 60 * 60)
    }

    fn breaker_config(&self) -> BreakerConfig {
        let mut config = BreakerConfig::default();
        if let Some(b) = &self.breaker {
            if let Some(rate) = b.failure_rate_threshold {
                config.failure_rate_threshold = rate;
            }
            if let Some(min_calls) = b.min_calls {
                config.min_calls = min_calls;
            }
            if let Some(window) = b.window {
                config.window = window;
            }
            if let Some(secs) = b.cooldown_secs {
                config.cooldown = Duration::from_secs(secs);
            }
        }
        config
    }

    /// Pipeline wiring derived from this config. Both breakers share
    /// the same tuning; they differ only in the traffic they see.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cache_ttl: self.cache_ttl(),
            word_breaker: self.breaker_config(),
            sentence_breaker: self.breaker_config(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "rechnik").context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}
