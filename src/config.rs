use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

pub const APP_DIR_NAME: &str = "php-assistant";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout for generation, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_app_name() -> String { "PHP Assistant".to_string() }
fn default_host() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5-coder:3b".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 3000 }

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout: default_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.timeout.max(1)) }

    pub fn base_url(&self) -> &str { self.host.trim_end_matches('/') }
}

/// Command-line overrides, applied after file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = config_dir().context("unable to resolve OS config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn embedded_default() -> Result<AppConfig> {
    toml::from_str(DEFAULT_CONFIG).context("parsing embedded default config")
}

pub fn load_config_if_exists(path: &Path) -> Result<Option<AppConfig>> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text)
            .with_context(|| format!("parsing config TOML: {}", path.display()))?;
        Ok(Some(cfg))
    } else {
        Ok(None)
    }
}

/// Resolve the effective configuration: file (or embedded default), then
/// `PHPA_HOST` / `PHPA_MODEL`, then command-line overrides.
pub fn resolve_config(explicit_path: Option<&Path>, overrides: &Overrides) -> Result<AppConfig> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    let mut cfg = match load_config_if_exists(&path)? {
        Some(cfg) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            cfg
        }
        None => {
            tracing::debug!(path = %path.display(), "no config file, using embedded default");
            embedded_default()?
        }
    };

    if let Ok(host) = env::var("PHPA_HOST") {
        if !host.trim().is_empty() { cfg.backend.host = host.trim().to_string(); }
    }
    if let Ok(model) = env::var("PHPA_MODEL") {
        if !model.trim().is_empty() { cfg.backend.model = model.trim().to_string(); }
    }

    if let Some(h) = &overrides.host { cfg.backend.host = h.clone(); }
    if let Some(m) = &overrides.model { cfg.backend.model = m.clone(); }
    if let Some(t) = overrides.timeout_secs { cfg.backend.timeout = t; }

    Ok(cfg)
}
