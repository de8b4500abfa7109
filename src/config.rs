//! Application configuration: an optional TOML file, then environment overrides.

use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "platform-explorer";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Local,
    Memory,
}

impl Backend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    /// Identity reported after sign-in. Falls back to the OS user.
    pub username: Option<String>,
    /// Location of the key-value file used by the local backend.
    pub kv_path: Option<PathBuf>,
    pub window_width: f32,
    pub window_height: f32,
    pub ai: AiConfig,
    pub redaction: RedactionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub speech: bool,
    pub speech_model: String,
    pub voice: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Regular expressions matched against entry keys.
    pub patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            username: None,
            kv_path: None,
            window_width: 1100.0,
            window_height: 820.0,
            ai: AiConfig::default(),
            redaction: RedactionConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            speech: true,
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                r"(?i)^openai_api_key$".to_string(),
                r"(?i)api[_-]?key".to_string(),
                r"(?i)secret".to_string(),
                r"(?i)token".to_string(),
                r"(?i)password".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Reads `<config_dir>/platform-explorer/config.toml` when present, loads `.env`,
    /// then applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        config.apply_env(|name| std::env::var(name).ok())?;
        info!(backend = ?config.backend, "configuration loaded");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
            .map_err(|err| ExplorerError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("EXPLORER_BACKEND") {
            self.backend = Backend::parse(&raw).ok_or_else(|| {
                ExplorerError::Config(format!("EXPLORER_BACKEND must be local or memory, got {raw:?}"))
            })?;
        }
        if let Some(username) = lookup("EXPLORER_USERNAME").filter(|value| !value.trim().is_empty()) {
            self.username = Some(username);
        }
        if let Some(path) = lookup("EXPLORER_KV_PATH") {
            self.kv_path = Some(PathBuf::from(path));
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|value| !value.trim().is_empty()) {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.ai.model = model;
        }
        if let Some(raw) = lookup("EXPLORER_SPEECH") {
            self.ai.speech = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => {
                    return Err(ExplorerError::Config(format!(
                        "EXPLORER_SPEECH must be a boolean, got {raw:?}"
                    )))
                }
            };
        }
        Ok(())
    }

    pub fn kv_path(&self) -> PathBuf {
        self.kv_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("kv.json")
        })
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
