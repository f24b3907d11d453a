use anyhow::{anyhow, Result};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const API_URL_ENV: &str = "CHATSYNC_API_URL";
pub const TOKEN_ENV: &str = "CHATSYNC_TOKEN";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    pub notice_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            api_url: "http://localhost:5001/api".to_string(),
            auth_token: None,
            request_timeout_secs: 10,
            notice_capacity: 100,
        }
    }
}

impl ChatConfig {
    /// Environment variables win over whatever was read from disk.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(API_URL_ENV) {
            self.api_url = url;
        }
        if let Ok(token) = env::var(TOKEN_ENV) {
            self.auth_token = Some(token);
        }
        self
    }
}

static CONFIG_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Use `path` instead of the default config location. Only the first call has effect.
pub fn set_config_path_override(path: PathBuf) {
    let _ = CONFIG_PATH_OVERRIDE.set(path);
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("chatsync");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("config.json"))
}

/// Load the config file (defaults if absent), then apply environment overrides.
pub fn load_config() -> Result<ChatConfig> {
    let path = get_config_path()?;
    Ok(load_config_from(&path)?.apply_env_overrides())
}

pub fn load_config_from(path: &Path) -> Result<ChatConfig> {
    if !path.exists() {
        return Ok(ChatConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: ChatConfig = serde_json::from_str(&contents)
        .map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &ChatConfig) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    info!("Config saved to {}", path.display());
    Ok(())
}

pub fn save_config(config: &ChatConfig) -> Result<()> {
    save_config_to(&get_config_path()?, config)
}
