use std::path::Path;

use genai::gemini::{MODEL_FLASH, MODEL_FLASH_LITE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct HistoryConfig {
    /// Records fetched per page.
    pub page_size: i64,
    /// Quiet window before a search keystroke becomes the effective query.
    pub search_debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: 15,
            search_debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct ModelConfig {
    /// Model identifier for long-form explanation text.
    pub text_model: String,
    /// Model identifier for structured outputs and chat follow-ups.
    pub structured_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text_model: MODEL_FLASH.to_string(),
            structured_model: MODEL_FLASH_LITE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct Config {
    pub history: HistoryConfig,
    pub models: ModelConfig,
}

/// Always returns a config, falling back to defaults when the file is
/// missing or unreadable.
pub async fn load_config_from_file(path: &Path) -> Config {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "config file unreadable, using defaults");
            Config::default()
        }),
        Err(_) => {
            tracing::info!("no config file found, using defaults");
            Config::default()
        }
    }
}

pub async fn save_config_to_file(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let raw = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, raw).await?;
    Ok(())
}
