use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::UserId as TelegramUserId;

use crate::chatbot::UserId;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Telegram user ID -> patient ID. Only these users may talk to the bot.
    #[serde(default)]
    patients: HashMap<u64, i64>,
    /// Directory for state files (database, logs). Defaults to current directory.
    data_dir: Option<String>,
    /// Memoize health-record lookups within a request.
    #[serde(default = "default_cache_enabled")]
    cache_enabled: bool,
}

fn default_cache_enabled() -> bool {
    true
}

pub struct Config {
    pub telegram_bot_token: String,
    /// Telegram user -> patient.
    pub patients: HashMap<TelegramUserId, UserId>,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
    pub cache_enabled: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.patients.is_empty() {
            return Err(ConfigError::Validation("patients must map at least one Telegram user".into()));
        }

        let patients = file.patients
            .into_iter()
            .map(|(telegram_id, patient_id)| (TelegramUserId(telegram_id), UserId(patient_id)))
            .collect();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            patients,
            data_dir,
            cache_enabled: file.cache_enabled,
        })
    }

    /// Resolve a Telegram user to the patient they are allowed to act as.
    pub fn patient_for(&self, telegram_user: TelegramUserId) -> Option<UserId> {
        self.patients.get(&telegram_user).copied()
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("carebot.db")
    }
}
