use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub db_path: PathBuf,
    pub fetch_max_results: u32,
}

#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_url: String,
    pub user_id: String,
    pub token_command: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    gmail: RawGmailConfig,
    #[serde(default)]
    store: RawStoreConfig,
    #[serde(default)]
    fetch: RawFetchConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGmailConfig {
    #[serde(default = "default_api_url")]
    api_url: String,
    #[serde(default = "default_user_id")]
    user_id: String,
    token_command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    #[serde(default)]
    db_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFetchConfig {
    #[serde(default = "default_max_results")]
    max_results: u32,
}

impl Default for RawFetchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_api_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_max_results() -> u32 {
    50
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("gmrules").join("config.toml")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("gmrules")
            .join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

fn default_db_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join("gmrules").join("mail.redb")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("gmrules")
            .join("mail.redb")
    } else {
        PathBuf::from("mail.redb")
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let token_command = raw.gmail.token_command.ok_or_else(|| {
            ConfigError::Parse("missing token_command in [gmail]".to_string())
        })?;
        if token_command.trim().is_empty() {
            return Err(ConfigError::Parse(
                "token_command in [gmail] must not be empty".to_string(),
            ));
        }
        if raw.fetch.max_results == 0 {
            return Err(ConfigError::Parse(
                "max_results in [fetch] must be greater than 0".to_string(),
            ));
        }

        Ok(Config {
            gmail: GmailConfig {
                api_url: raw.gmail.api_url.trim_end_matches('/').to_string(),
                user_id: raw.gmail.user_id,
                token_command,
            },
            db_path: raw.store.db_path.unwrap_or_else(default_db_path),
            fetch_max_results: raw.fetch.max_results,
        })
    }
}
