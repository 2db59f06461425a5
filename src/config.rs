//! Configuration loading and management for news-digest.
//!
//! Loads settings from `digest.toml` with environment variable overrides for sensitive data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "digest.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),
}

/// Feeds to poll for each digest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed URLs, processed in order
    pub urls: Vec<String>,
    /// Entries taken from the top of each feed
    pub per_feed_limit: usize,
    /// Timeout for a single feed request, in seconds
    pub timeout_secs: u64,
}

/// Chat-completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    /// Model identifier (e.g., "gpt-4o-mini")
    pub name: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Prompt sent to the model; `{text}` is replaced by the digest
    pub prompt: String,
}

/// Outbound mail relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub subject: String,
    pub timeout_secs: u64,
    /// Upgrade with STARTTLS before authenticating; only disable for a local relay
    pub starttls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

/// Secrets (loaded from environment only)
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_key: Option<String>,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: FeedConfig,
    pub model: ModelConfig,
    pub mail: MailConfig,
    pub server: ServerConfig,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Config {
    /// Load configuration from `path`, or from the default location when none is given.
    ///
    /// A missing default file is not an error: built-in defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // An explicit path must exist; otherwise fall back to defaults
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::find_config_file() {
                Some(found) => Self::from_file(&found)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a config file without applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Override secrets and the port from the environment.
    ///
    /// `lookup` returns the value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.credentials.openai_key = Some(key);
        }
        if let Some(user) = lookup("EMAIL_USER") {
            self.credentials.email_user = Some(user);
        }
        if let Some(password) = lookup("EMAIL_PW") {
            self.credentials.email_password = Some(password);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?;
        }
        Ok(())
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        // Then ~/.config/news-digest
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("news-digest")
            .join(CONFIG_FILE_NAME);
        home_config.exists().then_some(home_config)
    }

    /// Names of the credentials that are not set
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let creds = &self.credentials;
        [
            ("OPENAI_API_KEY", creds.openai_key.is_none()),
            ("EMAIL_USER", creds.email_user.is_none()),
            ("EMAIL_PW", creds.email_password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

impl Credentials {
    /// API key for the chat-completion endpoint
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.openai_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))
    }

    /// Mail account and its password
    pub fn mail_login(&self) -> Result<(&str, &str), ConfigError> {
        let user = self
            .email_user
            .as_deref()
            .ok_or(ConfigError::MissingCredential("EMAIL_USER"))?;
        let password = self
            .email_password
            .as_deref()
            .ok_or(ConfigError::MissingCredential("EMAIL_PW"))?;
        Ok((user, password))
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                "https://www.zdnet.co.kr/news/news_xml.asp?ct=0000".to_string(),
                "https://rss.etnews.com/Section902.xml".to_string(),
            ],
            per_feed_limit: 5,
            timeout_secs: 10,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            name: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_secs: 20,
            prompt: "\n다음 IT 뉴스들을 5줄로 요약하고 키워드 5개 뽑아줘:\n\n{text}\n".to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            subject: "Daily IT Trend".to_string(),
            timeout_secs: 10,
            starttls: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}
