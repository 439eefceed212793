// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infra::paths;
use crate::provider::retry::RetryConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mentor: MentorConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorConfig {
    pub model: String,
    /// Name of the environment variable holding the Gemini API key.
    pub api_key_env: String,
    /// Override for the Generative Language API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Replaces the built-in career mentor system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl Default for MentorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            api_key_env: "GEMINI_MENTOR_API_KEY".into(),
            base_url: None,
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    #[serde(default)]
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay_ms: 2_000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            jitter_fraction: 0.0,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        RetryConfig {
            max_retries: s.max_retries,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_factor: s.backoff_factor,
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_fraction: s.jitter_fraction,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; defaults to `<data dir>/pathmentor.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl StoreConfig {
    pub fn db_path(&self) -> PathBuf {
        match self.path {
            Some(ref p) => PathBuf::from(p),
            None => paths::db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub id: Option<String>,
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.mentor.model, "gemini-2.5-flash");
        assert_eq!(c.mentor.api_key_env, "GEMINI_MENTOR_API_KEY");
        assert!(c.mentor.base_url.is_none());
        assert_eq!(c.retry.max_retries, 1);
        assert_eq!(c.retry.initial_delay_ms, 2_000);
        assert!(c.store.path.is_none());
        assert!(c.user.id.is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mentor.model, "gemini-2.5-flash");
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[mentor]
model = "gemini-2.5-pro"
api_key_env = "MY_KEY"
base_url = "http://localhost:9999/v1beta"
system_prompt = "Be brief."
temperature = 0.4
max_output_tokens = 1024

[retry]
max_retries = 4
initial_delay_ms = 500
backoff_factor = 3.0
max_delay_ms = 10000
jitter_fraction = 0.1

[store]
path = "/tmp/mentor.db"

[user]
id = "alice"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.mentor.model, "gemini-2.5-pro");
        assert_eq!(config.mentor.api_key_env, "MY_KEY");
        assert_eq!(config.mentor.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.mentor.max_output_tokens, Some(1024));
        assert_eq!(config.retry.max_retries, 4);
        assert!((config.retry.backoff_factor - 3.0).abs() < 0.001);
        assert_eq!(config.store.db_path(), PathBuf::from("/tmp/mentor.db"));
        assert_eq!(config.user.id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_retry_settings_into_config() {
        let s = RetrySettings {
            max_retries: 3,
            initial_delay_ms: 250,
            backoff_factor: 2.0,
            max_delay_ms: 1_000,
            jitter_fraction: 0.0,
        };
        let cfg = RetryConfig::from(&s);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.initial_delay, Duration::from_millis(250));
        assert_eq!(cfg.max_delay, Duration::from_millis(1_000));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.mentor.model, config.mentor.model);
        assert_eq!(deserialized.retry.max_delay_ms, config.retry.max_delay_ms);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[user]\nid = \"bob\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.user.id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
