//! `termpilot.toml` loading.
//!
//! Every field has a default, so an absent file or an empty one is a valid
//! configuration. Environment variables are applied on top.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use termpilot_agent::{LlmProvider, ModelConfig};
use termpilot_security::{PersistPolicy, DEFAULT_LOCK_EXPIRY};
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct TermpilotConfig {
    /// Shared state directory: sessions, lock table, process bindings.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_expiry_secs")]
    pub expiry_secs: u64,
    #[serde(default)]
    pub persist_policy: PersistPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    #[serde(default)]
    pub cleanup_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_lock_expiry_secs() -> u64 {
    DEFAULT_LOCK_EXPIRY.as_secs()
}
fn default_max_age_days() -> u32 {
    30
}
fn default_shell_timeout_secs() -> u64 {
    termpilot_builtins::DEFAULT_SHELL_TIMEOUT.as_secs()
}
fn default_max_length() -> usize {
    4_096
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_lock_expiry_secs(),
            persist_policy: PersistPolicy::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            cleanup_on_start: false,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout_secs(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
        }
    }
}

impl Default for TermpilotConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            model: ModelConfig::default(),
            locks: LockConfig::default(),
            sessions: SessionConfig::default(),
            shell: ShellConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl TermpilotConfig {
    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply environment overrides and make `data_dir` absolute.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw)
                .with_context(|| format!("Invalid config file '{}'", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file '{}'", path.display()))
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        if config.data_dir.is_relative() {
            config.data_dir = std::env::current_dir()?.join(&config.data_dir);
        }
        Ok(config)
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `OPENAI_API_KEY`, `USE_OPENAI` and `OLLAMA_HOST` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("USE_OPENAI").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
            info!("USE_OPENAI set, selecting the OpenAI provider");
            self.model.provider = LlmProvider::OpenAi;
            if self.model.model_id == ModelConfig::default().model_id {
                self.model.model_id = "gpt-3.5-turbo".to_string();
            }
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            if self.model.api_key.is_empty() {
                self.model.api_key = key;
            }
        }
        if let Some(host) = lookup("OLLAMA_HOST").filter(|h| !h.is_empty()) {
            if self.model.provider == LlmProvider::Ollama {
                self.model.api_base_url = Some(normalize_host(&host));
            }
        }
    }

    pub fn lock_expiry(&self) -> Duration {
        Duration::from_secs(self.locks.expiry_secs)
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell.timeout_secs)
    }
}

/// `OLLAMA_HOST` may omit the scheme (`127.0.0.1:11434`).
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = TermpilotConfig::parse("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.model.provider, LlmProvider::Ollama);
        assert_eq!(config.locks.expiry_secs, 300);
        assert_eq!(config.locks.persist_policy, PersistPolicy::Optimistic);
        assert_eq!(config.sessions.max_age_days, 30);
        assert!(!config.sessions.cleanup_on_start);
        assert_eq!(config.shell.timeout_secs, 10);
        assert_eq!(config.input.max_length, 4_096);
    }

    #[test]
    fn test_sections_parse() {
        let config = TermpilotConfig::parse(
            r#"
data_dir = "/var/lib/termpilot"

[model]
provider = "groq"
model_id = "llama3-8b-8192"
api_key = "gsk-test"
timeout_secs = 12

[locks]
expiry_secs = 60
persist_policy = "strict"

[sessions]
max_age_days = 7
cleanup_on_start = true

[shell]
timeout_secs = 3

[input]
max_length = 512
"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/termpilot"));
        assert_eq!(config.model.provider, LlmProvider::Groq);
        assert_eq!(config.model.timeout(), Duration::from_secs(12));
        assert_eq!(config.model.max_tokens, 150);
        assert_eq!(config.lock_expiry(), Duration::from_secs(60));
        assert_eq!(config.locks.persist_policy, PersistPolicy::Strict);
        assert_eq!(config.sessions.max_age_days, 7);
        assert!(config.sessions.cleanup_on_start);
        assert_eq!(config.shell_timeout(), Duration::from_secs(3));
        assert_eq!(config.input.max_length, 512);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(TermpilotConfig::parse("[model]\nprovider = \"skynet\"").is_err());
    }

    #[test]
    fn test_use_openai_env() {
        let mut config = TermpilotConfig::default();
        config.apply_env(env(&[("USE_OPENAI", "True"), ("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(config.model.provider, LlmProvider::OpenAi);
        assert_eq!(config.model.api_key, "sk-env");
        assert_eq!(config.model.model_id, "gpt-3.5-turbo");
    }

    #[test]
    fn test_config_key_wins_over_env() {
        let mut config = TermpilotConfig::parse("[model]\napi_key = \"from-file\"").unwrap();
        config.apply_env(env(&[("OPENAI_API_KEY", "from-env")]));
        assert_eq!(config.model.api_key, "from-file");
        assert_eq!(config.model.provider, LlmProvider::Ollama);
    }

    #[test]
    fn test_ollama_host_env() {
        let mut config = TermpilotConfig::default();
        config.apply_env(env(&[("OLLAMA_HOST", "10.0.0.5:11434")]));
        assert_eq!(config.model.base_url(), "http://10.0.0.5:11434");

        let mut openai = TermpilotConfig::parse("[model]\nprovider = \"openai\"").unwrap();
        openai.apply_env(env(&[("OLLAMA_HOST", "10.0.0.5:11434")]));
        assert_eq!(openai.model.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = TermpilotConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.data_dir.is_absolute());
        assert!(config.data_dir.ends_with("data"));
    }

    #[test]
    fn test_load_invalid_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("termpilot.toml");
        std::fs::write(&path, "[locks]\nexpiry_secs = \"soon\"").unwrap();
        let err = TermpilotConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("termpilot.toml"));
    }
}
