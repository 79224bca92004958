//! Application configuration for TaskFlow.
//!
//! User config lives at `~/.taskflow/taskflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskflowError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "taskflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".taskflow";

/// Default memory bank directory name inside the config directory.
const MEMORY_DIR_NAME: &str = "memory";

// ---------------------------------------------------------------------------
// Config structs (matching taskflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Study schedule shaping.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Memory bank location.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every generation request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Number of days the heuristic scheduler spreads tasks over.
    #[serde(default = "default_spread_days")]
    pub spread_days: u32,

    /// Minutes allotted to each scheduled task.
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u32,

    /// Review sessions emitted when there are no tasks at all.
    #[serde(default = "default_fallback_sessions")]
    pub fallback_sessions: u32,

    /// Minutes per fallback review session.
    #[serde(default = "default_fallback_minutes")]
    pub fallback_minutes: u32,

    /// Horizon (days) requested from the language model planner.
    #[serde(default = "default_plan_days")]
    pub plan_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            spread_days: default_spread_days(),
            session_minutes: default_session_minutes(),
            fallback_sessions: default_fallback_sessions(),
            fallback_minutes: default_fallback_minutes(),
            plan_days: default_plan_days(),
        }
    }
}

fn default_spread_days() -> u32 {
    5
}
fn default_session_minutes() -> u32 {
    60
}
fn default_fallback_sessions() -> u32 {
    3
}
fn default_fallback_minutes() -> u32 {
    45
}
fn default_plan_days() -> u32 {
    7
}

/// `[memory]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory for durable collections. Defaults to `~/.taskflow/memory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.taskflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TaskflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.taskflow/taskflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the memory bank directory: the configured one, or `~/.taskflow/memory`.
pub fn memory_dir(config: &AppConfig) -> Result<PathBuf> {
    match &config.memory.dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(config_dir()?.join(MEMORY_DIR_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TaskflowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TaskflowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TaskflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TaskflowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TaskflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the language model API key from the configured env var.
///
/// Returns [`TaskflowError::Unavailable`] when the variable is unset or empty;
/// callers treat that as "run without a model".
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(TaskflowError::unavailable(
            "language-model",
            format!("{var_name} is not set"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GOOGLE_API_KEY"));
        assert!(toml_str.contains("spread_days"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.llm.model, "gemini-2.5-pro");
        assert_eq!(parsed.schedule.fallback_sessions, 3);
        assert_eq!(parsed.schedule.fallback_minutes, 45);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[llm]
model = "gemini-2.5-flash"

[schedule]
spread_days = 3

[memory]
dir = "/tmp/taskflow-memory"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.schedule.spread_days, 3);
        assert_eq!(config.schedule.session_minutes, 60);
        assert_eq!(
            memory_dir(&config).expect("memory dir"),
            PathBuf::from("/tmp/taskflow-memory")
        );
    }

    #[test]
    fn load_config_from_reports_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[llm\nmodel = ").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn missing_api_key_is_unavailable() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "TASKFLOW_TEST_NONEXISTENT_KEY_12345".into();
        let err = resolve_api_key(&config).unwrap_err();
        assert!(matches!(err, TaskflowError::Unavailable { .. }));
        assert!(err.to_string().contains("TASKFLOW_TEST_NONEXISTENT_KEY_12345"));
    }
}
