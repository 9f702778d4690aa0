//! Daemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level ralphd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Runner limits
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must load or the call fails. Without one, the first
    /// parseable discovery candidate wins; unreadable candidates are logged
    /// and skipped, and an empty search yields the defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            let config = Self::load_from_file(path)?;
            tracing::info!("Loaded config from: {}", path.display());
            return Ok(config);
        }

        let found = Self::discovery_candidates()
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load_from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from: {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!("Skipping config at {}: {}", path.display(), e);
                    None
                }
            });

        Ok(found.unwrap_or_else(|| {
            tracing::info!("No config file found, using defaults");
            Self::default()
        }))
    }

    /// Search order for implicit discovery: project-local file first, then
    /// the per-user config directory
    fn discovery_candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".ralphd.yml")];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("ralphd").join("ralphd.yml"));
        }
        candidates
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16000,
            timeout_ms: 300_000,
        }
    }
}

/// Runner limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum tasks in flight at once
    #[serde(rename = "max-concurrent-tasks")]
    pub max_concurrent_tasks: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: crate::runner::DEFAULT_MAX_CONCURRENT_TASKS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.runner.max_concurrent_tasks, 5);
    }

    #[test]
    fn test_parse_yaml_kebab_case() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-sonnet-4-20250514
  max-tokens: 8000
  timeout-ms: 60000
runner:
  max-concurrent-tasks: 12
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.max_tokens, 8000);
        assert_eq!(config.llm.timeout_ms, 60000);
        assert_eq!(config.runner.max_concurrent_tasks, 12);
        // Unset fields fall back to defaults
        assert_eq!(config.llm.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_discovery_candidates_project_local_first() {
        let candidates = Config::discovery_candidates();
        assert_eq!(candidates[0], PathBuf::from(".ralphd.yml"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("cfg.yml");
        fs::write(&path, "runner:\n  max-concurrent-tasks: 2\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.runner.max_concurrent_tasks, 2);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/definitely/not/here.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
