use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WeftError};

/// Top-level configuration for Weft.
///
/// Loaded from `~/.weft/config.toml` by default (override with `WEFT_CONFIG`).
/// Every section falls back to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeftConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub menu: MenuConfig,
}

impl WeftConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WeftConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WeftError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve the config file path (`WEFT_CONFIG` env, or `~/.weft/config.toml`).
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var("WEFT_CONFIG") {
            return PathBuf::from(p);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".weft").join("config.toml");
        }
        PathBuf::from("config.toml")
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory of pattern templates. Empty means the built-in set.
    pub patterns_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            patterns_dir: String::new(),
        }
    }
}

/// Generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Model tiers, tried in order within one attempt.
    pub models: Vec<String>,
    /// Timeout for the first attempt, in seconds.
    pub initial_timeout_secs: u64,
    /// Timeout for the last attempt, in seconds.
    pub max_timeout_secs: u64,
    /// Retries at the call layer (attempts = retries + 1).
    pub retries: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "WEFT_API_KEY".to_string(),
            models: vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
            initial_timeout_secs: 60,
            max_timeout_secs: 120,
            retries: 2,
            temperature: 0.7,
        }
    }
}

impl BackendConfig {
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_timeout_secs)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs.max(self.initial_timeout_secs))
    }
}

/// Size limits for splitting input and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per input chunk sent to the backend.
    pub input_chunk_size: usize,
    /// Maximum characters per message on the delivery channel.
    pub display_chunk_size: usize,
    /// Input length above which a single pattern run is split per chunk.
    pub hard_split_threshold: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            input_chunk_size: 3800,
            display_chunk_size: 4000,
            hard_split_threshold: 100_000,
        }
    }
}

/// Retry budgets above the call layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts for the top-level orchestration retry.
    pub orchestration_retries: u32,
    /// First orchestration backoff in milliseconds (doubles per attempt).
    pub initial_backoff_ms: u64,
    /// Retries for a single chunk inside large or batch runs.
    pub chunk_retries: u32,
    /// Delay between sequential per-chunk backend calls, in milliseconds.
    pub batch_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            orchestration_retries: 2,
            initial_backoff_ms: 2000,
            chunk_retries: 1,
            batch_delay_ms: 500,
        }
    }
}

/// Per-user session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// TTL of pattern session state in seconds. Refreshed on every write.
    pub ttl_secs: u64,
    /// Reject a second pattern operation while one is in flight for a user.
    pub single_flight: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3 * 60 * 60,
            single_flight: true,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Pattern menu settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Patterns shown per menu page.
    pub patterns_per_page: usize,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            patterns_per_page: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = WeftConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.general.patterns_dir.is_empty());
        assert_eq!(config.backend.initial_timeout_secs, 60);
        assert_eq!(config.backend.max_timeout_secs, 120);
        assert_eq!(config.backend.retries, 2);
        assert_eq!(config.chunking.input_chunk_size, 3800);
        assert_eq!(config.chunking.display_chunk_size, 4000);
        assert_eq!(config.chunking.hard_split_threshold, 100_000);
        assert_eq!(config.retry.orchestration_retries, 2);
        assert_eq!(config.retry.initial_backoff_ms, 2000);
        assert_eq!(config.retry.chunk_retries, 1);
        assert_eq!(config.session.ttl_secs, 10_800);
        assert!(config.session.single_flight);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "debug"

[backend]
models = ["local-large"]
"#;
        let file = create_temp_config(content);
        let config = WeftConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backend.models, vec!["local-large"]);
        assert_eq!(config.backend.retries, 2);
        assert_eq!(config.chunking.input_chunk_size, 3800);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
[general]
log_level = "trace"
patterns_dir = "/srv/patterns"

[backend]
endpoint = "http://localhost:8080/v1/chat/completions"
api_key_env = "LOCAL_KEY"
models = ["a", "b", "c"]
initial_timeout_secs = 10
max_timeout_secs = 30
retries = 1
temperature = 0.2

[chunking]
input_chunk_size = 2000
display_chunk_size = 3000
hard_split_threshold = 50000

[retry]
orchestration_retries = 3
initial_backoff_ms = 100
chunk_retries = 2
batch_delay_ms = 0

[session]
ttl_secs = 600
single_flight = false

[menu]
patterns_per_page = 5
"#;
        let file = create_temp_config(content);
        let config = WeftConfig::load(file.path()).unwrap();
        assert_eq!(config.general.patterns_dir, "/srv/patterns");
        assert_eq!(config.backend.models.len(), 3);
        assert_eq!(config.backend.initial_timeout(), Duration::from_secs(10));
        assert_eq!(config.backend.max_timeout(), Duration::from_secs(30));
        assert_eq!(config.chunking.hard_split_threshold, 50_000);
        assert_eq!(config.retry.batch_delay_ms, 0);
        assert_eq!(config.session.ttl(), Duration::from_secs(600));
        assert!(!config.session.single_flight);
        assert_eq!(config.menu.patterns_per_page, 5);
    }

    #[test]
    fn test_max_timeout_never_below_initial() {
        let backend = BackendConfig {
            initial_timeout_secs: 90,
            max_timeout_secs: 30,
            ..BackendConfig::default()
        };
        assert_eq!(backend.max_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[backend\nretries = ");
        let err = WeftConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, WeftError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = WeftConfig::load_or_default(Path::new("/nonexistent/weft.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WeftConfig::default();
        config.session.ttl_secs = 1234;
        config.save(&path).unwrap();

        let reloaded = WeftConfig::load(&path).unwrap();
        assert_eq!(reloaded.session.ttl_secs, 1234);
        assert_eq!(reloaded.backend.models, config.backend.models);
    }
}
