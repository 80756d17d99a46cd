use anyhow::{Context, Result};
use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bus: BusConfig,
    pub storage: StorageConfig,
    pub inference: InferenceConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Message bus (Redis Streams) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    pub url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Object storage configuration (path-style GET: endpoint/bucket/key)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
}

/// Inference API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_flashcard_model")]
    pub flashcard_model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub url: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: std::path::PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_topic() -> String {
    "pdf_uploaded".to_string()
}

fn default_group() -> String {
    "ai-study-notes-worker".to_string()
}

fn default_block_timeout_ms() -> u64 {
    5000
}

fn default_batch_size() -> usize {
    10
}

fn default_inference_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

fn default_summary_model() -> String {
    "facebook/bart-large-cnn".to_string()
}

fn default_flashcard_model() -> String {
    "google/flan-t5-base".to_string()
}

fn default_api_key_env() -> String {
    "HUGGINGFACE_API_KEY".to_string()
}

fn default_chunk_size() -> usize {
    1500
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_ttl_secs() -> u64 {
    86400
}

fn default_http_enabled() -> bool {
    true
}

fn default_http_port() -> u16 {
    4000
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in STUDYNOTES_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("STUDYNOTES_CONFIG")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.bus.url.is_empty() {
            anyhow::bail!("bus.url must be set (redis connection string)");
        }

        if self.cache.url.is_empty() {
            anyhow::bail!("cache.url must be set (redis connection string)");
        }

        if self.storage.endpoint.is_empty() || self.storage.bucket.is_empty() {
            anyhow::bail!("storage.endpoint and storage.bucket must be set");
        }

        // Check both environment variable and .env file (dotenv already loaded in Config::load)
        std::env::var(&self.inference.api_key_env)
            .with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your inference API key.",
                    self.inference.api_key_env
                )
            })?;

        if self.inference.chunk_size == 0 {
            anyhow::bail!("inference.chunk_size must be greater than 0");
        }

        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn test_config_toml() -> &'static str {
        r#"
[bus]
url = "redis://127.0.0.1:6379"
topic = "pdf_uploaded"
group = "ai-study-notes-worker"

[storage]
endpoint = "http://127.0.0.1:9000"
bucket = "study-notes"

[inference]
summary_model = "facebook/bart-large-cnn"
api_key_env = "HUGGINGFACE_API_KEY"
chunk_size = 1500

[cache]
url = "redis://127.0.0.1:6379"
ttl_secs = 86400

[store]
db_path = "./notes.db"

[http_server]
enabled = true
port = 4000
"#
    }

    fn with_config_env(config_path: &std::path::Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("STUDYNOTES_CONFIG").ok();
        let original_key = std::env::var("HUGGINGFACE_API_KEY").ok();
        std::env::set_var("STUDYNOTES_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("HUGGINGFACE_API_KEY", k),
            None => std::env::remove_var("HUGGINGFACE_API_KEY"),
        }
        f();
        std::env::remove_var("STUDYNOTES_CONFIG");
        std::env::remove_var("HUGGINGFACE_API_KEY");
        if let Some(val) = original_config {
            std::env::set_var("STUDYNOTES_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("HUGGINGFACE_API_KEY", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, test_config_toml()).unwrap();

        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.bus.topic, "pdf_uploaded");
            assert_eq!(config.inference.chunk_size, 1500);
            assert_eq!(config.cache.ttl_secs, 86400);
            assert_eq!(config.http_server.port, 4000);
        });
    }

    #[test]
    fn test_config_defaults_applied() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        // Minimal config: rely on defaults for everything optional
        fs::write(
            &config_path,
            r#"
[bus]
url = "redis://127.0.0.1:6379"

[storage]
endpoint = "http://127.0.0.1:9000"
bucket = "study-notes"

[inference]

[cache]
url = "redis://127.0.0.1:6379"

[store]
db_path = "./notes.db"
"#,
        )
        .unwrap();

        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load().unwrap();
            assert_eq!(config.bus.topic, "pdf_uploaded");
            assert_eq!(config.bus.group, "ai-study-notes-worker");
            assert_eq!(config.inference.summary_model, "facebook/bart-large-cnn");
            assert_eq!(config.inference.chunk_size, 1500);
            assert_eq!(config.cache.ttl_secs, 86400);
            assert!(config.http_server.enabled);
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, test_config_toml()).unwrap();

        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config
                .unwrap_err()
                .to_string()
                .contains("HUGGINGFACE_API_KEY"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("STUDYNOTES_CONFIG").ok();
        std::env::set_var("STUDYNOTES_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("STUDYNOTES_CONFIG");
        if let Some(v) = original {
            std::env::set_var("STUDYNOTES_CONFIG", v);
        }
    }

    #[test]
    fn test_config_zero_chunk_size_rejected() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let toml = test_config_toml().replace("chunk_size = 1500", "chunk_size = 0");
        fs::write(&config_path, toml).unwrap();

        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("chunk_size"));
        });
    }
}
