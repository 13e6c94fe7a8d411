//! Config Module - Configuration management

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "memory" or "local"
    pub backend: String,
    /// Root directory for the local backend
    pub data_dir: String,
    /// Base under which public object URLs are derived
    pub public_base_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the bearer credential
    pub api_key_env: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            data_dir: "./data".to_string(),
            public_base_url: "http://localhost:5000/storage".to_string(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            chat: ChatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration manager with hot reload
pub struct ConfigManager {
    config: RwLock<Config>,
    config_path: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            config_path: None,
        }
    }

    /// Load from file
    pub async fn load(&mut self, path: &str) -> Result<(), String> {
        let config = Self::read_file(path).await?;
        *self.config.write().await = config;
        self.config_path = Some(path.to_string());
        Ok(())
    }

    /// Reload config from the last loaded file. No-op when nothing was
    /// ever loaded.
    pub async fn reload(&self) -> Result<(), String> {
        if let Some(path) = &self.config_path {
            let config = Self::read_file(path).await?;
            *self.config.write().await = config;
        }
        Ok(())
    }

    /// Get current config
    pub async fn get(&self) -> Config {
        self.config.read().await.clone()
    }

    async fn read_file(path: &str) -> Result<Config, String> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config: {}", e))?;

        if path.ends_with(".toml") {
            toml::from_str(&content).map_err(|e| format!("Invalid TOML: {}", e))
        } else if path.ends_with(".json") {
            serde_json::from_str(&content).map_err(|e| format!("Invalid JSON: {}", e))
        } else {
            Err("Unsupported config format".to_string())
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
