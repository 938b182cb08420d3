// Configuration management for Courier services

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Main configuration manager
///
/// Values from every source are kept as JSON values; later loads override
/// earlier ones key by key.
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Start a builder that composes several sources
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.config.read().map_err(|_| ConfigError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.config.write().map_err(|_| ConfigError::Poisoned)
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.load_vars(loader.load()?)
    }

    /// Load already collected string pairs (as produced by [`EnvLoader`])
    pub fn load_vars(&self, vars: HashMap<String, String>) -> Result<()> {
        let mut config = self.write()?;
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
        Ok(())
    }

    /// Load configuration from .env file, then the environment
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
            }
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data)
    }

    /// Merge a JSON object into the configuration
    pub fn merge_value(&self, data: Value) -> Result<()> {
        let Value::Object(map) = data else {
            return Err(ConfigError::ParseError(
                "top-level configuration must be an object".to_string(),
            ));
        };

        let mut config = self.write()?;
        for (key, value) in map {
            config.insert(key, value);
        }
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.write()?.insert(key.to_string(), json_value);
        Ok(())
    }

    fn value(&self, key: &str) -> Result<Value> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        serde_json::from_value(self.value(key)?)
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a value that may be stored natively or as a string.
    ///
    /// Environment variables always arrive as strings, so numeric settings
    /// should be read through this accessor.
    pub fn get_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr + DeserializeOwned,
        T::Err: std::fmt::Display,
    {
        match self.value(key)? {
            Value::String(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", key, e))),
            other => serde_json::from_value(other)
                .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e))),
        }
    }

    /// Like [`get_parsed`](Self::get_parsed), but a missing key yields `None`
    pub fn get_parsed_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr + DeserializeOwned,
        T::Err: std::fmt::Display,
    {
        match self.get_parsed(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.read().map(|c| c.contains_key(key)).unwrap_or(false)
    }

    /// Get all configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Deserialize the whole configuration and validate it
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let json_value = Value::Object(
            self.read()?
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let validated: T = serde_json::from_value(json_value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder composing configuration sources in load order
#[derive(Default)]
pub struct ConfigBuilder {
    prefix: Option<String>,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    config_files: Vec<(String, FileFormat)>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Enable loading from .env file
    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add configuration file to load
    pub fn add_file(mut self, path: impl Into<String>, format: FileFormat) -> Self {
        self.config_files.push((path.into(), format));
        self
    }

    /// Build the manager. Files load first so the environment overrides them.
    pub fn build(self) -> Result<ConfigManager> {
        let manager = match self.prefix {
            Some(prefix) => ConfigManager::with_prefix(prefix),
            None => ConfigManager::new(),
        };

        for (path, format) in &self.config_files {
            manager.load_file(path, *format)?;
        }

        if self.load_dotenv {
            manager.load_dotenv(self.dotenv_path.as_deref().map(Path::new))?;
        } else if self.load_env {
            manager.load_env()?;
        }

        Ok(manager)
    }
}
