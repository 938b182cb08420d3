// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Loads environment variables, optionally restricted to a prefix.
///
/// With prefix `COURIER`, `COURIER_WEBHOOK_TIMEOUT_MS` becomes the key
/// `webhook_timeout_ms`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching variables from the process environment
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    /// Filter and normalize an arbitrary set of variables
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| self.normalize_key(&key).map(|k| (k, value)))
            .collect()
    }

    fn normalize_key(&self, key: &str) -> Option<String> {
        match self.prefix {
            Some(ref prefix) => {
                let rest = key.strip_prefix(prefix.as_str())?.strip_prefix('_')?;
                if rest.is_empty() {
                    None
                } else {
                    Some(rest.to_lowercase())
                }
            }
            None => Some(key.to_lowercase()),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        };

        env::var(&full_key).map_err(|source| ConfigError::MissingEnv {
            key: full_key,
            source,
        })
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
