// Configuration errors

use std::env::VarError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// No source provided the key
    #[error("missing configuration key `{0}`")]
    KeyNotFound(String),

    /// A file or `.env` source could not be read
    #[error("cannot load configuration: {0}")]
    LoadError(String),

    /// A source was read but its contents, or a string value, did not parse
    #[error("cannot parse configuration: {0}")]
    ParseError(String),

    #[error("invalid configuration: {0}")]
    ValidationError(String),

    #[error("cannot serialize value: {0}")]
    SerializationError(String),

    #[error("cannot deserialize value: {0}")]
    DeserializationError(String),

    /// A single variable was requested and is unset or not unicode
    #[error("environment variable `{key}`: {source}")]
    MissingEnv {
        key: String,
        #[source]
        source: VarError,
    },

    /// A writer panicked while holding the value map
    #[error("configuration store is poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
