//! Domain-specific error types for health-profiler

use thiserror::Error;

/// Main error type for the profiling pipeline
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Incomplete profile: {reason}")]
    InputMissing { reason: String },

    #[error("Generative model unavailable after {attempts} attempts")]
    CapabilityUnavailable { attempts: u32 },

    #[error("No JSON object or array found in model output")]
    NoJsonFound,

    #[error("Malformed JSON in model output: {message}")]
    MalformedJson { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProfilerError {
    pub fn input_missing(reason: impl Into<String>) -> Self {
        ProfilerError::InputMissing {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ProfilerError::Config {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ProfilerError {
    fn from(err: anyhow::Error) -> Self {
        ProfilerError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(err: serde_json::Error) -> Self {
        ProfilerError::MalformedJson {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ProfilerError {
    fn from(err: std::io::Error) -> Self {
        ProfilerError::Io {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ProfilerError {
    fn from(err: toml::de::Error) -> Self {
        ProfilerError::Config {
            message: format!("invalid TOML: {}", err),
        }
    }
}

/// Result type alias for profiler operations
pub type Result<T> = std::result::Result<T, ProfilerError>;
