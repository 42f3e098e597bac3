use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::clients::CallPolicy;
use crate::error::{ProfilerError, Result};
use crate::profiler::{RecommendStrategy, RiskStrategy};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_CONFIG_PATH: &str = "health_profiler.toml";

/// Main configuration structure loaded from health_profiler.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    /// Runtime configuration loaded from environment variables only
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Generative model endpoint and call budget
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// Model used for survey images; falls back to `name`
    pub vision_name: Option<String>,
    pub api_base: String,
    pub retries: u32,
    pub timeout_ms: u64,
    pub backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let policy = CallPolicy::default();
        Self {
            name: DEFAULT_MODEL.to_string(),
            vision_name: None,
            api_base: DEFAULT_API_BASE.to_string(),
            retries: policy.retries,
            timeout_ms: policy.timeout.as_millis() as u64,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

/// Stage strategy selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub risk_strategy: RiskStrategy,
    pub recommend_strategy: RecommendStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            risk_strategy: RiskStrategy::Heuristic,
            recommend_strategy: RecommendStrategy::Sequential,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Clone, Default)]
pub struct RuntimeConfig {
    pub api_key: String,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RuntimeConfig {
    /// Fails when the model credential is absent; this is a startup error, never per-request.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = get("GEMINI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProfilerError::config("GEMINI_API_KEY is not set in the environment"))?;
        Ok(Self { api_key })
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses PROFILER_CONFIG or defaults to "health_profiler.toml".
    pub fn load() -> Result<Self> {
        if let Ok(env_path) = std::env::var("PROFILER_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::dotenv();
        }

        let config_path =
            std::env::var("PROFILER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(_) => {
                tracing::warn!("Config file {} not found, using defaults", config_path);
                Self::default()
            }
        };

        let env = |key: &str| std::env::var(key).ok();
        config.apply_overrides(env)?;
        config.runtime = RuntimeConfig::from_lookup(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply env-first overrides from the given lookup
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = get("GEMINI_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model.name = name.trim().to_string();
        }
        if let Some(name) = get("GEMINI_VISION_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model.vision_name = Some(name.trim().to_string());
        }
        if let Some(base) = get("GEMINI_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.model.api_base = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(n) = env_number(&get, "PROFILER_MODEL_RETRIES")? {
            self.model.retries = n;
        }
        if let Some(ms) = env_number(&get, "PROFILER_MODEL_TIMEOUT_MS")? {
            self.model.timeout_ms = ms;
        }
        if let Some(ms) = env_number(&get, "PROFILER_RETRY_BACKOFF_MS")? {
            self.model.backoff_ms = ms;
        }
        if let Some(s) = get("PROFILER_RISK_STRATEGY") {
            self.pipeline.risk_strategy = s.parse()?;
        }
        if let Some(s) = get("PROFILER_RECOMMEND_STRATEGY") {
            self.pipeline.recommend_strategy = s.parse()?;
        }
        if let Some(bind) = get("PROFILER_HTTP_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|e| ProfilerError::config(format!("invalid PROFILER_HTTP_BIND: {}", e)))?;
        }
        if let Some(n) = env_number(&get, "PROFILER_MAX_UPLOAD_BYTES")? {
            self.server.max_upload_bytes = n;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.retries == 0 {
            return Err(ProfilerError::config("model retries must be at least 1"));
        }
        if self.model.timeout_ms == 0 {
            return Err(ProfilerError::config("model timeout must be > 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(ProfilerError::config("model name cannot be empty"));
        }
        Ok(())
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            retries: self.model.retries,
            timeout: Duration::from_millis(self.model.timeout_ms),
            backoff: Duration::from_millis(self.model.backoff_ms),
        }
    }

    pub fn vision_model(&self) -> &str {
        self.model.vision_name.as_deref().unwrap_or(&self.model.name)
    }
}

/// Unset or blank is `None`; anything unparseable is a config error
fn env_number<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| ProfilerError::config(format!("invalid {} '{}': {}", key, v, e))),
    }
}
