use serde::{Deserialize, Serialize};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Timeout budget for completion calls, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Timeout budget for model-listing calls, in seconds.
    #[serde(default = "default_model_list_timeout")]
    pub model_list_timeout: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    300
}
fn default_model_list_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            model_list_timeout: default_model_list_timeout(),
            log_level: default_log_level(),
        }
    }
}

/// One configured Gemini connection, identified by its position in
/// [`GeminiSettings::endpoints`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiEndpoint {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Static model ids exposed without a discovery call; empty means
    /// "discover via the models API".
    #[serde(default)]
    pub model_ids: Vec<String>,
    /// Optional prefix prepended to every exposed model id as
    /// `{prefix_id}.{raw_id}`.
    #[serde(default)]
    pub prefix_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GeminiEndpoint {
    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Gemini adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub endpoints: Vec<GeminiEndpoint>,
}

fn default_true() -> bool {
    true
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            enable: true,
            endpoints: Vec::new(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiSettings,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate semantic constraints the YAML schema cannot express.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when an endpoint base URL is not a
/// valid absolute http(s) URL or an enabled endpoint has an empty credential.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    for (idx, endpoint) in config.gemini.endpoints.iter().enumerate() {
        let parsed = url::Url::parse(&endpoint.base_url).map_err(|e| {
            ConfigError::Validation(format!("gemini.endpoints[{idx}].base_url: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "gemini.endpoints[{idx}].base_url: unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        if endpoint.enable && endpoint.api_key.is_empty() {
            return Err(ConfigError::Validation(format!(
                "gemini.endpoints[{idx}].api_key must not be empty for an enabled endpoint"
            )));
        }
    }

    if config.gemini.enable && config.gemini.endpoints.is_empty() {
        tracing::warn!("Gemini API enabled but no endpoints configured");
    }

    Ok(())
}
