//! Runtime configuration.
//!
//! Everything the server needs is collected into [`ServerConfig`] once at
//! startup (from CLI flags and environment, see `main.rs`) and handed to
//! constructors explicitly. Nothing here is read lazily or stored globally.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use motion_core::HeuristicConfig;
use thiserror::Error;
use url::Url;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8001;
/// Default deadline for one model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default cap on request bodies (64 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Environment variables searched for a model credential, in order.
pub const API_KEY_VARS: [&str; 3] = ["MOTION_EDIT_API_KEY", "GOOGLE_API_KEY", "EMERGENT_LLM_KEY"];

const GEMINI_KEY_PREFIX: &str = "AIza";
const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o";

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The model endpoint is not a valid absolute URL.
    #[error("invalid model endpoint: {0}")]
    InvalidEndpoint(String),
    /// The model timeout must be positive.
    #[error("model timeout must be greater than zero")]
    InvalidTimeout,
    /// Scale parameters must be positive and finite.
    #[error("invalid scale setting: {0}")]
    InvalidScale(String),
    /// The request body limit must be positive.
    #[error("max body size must be greater than zero")]
    InvalidBodyLimit,
}

/// Wire protocol spoken to the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini `generateContent`.
    Gemini,
    /// OpenAI-compatible `chat/completions`.
    OpenAi,
}

impl Provider {
    /// Pick the provider a credential belongs to.
    ///
    /// Google API keys carry a fixed prefix; everything else is sent to an
    /// OpenAI-compatible endpoint.
    #[must_use]
    pub fn for_api_key(api_key: &str) -> Self {
        if api_key.starts_with(GEMINI_KEY_PREFIX) {
            Self::Gemini
        } else {
            Self::OpenAi
        }
    }

    /// Default API base URL.
    #[must_use]
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_ENDPOINT,
            Self::OpenAi => OPENAI_ENDPOINT,
        }
    }

    /// Default model name.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_MODEL,
            Self::OpenAi => OPENAI_MODEL,
        }
    }

    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

/// Settings for the external model call.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Credential; `None` leaves the model unavailable.
    pub api_key: Option<String>,
    /// API base URL override.
    pub endpoint: Option<Url>,
    /// Model name override.
    pub model: Option<String>,
    /// Deadline for one call.
    pub timeout: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            model: None,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }
}

impl EditorConfig {
    /// Read the credential from the first non-empty variable in [`API_KEY_VARS`].
    #[must_use]
    pub fn api_key_from_env() -> Option<String> {
        API_KEY_VARS.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }

    /// Provider implied by the credential, if there is one.
    #[must_use]
    pub fn provider(&self) -> Option<Provider> {
        self.api_key.as_deref().map(Provider::for_api_key)
    }

    /// Parse and attach an endpoint override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if `endpoint` is not a URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        self.endpoint = Some(url);
        Ok(self)
    }

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimeout`] for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Everything the edit pipeline is built from.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// External model settings.
    pub editor: EditorConfig,
    /// Fallback rule settings.
    pub heuristics: HeuristicConfig,
}

impl PipelineConfig {
    /// Check invariants of both halves.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.editor.validate()?;
        let HeuristicConfig {
            scale_factor,
            scale_cap,
            ..
        } = &self.heuristics;
        if !scale_factor.is_finite() || *scale_factor <= 0.0 {
            return Err(ConfigError::InvalidScale(format!(
                "factor {scale_factor} must be positive"
            )));
        }
        if !scale_cap.is_finite() || *scale_cap <= 0.0 {
            return Err(ConfigError::InvalidScale(format!(
                "cap {scale_cap} must be positive"
            )));
        }
        Ok(())
    }
}

/// Top-level server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind: IpAddr,
    /// TCP port.
    pub port: u16,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Edit pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Check invariants, including the pipeline's.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidBodyLimit);
        }
        self.pipeline.validate()
    }

    /// Split a comma-separated origin list, as given in `CORS_ORIGINS`.
    #[must_use]
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_key_prefix() {
        assert_eq!(Provider::for_api_key("AIzaSyExample"), Provider::Gemini);
        assert_eq!(Provider::for_api_key("sk-emergent-123"), Provider::OpenAi);
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(Provider::Gemini.default_model(), "gemini-2.0-flash");
        assert_eq!(Provider::OpenAi.default_model(), "gpt-4o");
        assert!(Url::parse(Provider::Gemini.default_endpoint()).is_ok());
        assert!(Url::parse(Provider::OpenAi.default_endpoint()).is_ok());
    }

    #[test]
    fn test_editor_config_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.provider().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = EditorConfig::default()
            .with_endpoint("not a url")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = EditorConfig {
            timeout: Duration::ZERO,
            ..EditorConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_scale_settings_validated() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.heuristics.scale_factor = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidScale(_))));

        config.heuristics.scale_factor = 1.2;
        config.heuristics.scale_cap = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidScale(_))));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            ServerConfig::parse_origins("http://localhost:3000, https://app.example.com,,"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
        assert_eq!(ServerConfig::parse_origins("*"), vec!["*"]);
    }

    #[test]
    fn test_body_limit_validated() {
        let mut config = ServerConfig::default();
        assert!(config.max_body_bytes > 2 * 1024 * 1024);
        assert!(config.validate().is_ok());

        config.max_body_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBodyLimit)));
    }

    #[test]
    fn test_default_socket_addr_is_localhost() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8001");
    }
}
