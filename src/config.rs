//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::constants::{
    DEFAULT_IMAGE_SIZE, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_TOKENS,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_TEMPERATURE,
};
use crate::error::ConfigurationError;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Connection settings for the Azure OpenAI resource.
#[derive(Clone)]
pub struct AzureConfig {
    /// Resource endpoint, without a trailing slash.
    pub endpoint: Url,
    /// API key sent in the `api-key` header.
    pub api_key: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Deployment name used for chat completions.
    pub chat_deployment: String,
    /// Deployment name used for image generation and edits.
    pub image_deployment: String,
    /// Upper bound on a single remote call.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("image_deployment", &self.image_deployment)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AzureConfig {
    /// Validates raw settings, naming the first one that is missing.
    pub fn from_settings(
        endpoint: Option<String>,
        api_key: Option<String>,
        api_version: Option<String>,
        chat_deployment: Option<String>,
        image_deployment: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        use crate::constants::env;

        let endpoint = parse_endpoint(&required(env::ENDPOINT, endpoint)?)?;
        Ok(Self {
            endpoint,
            api_key: required(env::KEY, api_key)?,
            api_version: required(env::API_VERSION, api_version)?,
            chat_deployment: required(env::CHAT_DEPLOYMENT, chat_deployment)?,
            image_deployment: required(env::IMAGE_DEPLOYMENT, image_deployment)?,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        })
    }

    /// Overrides the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigurationError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigurationError::Missing(name))
}

/// Parses the service endpoint, which must be an absolute http(s) URL.
pub fn parse_endpoint(value: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidEndpoint {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(value.trim().trim_end_matches('/'))
        .map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("endpoint must include a host"));
    }
    Ok(url)
}

/// Tuning for copy generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    /// Cap on output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationOptions {
    /// Checks the options are within what the service accepts.
    pub fn validate(self) -> Result<Self, ConfigurationError> {
        if self.max_tokens == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "max_tokens",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigurationError::InvalidValue {
                name: "temperature",
                reason: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(self)
    }
}

/// Tuning for image synthesis and post-processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Size requested from the image service, eg `1024x1024`.
    pub image_size: String,
    /// Neither side of the written image exceeds this many pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl SynthesisOptions {
    /// Checks the options describe something we can produce.
    pub fn validate(self) -> Result<Self, ConfigurationError> {
        let size_ok = self
            .image_size
            .split_once('x')
            .map(|(w, h)| w.parse::<u32>().is_ok() && h.parse::<u32>().is_ok())
            .unwrap_or(false);
        if !size_ok {
            return Err(ConfigurationError::InvalidValue {
                name: "image_size",
                reason: format!("{:?} is not WIDTHxHEIGHT", self.image_size),
            });
        }
        if self.max_dimension == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "max_dimension",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigurationError::InvalidValue {
                name: "jpeg_quality",
                reason: format!("{} is outside 1..=100", self.jpeg_quality),
            });
        }
        Ok(self)
    }
}
