//! CLI parser
use clap::{Args, Parser};
use std::num::NonZeroU16;
use std::path::PathBuf;
use std::time::Duration;

use crate::azure::AzureClient;
use crate::catalog::Catalog;
use crate::config::{AzureConfig, GenerationOptions, SynthesisOptions};
use crate::constants::{
    DEFAULT_DOMINANT_COLOR, DEFAULT_IMAGE_SIZE, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION,
    DEFAULT_MAX_TOKENS, DEFAULT_OUTPUT_DIR, DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_TEMPERATURE,
};
use crate::error::ConfigurationError;
use crate::state::PromptOptions;
use crate::web::AppState;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "POPGEN_DEBUG")]
    /// Enable debug logging. Env: POPGEN_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "PORT")]
    /// http listener, defaults to `3000`.
    /// Env: PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "POPGEN_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: POPGEN_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(long, short, default_value = DEFAULT_OUTPUT_DIR, env = "POPGEN_OUTPUT_DIR")]
    /// Where generated images are written and served from.
    /// Env: POPGEN_OUTPUT_DIR
    pub output_dir: PathBuf,

    #[clap(flatten)]
    /// Azure OpenAI connection settings
    pub azure: AzureArgs,

    #[clap(flatten)]
    /// Generation tuning
    pub pipeline: PipelineArgs,
}

impl CliOptions {
    /// Validates everything and builds the web app state.
    pub fn app_state(&self) -> Result<AppState, ConfigurationError> {
        let client = AzureClient::new(self.azure.azure_config()?)?;
        Ok(AppState::new(
            client,
            self.pipeline.generation_options()?,
            self.pipeline.synthesis_options()?,
            self.pipeline.prompt_options(),
            self.pipeline.catalog()?,
            self.output_dir.clone(),
        ))
    }
}

#[derive(Args, Clone, Debug)]
/// Azure OpenAI connection settings. All but the timeout are required.
pub struct AzureArgs {
    #[clap(long, env = "AOAI_ENDPOINT")]
    /// Resource endpoint, eg `https://example.openai.azure.com`.
    /// Env: AOAI_ENDPOINT
    pub endpoint: Option<String>,
    #[clap(long, env = "AOAI_KEY", hide_env_values = true)]
    /// API key. Env: AOAI_KEY
    pub api_key: Option<String>,
    #[clap(long, env = "AOAI_API_VERSION")]
    /// API version, eg `2024-10-21`. Env: AOAI_API_VERSION
    pub api_version: Option<String>,
    #[clap(long, env = "AOAI_CHAT_DEPLOYMENT_NAME")]
    /// Chat completion deployment. Env: AOAI_CHAT_DEPLOYMENT_NAME
    pub chat_deployment: Option<String>,
    #[clap(long, env = "AOAI_IMAGE_DEPLOYMENT_NAME")]
    /// Image generation deployment. Env: AOAI_IMAGE_DEPLOYMENT_NAME
    pub image_deployment: Option<String>,
    #[clap(
        long,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECONDS,
        env = "POPGEN_REQUEST_TIMEOUT"
    )]
    /// Seconds before a remote call is abandoned. Env: POPGEN_REQUEST_TIMEOUT
    pub request_timeout: u64,
}

impl AzureArgs {
    /// Checks the settings, naming the first missing one.
    pub fn azure_config(&self) -> Result<AzureConfig, ConfigurationError> {
        if self.request_timeout == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(AzureConfig::from_settings(
            self.endpoint.clone(),
            self.api_key.clone(),
            self.api_version.clone(),
            self.chat_deployment.clone(),
            self.image_deployment.clone(),
        )?
        .with_request_timeout(Duration::from_secs(self.request_timeout)))
    }
}

#[derive(Args, Clone, Debug)]
/// Tuning for copy generation, image synthesis and prompts.
pub struct PipelineArgs {
    #[clap(long, default_value_t = DEFAULT_MAX_TOKENS, env = "POPGEN_MAX_TOKENS")]
    /// Cap on completion output tokens. Env: POPGEN_MAX_TOKENS
    pub max_tokens: u32,
    #[clap(long, default_value_t = DEFAULT_TEMPERATURE, env = "POPGEN_TEMPERATURE")]
    /// Sampling temperature. Env: POPGEN_TEMPERATURE
    pub temperature: f64,
    #[clap(long, default_value = DEFAULT_IMAGE_SIZE, env = "POPGEN_IMAGE_SIZE")]
    /// Size requested from the image service. Env: POPGEN_IMAGE_SIZE
    pub image_size: String,
    #[clap(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "POPGEN_MAX_DIMENSION")]
    /// Longest side of written images, in pixels. Env: POPGEN_MAX_DIMENSION
    pub max_dimension: u32,
    #[clap(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "POPGEN_JPEG_QUALITY")]
    /// JPEG quality, 1-100. Env: POPGEN_JPEG_QUALITY
    pub jpeg_quality: u8,
    #[clap(long, default_value = DEFAULT_DOMINANT_COLOR, env = "POPGEN_DOMINANT_COLOR")]
    /// Dominant color hint for template prompts; empty to leave it out.
    /// Env: POPGEN_DOMINANT_COLOR
    pub dominant_color: String,
    #[clap(long, env = "POPGEN_TEMPLATE_FILE")]
    /// Color template catalog, defaults to the bundled one.
    /// Env: POPGEN_TEMPLATE_FILE
    pub template_file: Option<PathBuf>,
}

impl PipelineArgs {
    /// Copy generation tuning.
    pub fn generation_options(&self) -> Result<GenerationOptions, ConfigurationError> {
        GenerationOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
        .validate()
    }

    /// Image synthesis tuning.
    pub fn synthesis_options(&self) -> Result<SynthesisOptions, ConfigurationError> {
        SynthesisOptions {
            image_size: self.image_size.clone(),
            max_dimension: self.max_dimension,
            jpeg_quality: self.jpeg_quality,
        }
        .validate()
    }

    /// Prompt assembly options.
    pub fn prompt_options(&self) -> PromptOptions {
        let dominant = self.dominant_color.trim();
        PromptOptions {
            dominant_color: (!dominant.is_empty()).then(|| dominant.to_string()),
        }
    }

    /// The configured catalog, or the bundled one.
    pub fn catalog(&self) -> Result<Catalog, ConfigurationError> {
        match &self.template_file {
            Some(path) => Catalog::load(path),
            None => Catalog::bundled(),
        }
    }
}
