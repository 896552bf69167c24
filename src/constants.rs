//! Shared constants and defaults
//!

/// The default place generated images are written to
pub const DEFAULT_OUTPUT_DIR: &str = "./generated";

/// Default cap on completion output tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature for copy generation.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default size requested from the image service.
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Default bound for the longer side of a written thumbnail, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 300;

/// Default JPEG quality for written thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Default timeout for a single remote call, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 120;

/// Color hint appended to every per-template synthesis prompt.
pub const DEFAULT_DOMINANT_COLOR: &str = "#FFFFFF";

/// How many color templates can be selected for one synthesis run.
pub const MAX_TEMPLATE_SELECTIONS: usize = 3;

/// Name of the structured output schema sent with completion requests.
pub const COPY_SCHEMA_NAME: &str = "json";

/// Environment variable names for the Azure OpenAI settings.
pub mod env {
    /// Service endpoint, eg `https://example.openai.azure.com`
    pub const ENDPOINT: &str = "AOAI_ENDPOINT";
    /// API key
    pub const KEY: &str = "AOAI_KEY";
    /// API version query parameter
    pub const API_VERSION: &str = "AOAI_API_VERSION";
    /// Deployment used for chat completions
    pub const CHAT_DEPLOYMENT: &str = "AOAI_CHAT_DEPLOYMENT_NAME";
    /// Deployment used for image generation
    pub const IMAGE_DEPLOYMENT: &str = "AOAI_IMAGE_DEPLOYMENT_NAME";
}
