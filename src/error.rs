//! Error handling

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::info;

/// Settings that are missing or unusable, detected before any remote call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required setting was not supplied, or was blank.
    #[error("missing required setting {0}")]
    Missing(&'static str),
    /// The service endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint {value:?}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A tuning option is out of range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Name of the setting.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The color template catalog could not be read or parsed.
    #[error("failed to load template catalog {path}: {reason}")]
    Catalog {
        /// Catalog path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}

/// Transport-level failures talking to the Azure OpenAI service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or its body could not be read.
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        message: String,
    },
    /// A service URL could not be built from the endpoint.
    #[error("invalid service URL: {0}")]
    Url(String),
    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Request(err)
        }
    }
}

/// Failures producing ad copy from an objective.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The objective was empty or whitespace.
    #[error("objective must not be empty")]
    EmptyObjective,
    /// The completion call failed.
    #[error("text generation failed: {0}")]
    Api(#[from] ApiError),
    /// The model refused to produce the requested output.
    #[error("model declined the request: {0}")]
    Refused(String),
    /// The completion carried no message content.
    #[error("model returned no content")]
    MissingContent,
    /// The content did not decode into the four copy fields.
    #[error("could not decode generated copy: {source}")]
    Decode {
        /// Decoder error.
        source: serde_json::Error,
        /// The raw content returned by the model.
        payload: String,
    },
}

/// Failures producing or editing an image.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// The image call failed.
    #[error("image generation failed: {0}")]
    Api(#[from] ApiError),
    /// The response listed no usable image.
    #[error("service returned no image")]
    MissingImage,
    /// The image payload was not valid base64.
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The bitmap could not be decoded, resized or encoded.
    #[error("image could not be processed: {0}")]
    Image(#[from] image::ImageError),
    /// Reading the source or writing the output failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The blocking image task panicked or was cancelled.
    #[error("image processing task failed: {0}")]
    Task(String),
}

/// Errors surfaced by the web layer.
#[derive(Debug)]
pub enum PopError {
    /// The request was missing or had invalid input
    BadRequest(String),
    /// When a requested resource is not found
    NotFound(String),
    /// Copy generation failed
    Generation(GenerationError),
    /// Image generation or editing failed
    Synthesis(SynthesisError),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl From<GenerationError> for PopError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::EmptyObjective => PopError::BadRequest(err.to_string()),
            other => PopError::Generation(other),
        }
    }
}

impl From<SynthesisError> for PopError {
    fn from(err: SynthesisError) -> Self {
        PopError::Synthesis(err)
    }
}

impl From<std::io::Error> for PopError {
    fn from(err: std::io::Error) -> Self {
        PopError::InternalServerError(err.to_string())
    }
}

impl std::fmt::Display for PopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PopError::BadRequest(message) => write!(f, "{message}"),
            PopError::NotFound(what) => write!(f, "Not found: {what}"),
            PopError::Generation(err) => write!(f, "{err}"),
            PopError::Synthesis(err) => write!(f, "{err}"),
            PopError::InternalServerError(_) => write!(f, "Internal server error"),
        }
    }
}

impl IntoResponse for PopError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            PopError::BadRequest(message) => {
                info!("Bad request received: {message}");
                StatusCode::BAD_REQUEST
            }
            PopError::NotFound(what) => {
                tracing::error!("404 {what}");
                StatusCode::NOT_FOUND
            }
            PopError::Generation(err) => {
                tracing::error!("Copy generation failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PopError::Synthesis(err) => {
                tracing::error!("Image generation failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PopError::InternalServerError(message) => {
                tracing::error!("Internal server error: {message}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
