pub(crate) use crate::error::PopError;
pub(crate) use crate::state::{GenerationState, image_file_name};
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::Json;
pub(crate) use axum::extract::{Form, State};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use tracing::{error, info};
