//! JSON endpoints for scripted front-ends.

use std::path::Path;

use super::prelude::*;
use crate::catalog::ColorTemplate;
use crate::copy::CopyResult;

#[derive(Deserialize)]
pub(crate) struct GenerateInputsRequest {
    objectives: String,
}

#[derive(Deserialize)]
pub(crate) struct GenerateImageRequest {
    prompt: String,
    #[serde(default)]
    template: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct EditImageRequest {
    prompt: String,
    #[serde(rename = "filePath")]
    file_path: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ImageUrl {
    pub(crate) url: String,
}

pub(crate) async fn generate_inputs_handler(
    State(app): State<AppState>,
    Json(request): Json<GenerateInputsRequest>,
) -> Result<Json<CopyResult>, PopError> {
    let copy = app.generator.generate(&request.objectives).await?;
    Ok(Json(copy))
}

pub(crate) async fn generate_image_handler(
    State(app): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<Json<ImageUrl>, PopError> {
    if request.prompt.trim().is_empty() {
        return Err(PopError::BadRequest("prompt must not be empty".to_string()));
    }
    let file_name = image_file_name(request.template.as_deref());
    app.synthesizer
        .synthesize(&request.prompt, &app.output_dir.join(&file_name))
        .await?;
    Ok(Json(ImageUrl {
        url: format!("/images/{file_name}"),
    }))
}

pub(crate) async fn edit_image_handler(
    State(app): State<AppState>,
    Json(request): Json<EditImageRequest>,
) -> Result<Json<ImageUrl>, PopError> {
    if request.prompt.trim().is_empty() {
        return Err(PopError::BadRequest("prompt must not be empty".to_string()));
    }
    let source_name = generated_file_name(&request.file_path)
        .ok_or_else(|| PopError::BadRequest(format!("not a generated image: {}", request.file_path)))?;
    let source = app.output_dir.join(source_name);
    if !tokio::fs::try_exists(&source).await? {
        return Err(PopError::NotFound(source_name.to_string()));
    }

    let stem = source_name.trim_end_matches(".jpg");
    let edited_name = if stem.ends_with("_edited") {
        source_name.to_string()
    } else {
        format!("{stem}_edited.jpg")
    };
    app.synthesizer
        .edit(&request.prompt, &source, &app.output_dir.join(&edited_name))
        .await?;
    Ok(Json(ImageUrl {
        url: format!("/images/{edited_name}"),
    }))
}

pub(crate) async fn template_json_handler(State(app): State<AppState>) -> Json<Vec<ColorTemplate>> {
    Json(app.catalog.templates().to_vec())
}

/// Accepts `pop_image_*.jpg`, optionally behind a URL path, and nothing that
/// could point outside the output directory.
fn generated_file_name(file_path: &str) -> Option<&str> {
    let path = file_path.split(['?', '#']).next().unwrap_or_default();
    let name = Path::new(path).file_name()?.to_str()?;
    let stem = name.strip_prefix("pop_image_")?.strip_suffix(".jpg")?;
    let allowed = !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let under_images = match Path::new(path).parent().and_then(|p| p.to_str()) {
        None | Some("") | Some("/images") | Some("images") => true,
        Some(_) => false,
    };
    (allowed && under_images).then_some(name)
}
