//! Image synthesis and post-processing.
//!
//! Images come back from the service as base64, get shrunk to a thumbnail and
//! are written as JPEG. The output file is replaced atomically so a failed or
//! interrupted call never leaves a half-written image behind.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::engine::general_purpose;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::multipart::{Form, Part};
use tracing::{debug, error, info};

use crate::azure::{AzureClient, ImagesResponse};
use crate::config::SynthesisOptions;
use crate::error::{ApiError, SynthesisError};

/// A thumbnail written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Where the JPEG was written.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Dimensions that fit `width`x`height` inside a `bound` square, keeping the
/// aspect ratio. Never enlarges.
pub fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width <= bound && height <= bound {
        return (width, height);
    }
    let (w, h, b) = (u64::from(width), u64::from(height), u64::from(bound));
    if w >= h {
        let scaled = ((h * b + w / 2) / w).max(1);
        (bound, u32::try_from(scaled).unwrap_or(bound))
    } else {
        let scaled = ((w * b + h / 2) / h).max(1);
        (u32::try_from(scaled).unwrap_or(bound), bound)
    }
}

/// Decodes `bytes`, shrinks to fit `max_dimension` with Lanczos3 and encodes a
/// JPEG at `quality`. Returns the JPEG with its dimensions.
pub fn render_thumbnail(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<(Vec<u8>, u32, u32), SynthesisError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    debug!("Decoding generated image as {:?}", reader.format());
    let image = reader.decode()?;

    let (width, height) = fit_within(image.width(), image.height(), max_dimension);
    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality).encode_image(&rgb)?;
    Ok((output, width, height))
}

/// Writes `bytes` to a temporary sibling of `path`, then renames it into place.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SynthesisError> {
    static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

    let io_err = |source| SynthesisError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await.map_err(io_err)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image");
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = parent.join(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

    if let Err(err) = tokio::fs::write(&temp_path, bytes).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(io_err(err));
    }
    if let Err(err) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(io_err(err));
    }
    Ok(())
}

/// Produces thumbnails from image prompts.
#[derive(Clone, Debug)]
pub struct ImageSynthesizer {
    client: AzureClient,
    options: SynthesisOptions,
}

impl ImageSynthesizer {
    /// Creates a synthesizer using the given client and tuning.
    pub fn new(client: AzureClient, options: SynthesisOptions) -> Self {
        Self { client, options }
    }

    /// Generates one image for `prompt` and writes its thumbnail to
    /// `output_path`, replacing any existing file.
    pub async fn synthesize(
        &self,
        prompt: &str,
        output_path: &Path,
    ) -> Result<GeneratedImage, SynthesisError> {
        info!("Image generation prompt: {prompt}");
        let response = self
            .client
            .generate_images(prompt, &self.options.image_size)
            .await
            .inspect_err(|err| error!("Image generation request failed: {err}"))?;
        let raw = self.image_bytes(response).await?;
        self.store(raw, output_path).await
    }

    /// Edits the image at `source_path` following `prompt` and writes the
    /// thumbnail of the result to `output_path`.
    pub async fn edit(
        &self,
        prompt: &str,
        source_path: &Path,
        output_path: &Path,
    ) -> Result<GeneratedImage, SynthesisError> {
        info!("Editing {} with prompt: {prompt}", source_path.display());
        let source = tokio::fs::read(source_path)
            .await
            .map_err(|source| SynthesisError::Io {
                path: source_path.to_path_buf(),
                source,
            })?;
        let mime = image::guess_format(&source)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let file_name = source_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.jpg")
            .to_string();

        let part = Part::bytes(source)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(ApiError::from)?;
        let form = Form::new()
            .part("image", part)
            .text("prompt", prompt.to_string())
            .text("size", self.options.image_size.clone())
            .text("n", "1");

        let response = self
            .client
            .edit_image(form)
            .await
            .inspect_err(|err| error!("Image edit request failed: {err}"))?;
        let raw = self.image_bytes(response).await?;
        self.store(raw, output_path).await
    }

    async fn image_bytes(&self, response: ImagesResponse) -> Result<Vec<u8>, SynthesisError> {
        let first = response
            .data
            .into_iter()
            .next()
            .ok_or(SynthesisError::MissingImage)?;

        if let Some(revised_prompt) = first.revised_prompt {
            info!("Revised prompt from service: {revised_prompt}");
        }

        if let Some(b64_json) = first.b64_json {
            Ok(general_purpose::STANDARD.decode(b64_json.trim())?)
        } else if let Some(url) = first.url {
            debug!("Downloading generated image");
            Ok(self.client.download(&url).await?)
        } else {
            Err(SynthesisError::MissingImage)
        }
    }

    async fn store(&self, raw: Vec<u8>, output_path: &Path) -> Result<GeneratedImage, SynthesisError> {
        let max_dimension = self.options.max_dimension;
        let quality = self.options.jpeg_quality;
        let (jpeg, width, height) =
            tokio::task::spawn_blocking(move || render_thumbnail(&raw, max_dimension, quality))
                .await
                .map_err(|err| SynthesisError::Task(err.to_string()))?
                .inspect_err(|err| error!("Failed to process generated image: {err}"))?;

        write_atomically(output_path, &jpeg).await?;
        info!(
            "Saved {}x{} image to {}",
            width,
            height,
            output_path.display()
        );
        Ok(GeneratedImage {
            path: output_path.to_path_buf(),
            width,
            height,
        })
    }
}
