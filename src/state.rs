//! Per-request form state and synthesis prompt building.
//!
//! The form posts everything it shows back on every submit, so the state is
//! rebuilt from the posted pairs each time. Nothing is kept between requests.

use tracing::warn;

use crate::catalog::{Catalog, ColorTemplate};
use crate::constants::{DEFAULT_DOMINANT_COLOR, MAX_TEMPLATE_SELECTIONS};
use crate::copy::CopyResult;

/// How synthesis prompts are assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptOptions {
    /// Appended as `Dominant color: ...` to every per-template prompt; `None`
    /// leaves the hint out.
    pub dominant_color: Option<String>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            dominant_color: Some(DEFAULT_DOMINANT_COLOR.to_string()),
        }
    }
}

/// One image to synthesize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisJob {
    /// Template name, or `None` for the default job.
    pub template: Option<String>,
    /// File name to write within the output directory.
    pub file_name: String,
    /// The full prompt sent to the image service.
    pub prompt: String,
}

impl SynthesisJob {
    /// Template name shown next to the generated image, if any.
    pub fn label(&self) -> Option<&str> {
        self.template.as_deref()
    }
}

/// What the form currently holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationState {
    /// The marketing objective.
    pub objective: String,
    /// Copy fields, generated or edited by hand.
    pub copy: CopyResult,
    selected: Vec<String>,
    overflow: Vec<String>,
}

impl GenerationState {
    /// An empty state for `objective`.
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            ..Default::default()
        }
    }

    /// Rebuilds state from posted form pairs. Repeated `template` keys select
    /// templates; unknown keys are ignored.
    pub fn from_form(pairs: &[(String, String)], catalog: &Catalog) -> Self {
        let mut state = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "objective" => state.objective = value.clone(),
                "copy_text_main" => state.copy.main_text = value.clone(),
                "copy_text_sub" => state.copy.sub_text = value.clone(),
                "captions_en" => state.copy.caption_en = value.clone(),
                "captions_ja" => state.copy.caption_ja = value.clone(),
                "template" => {
                    state.select_template(value, catalog);
                }
                _ => {}
            }
        }
        state
    }

    /// Replaces the copy fields with a generated result.
    pub fn with_copy(mut self, copy: CopyResult) -> Self {
        self.copy = copy;
        self
    }

    /// Selects a template by name. Returns false when the name is unknown,
    /// already selected, or the selection is full.
    pub fn select_template(&mut self, name: &str, catalog: &Catalog) -> bool {
        if catalog.get(name).is_none() {
            warn!("Ignoring unknown template {name:?}");
            return false;
        }
        if self.is_selected(name) {
            return false;
        }
        if self.selected.len() >= MAX_TEMPLATE_SELECTIONS {
            warn!("Ignoring template {name:?}, at most {MAX_TEMPLATE_SELECTIONS} can be selected");
            if !self.overflow.iter().any(|dropped| dropped == name) {
                self.overflow.push(name.to_string());
            }
            return false;
        }
        self.selected.push(name.to_string());
        true
    }

    /// Selected template names, in selection order.
    pub fn selected_templates(&self) -> &[String] {
        &self.selected
    }

    /// Known templates that were left out because the selection was full.
    pub fn overflow_templates(&self) -> &[String] {
        &self.overflow
    }

    /// Whether `name` is selected.
    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.iter().any(|selected| selected == name)
    }

    /// Images need at least main text and a Japanese caption.
    pub fn can_synthesize(&self) -> bool {
        !self.copy.main_text.trim().is_empty() && !self.copy.caption_ja.trim().is_empty()
    }

    /// The prompt shared by every job.
    pub fn base_prompt(&self) -> String {
        format!(
            "{}, Clearly shown Main Text: {}, Sub Text: {}",
            self.copy.caption_ja, self.copy.main_text, self.copy.sub_text
        )
    }

    /// One job per selected template, or a single default job.
    pub fn synthesis_jobs(&self, catalog: &Catalog, options: &PromptOptions) -> Vec<SynthesisJob> {
        let base = self.base_prompt();
        let templates: Vec<&ColorTemplate> = self
            .selected
            .iter()
            .filter_map(|name| catalog.get(name))
            .collect();
        if templates.is_empty() {
            return vec![SynthesisJob {
                template: None,
                file_name: image_file_name(None),
                prompt: base,
            }];
        }

        let mut jobs: Vec<SynthesisJob> = Vec::with_capacity(templates.len());
        for (index, template) in templates.into_iter().enumerate() {
            let mut file_name = image_file_name(Some(&template.name));
            if jobs.iter().any(|job| job.file_name == file_name) {
                file_name = format!("pop_image_{index}.jpg");
            }
            jobs.push(SynthesisJob {
                template: Some(template.name.clone()),
                file_name,
                prompt: template_prompt(&base, template, options),
            });
        }
        jobs
    }
}

/// Adds a template's colors, and the dominant color hint, to `base`.
pub fn template_prompt(base: &str, template: &ColorTemplate, options: &PromptOptions) -> String {
    let colors: Vec<String> = template.colors.iter().map(|color| quoted(color)).collect();
    let mut prompt = format!("{base} Key Colors: [{}]", colors.join(", "));
    if let Some(dominant) = options.dominant_color.as_deref() {
        prompt.push_str(" Dominant color: ");
        prompt.push_str(dominant);
    }
    prompt
}

/// Single quotes, or double quotes when the value holds a single quote.
fn quoted(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{value}\"")
    } else {
        format!("'{value}'")
    }
}

/// `pop_image_{name}.jpg` with everything but ASCII word characters and `-`
/// stripped from the name.
pub fn image_file_name(template: Option<&str>) -> String {
    let cleaned: String = template
        .unwrap_or("default")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "pop_image_default.jpg".to_string()
    } else {
        format!("pop_image_{cleaned}.jpg")
    }
}
