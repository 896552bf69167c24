//! Server-rendered form: copy generation and image synthesis.

use std::time::{SystemTime, UNIX_EPOCH};

use super::prelude::*;
use crate::constants::MAX_TEMPLATE_SELECTIONS;

#[derive(Clone, Debug)]
pub(crate) struct TemplateOption {
    pub(crate) name: String,
    pub(crate) colors: Vec<String>,
    pub(crate) checked: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct ImageCard {
    pub(crate) label: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) caption: String,
    pub(crate) error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) objective: String,
    pub(crate) main_text: String,
    pub(crate) sub_text: String,
    pub(crate) caption_en: String,
    pub(crate) caption_ja: String,
    pub(crate) templates: Vec<TemplateOption>,
    pub(crate) max_templates: usize,
    pub(crate) can_synthesize: bool,
    pub(crate) error: Option<String>,
    pub(crate) notice: Option<String>,
    pub(crate) images: Vec<ImageCard>,
}

impl IndexTemplate {
    fn new(app: &AppState, state: GenerationState) -> Self {
        let templates = app
            .catalog
            .templates()
            .iter()
            .map(|template| TemplateOption {
                name: template.name.clone(),
                colors: template.colors.clone(),
                checked: state.is_selected(&template.name),
            })
            .collect();
        let can_synthesize = state.can_synthesize();
        let notice = (!state.overflow_templates().is_empty()).then(|| {
            format!(
                "テンプレートは最大{MAX_TEMPLATE_SELECTIONS}つまで選択できます。{} は使用されません。",
                state.overflow_templates().join(", ")
            )
        });
        Self {
            objective: state.objective,
            main_text: state.copy.main_text,
            sub_text: state.copy.sub_text,
            caption_en: state.copy.caption_en,
            caption_ja: state.copy.caption_ja,
            templates,
            max_templates: MAX_TEMPLATE_SELECTIONS,
            can_synthesize,
            error: None,
            notice,
            images: Vec::new(),
        }
    }

    fn with_error(mut self, message: String) -> Self {
        self.error = Some(message);
        self
    }
}

/// handles the / GET
pub(crate) async fn index_handler(State(app): State<AppState>) -> IndexTemplate {
    IndexTemplate::new(&app, GenerationState::default())
}

/// Generates copy for the posted objective and refills the form.
pub(crate) async fn generate_handler(
    State(app): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> IndexTemplate {
    let state = GenerationState::from_form(&pairs, &app.catalog);
    if state.objective.trim().is_empty() {
        return IndexTemplate::new(&app, state)
            .with_error("やりたいこと、目的を入力してください。".to_string());
    }

    match app.generator.generate(&state.objective).await {
        Ok(copy) => IndexTemplate::new(&app, state.with_copy(copy)),
        Err(err) => {
            error!("Copy generation failed: {err}");
            IndexTemplate::new(&app, state).with_error(format!("入力プロンプト生成に失敗しました: {err}"))
        }
    }
}

/// Synthesizes one image per selected template, one after the other.
pub(crate) async fn synthesize_handler(
    State(app): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> IndexTemplate {
    let state = GenerationState::from_form(&pairs, &app.catalog);
    if !state.can_synthesize() {
        return IndexTemplate::new(&app, state)
            .with_error("メインテキストと画像の説明を入力してください。".to_string());
    }

    let jobs = state.synthesis_jobs(&app.catalog, &app.prompt_options);
    let version = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut images = Vec::with_capacity(jobs.len());
    for job in jobs {
        let path = app.output_dir.join(&job.file_name);
        let card = match app.synthesizer.synthesize(&job.prompt, &path).await {
            Ok(_) => ImageCard {
                label: job.label().map(str::to_string),
                url: Some(format!("/images/{}?v={version}", job.file_name)),
                caption: state.copy.caption_en.clone(),
                error: None,
            },
            Err(err) => {
                error!("Image generation for {} failed: {err}", job.file_name);
                ImageCard {
                    label: job.label().map(str::to_string),
                    url: None,
                    caption: String::new(),
                    error: Some(format!("画像生成に失敗しました: {err}")),
                }
            }
        };
        images.push(card);
    }
    info!("Rendered {} image(s)", images.len());

    let mut page = IndexTemplate::new(&app, state);
    page.images = images;
    page
}
