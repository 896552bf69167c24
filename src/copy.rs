//! Ad copy generation.
//!
//! The model is asked for exactly four string fields through a strict
//! `json_schema` response format; the answer is accepted only if all four
//! decode.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::azure::AzureClient;
use crate::config::GenerationOptions;
use crate::constants::COPY_SCHEMA_NAME;
use crate::error::GenerationError;

/// Instruction sent verbatim ahead of every objective.
pub const INSTRUCTION: &str = "あなたはPOPを生成するAIです。以下の目的に基づいて、適切なテキストと画像を生成するためのプロンプトを生成します。テキストは日本語で作成します。背景生成プロンプトは英語で作成し、日本語に翻訳してください。[{'copy_text_main': '主となるテキスト', 'copy_text_sub': 'サブテキスト', 'captions_en': 'image generation prompt', 'captions_ja': '画像生成プロンプト'}]";

/// Generated copy and image captions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CopyResult {
    /// Main POP text, in Japanese.
    #[serde(rename = "copy_text_main")]
    pub main_text: String,
    /// Secondary POP text, in Japanese.
    #[serde(rename = "copy_text_sub")]
    pub sub_text: String,
    /// Image generation caption, in English.
    #[serde(rename = "captions_en")]
    pub caption_en: String,
    /// The same caption translated to Japanese.
    #[serde(rename = "captions_ja")]
    pub caption_ja: String,
}

impl CopyResult {
    /// Decodes the model's output, failing unless all four fields are present.
    pub fn from_payload(payload: &str) -> Result<Self, GenerationError> {
        serde_json::from_str(payload).map_err(|source| GenerationError::Decode {
            source,
            payload: payload.to_string(),
        })
    }
}

/// The user message for an objective: instruction, then the labelled objective.
pub fn user_message(objective: &str) -> String {
    format!("{INSTRUCTION} \n 目的: {objective}")
}

/// Output schema the completion service enforces.
pub fn copy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "copy_text_main": {"type": "string"},
            "copy_text_sub": {"type": "string"},
            "captions_en": {"type": "string"},
            "captions_ja": {"type": "string"}
        },
        "required": ["copy_text_main", "copy_text_sub", "captions_en", "captions_ja"],
        "additionalProperties": false
    })
}

/// Produces [`CopyResult`]s from objectives.
#[derive(Clone, Debug)]
pub struct CopyGenerator {
    client: AzureClient,
    options: GenerationOptions,
}

impl CopyGenerator {
    /// Creates a generator using the given client and tuning.
    pub fn new(client: AzureClient, options: GenerationOptions) -> Self {
        Self { client, options }
    }

    pub(crate) fn request_body(&self, objective: &str) -> Value {
        json!({
            "model": self.client.config().chat_deployment,
            "messages": [
                {"role": "user", "content": user_message(objective)}
            ],
            "max_tokens": self.options.max_tokens,
            "temperature": self.options.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": COPY_SCHEMA_NAME,
                    "strict": true,
                    "schema": copy_schema()
                }
            }
        })
    }

    /// Asks the model for copy matching `objective`. Not retried on failure.
    pub async fn generate(&self, objective: &str) -> Result<CopyResult, GenerationError> {
        let objective = objective.trim();
        if objective.is_empty() {
            return Err(GenerationError::EmptyObjective);
        }

        let body = self.request_body(objective);
        info!("Copy generation prompt: {}", user_message(objective));

        let completion = self.client.chat_completion(&body).await.map_err(|err| {
            error!("Copy generation request failed: {err}");
            GenerationError::from(err)
        })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| {
                if let Some(reason) = choice.finish_reason.as_deref()
                    && reason != "stop"
                {
                    info!("Copy generation finished with reason {reason}");
                }
                choice.message
            })
            .ok_or(GenerationError::MissingContent)?;

        if let Some(refusal) = message.refusal {
            error!("Copy generation refused: {refusal}");
            return Err(GenerationError::Refused(refusal));
        }
        let content = message.content.ok_or(GenerationError::MissingContent)?;
        info!("Generated inputs: {content}");

        CopyResult::from_payload(&content).inspect_err(|err| {
            error!("Failed to decode generated copy: {err}");
        })
    }
}
