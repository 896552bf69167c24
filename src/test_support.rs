//! A local stand-in for the Azure OpenAI service.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose;
use serde_json::{Value, json};

use crate::config::AzureConfig;

pub(crate) const TEST_API_KEY: &str = "test-key";

pub(crate) const DEFAULT_COPY: &str = r#"{"copy_text_main":"夏のビッグセール","copy_text_sub":"全品最大50%オフ","captions_en":"A bright summer beach with sunflowers and a clear blue sky","captions_ja":"ひまわりと青空が広がる明るい夏のビーチ"}"#;

#[derive(Debug)]
struct StubState {
    chat_content: Option<String>,
    chat_refusal: Option<String>,
    fail_status: Option<u16>,
    image: Vec<u8>,
    image_as_url: bool,
    chat_requests: Vec<Value>,
    image_requests: Vec<Value>,
    edit_prompts: Vec<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct StubAzure {
    pub(crate) base_url: String,
    state: Arc<Mutex<StubState>>,
}

/// Encodes a gradient PNG, optionally with an alpha channel.
pub(crate) fn encode_png(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let image = if alpha {
        image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
        }))
    } else {
        image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        }))
    };
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

pub(crate) fn stub_config(stub: &StubAzure) -> AzureConfig {
    AzureConfig::from_settings(
        Some(stub.base_url.clone()),
        Some(TEST_API_KEY.to_string()),
        Some("2024-10-21".to_string()),
        Some("chat-deployment".to_string()),
        Some("image-deployment".to_string()),
    )
    .expect("stub config")
    .with_request_timeout(Duration::from_secs(10))
}

impl StubAzure {
    pub(crate) async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let stub = Self {
            base_url: format!("http://{addr}"),
            state: Arc::new(Mutex::new(StubState {
                chat_content: Some(DEFAULT_COPY.to_string()),
                chat_refusal: None,
                fail_status: None,
                image: encode_png(1024, 1024, true),
                image_as_url: false,
                chat_requests: Vec::new(),
                image_requests: Vec::new(),
                edit_prompts: Vec::new(),
            })),
        };

        let app = Router::new()
            .route(
                "/openai/deployments/{deployment}/chat/completions",
                post(chat_handler),
            )
            .route(
                "/openai/deployments/{deployment}/images/generations",
                post(generations_handler),
            )
            .route(
                "/openai/deployments/{deployment}/images/edits",
                post(edits_handler),
            )
            .route("/files/image.png", get(file_handler))
            .with_state(stub.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        stub
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StubState) -> T) -> T {
        let mut state = self.state.lock().expect("stub state lock");
        f(&mut state)
    }

    pub(crate) fn set_chat_content(&self, content: &str) {
        self.with_state(|state| state.chat_content = Some(content.to_string()));
    }

    pub(crate) fn set_chat_refusal(&self, refusal: &str) {
        self.with_state(|state| {
            state.chat_content = None;
            state.chat_refusal = Some(refusal.to_string());
        });
    }

    pub(crate) fn set_image(&self, image: Vec<u8>) {
        self.with_state(|state| state.image = image);
    }

    pub(crate) fn respond_with_url(&self) {
        self.with_state(|state| state.image_as_url = true);
    }

    pub(crate) fn fail_with(&self, status: u16) {
        self.with_state(|state| state.fail_status = Some(status));
    }

    pub(crate) fn chat_requests(&self) -> Vec<Value> {
        self.with_state(|state| state.chat_requests.clone())
    }

    pub(crate) fn image_requests(&self) -> Vec<Value> {
        self.with_state(|state| state.image_requests.clone())
    }

    pub(crate) fn edit_prompts(&self) -> Vec<String> {
        self.with_state(|state| state.edit_prompts.clone())
    }

    fn image_payload(&self) -> Value {
        self.with_state(|state| {
            if state.image_as_url {
                json!({"data": [{"url": format!("{}/files/image.png", self.base_url)}]})
            } else {
                json!({
                    "created": 0,
                    "data": [{
                        "b64_json": general_purpose::STANDARD.encode(&state.image),
                        "revised_prompt": "a revised prompt"
                    }]
                })
            }
        })
    }
}

/// Rejects requests the real service would reject, or the configured failure.
fn check(stub: &StubAzure, headers: &HeaderMap, query: &HashMap<String, String>) -> Option<Response> {
    let authorised = headers
        .get("api-key")
        .and_then(|value| value.to_str().ok())
        == Some(TEST_API_KEY);
    if !authorised || !query.contains_key("api-version") {
        return Some((StatusCode::UNAUTHORIZED, "bad credentials").into_response());
    }
    let failure = stub.with_state(|state| state.fail_status);
    failure.map(|status| {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"error": {"message": "stubbed failure"}}))).into_response()
    })
}

async fn chat_handler(
    State(stub): State<StubAzure>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = check(&stub, &headers, &query) {
        return rejection;
    }
    let (content, refusal) = stub.with_state(|state| {
        state.chat_requests.push(body);
        (state.chat_content.clone(), state.chat_refusal.clone())
    });
    Json(json!({
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": content, "refusal": refusal}
        }]
    }))
    .into_response()
}

async fn generations_handler(
    State(stub): State<StubAzure>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejection) = check(&stub, &headers, &query) {
        return rejection;
    }
    stub.with_state(|state| state.image_requests.push(body));
    Json(stub.image_payload()).into_response()
}

async fn edits_handler(
    State(stub): State<StubAzure>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    if let Some(rejection) = check(&stub, &headers, &query) {
        return rejection;
    }
    let mut prompt = None;
    let mut has_image = false;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => prompt = field.text().await.ok(),
            "image" => has_image = field.bytes().await.map(|b| !b.is_empty()).unwrap_or(false),
            _ => {}
        }
    }
    let Some(prompt) = prompt.filter(|_| has_image) else {
        return (StatusCode::BAD_REQUEST, "image and prompt are required").into_response();
    };
    stub.with_state(|state| state.edit_prompts.push(prompt));
    Json(stub.image_payload()).into_response()
}

async fn file_handler(State(stub): State<StubAzure>) -> Response {
    let image = stub.with_state(|state| state.image.clone());
    ([(axum::http::header::CONTENT_TYPE, "image/png")], image).into_response()
}
