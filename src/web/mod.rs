//! Browser form and JSON API over the generation pipeline.

use std::num::NonZeroU16;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::azure::AzureClient;
use crate::catalog::Catalog;
use crate::config::{GenerationOptions, SynthesisOptions};
use crate::copy::CopyGenerator;
use crate::state::PromptOptions;
use crate::synth::ImageSynthesizer;

mod api;
mod prelude;
mod views;

use api::{edit_image_handler, generate_image_handler, generate_inputs_handler, template_json_handler};
use views::{generate_handler, index_handler, synthesize_handler};

/// Everything a request handler needs. Immutable once built.
#[derive(Clone, Debug)]
pub struct AppState {
    generator: CopyGenerator,
    synthesizer: ImageSynthesizer,
    catalog: Arc<Catalog>,
    prompt_options: PromptOptions,
    output_dir: PathBuf,
}

impl AppState {
    /// Wires the pipeline together; images are written to `output_dir`.
    pub fn new(
        client: AzureClient,
        generation: GenerationOptions,
        synthesis: SynthesisOptions,
        prompt_options: PromptOptions,
        catalog: Catalog,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            generator: CopyGenerator::new(client.clone(), generation),
            synthesizer: ImageSynthesizer::new(client, synthesis),
            catalog: Arc::new(catalog),
            prompt_options,
            output_dir,
        }
    }
}

fn create_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/generate", post(generate_handler))
        .route("/synthesize", post(synthesize_handler))
        .route("/api/generateInputs", post(generate_inputs_handler))
        .route("/api/generateImage", post(generate_image_handler))
        .route("/api/editImage", post(edit_image_handler))
        .route("/template.json", get(template_json_handler))
        .route("/static/styles.css", get(styles_handler))
        .nest_service("/images", ServeDir::new(&state.output_dir))
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Serves the app until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    state: AppState,
) -> Result<(), anyhow::Error> {
    tokio::fs::create_dir_all(&state.output_dir).await?;
    let app = create_router(&state).with_state(state);

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::state::GenerationState;
    use crate::test_support::{StubAzure, stub_config};

    struct Harness {
        stub: StubAzure,
        app: Router,
        output: tempfile::TempDir,
    }

    async fn setup() -> Harness {
        let stub = StubAzure::start().await;
        let output = tempfile::tempdir().expect("tempdir");
        let catalog = Catalog::from_json(
            "inline",
            r##"[
                {"name": "Summer", "color": ["#FFD93D", "#4D96FF"]},
                {"name": "Sakura", "color": ["#FFB7C5"]},
                {"id": "winter", "color": ["#DDEEFF"]}
            ]"##,
        )
        .expect("catalog");
        let state = AppState::new(
            AzureClient::new(stub_config(&stub)).expect("client"),
            GenerationOptions::default(),
            SynthesisOptions::default(),
            PromptOptions::default(),
            catalog,
            output.path().to_path_buf(),
        );
        let app = create_router(&state).with_state(state);
        Harness { stub, app, output }
    }

    async fn read_body(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    fn form_request(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const FILLED_FORM: [(&str, &str); 5] = [
        ("objective", "夏のセール告知"),
        ("copy_text_main", "夏のビッグセール"),
        ("copy_text_sub", "全品最大50%オフ"),
        ("captions_en", "A bright summer beach"),
        ("captions_ja", "明るい夏のビーチ"),
    ];

    #[tokio::test]
    async fn index_lists_templates() {
        let harness = setup().await;
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = harness.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("POP Generator"));
        assert!(body.contains("Summer"));
        assert!(body.contains("Sakura"));
        assert!(body.contains("winter"));
    }

    #[tokio::test]
    async fn styles_are_served() {
        let harness = setup().await;
        let request = Request::builder()
            .uri("/static/styles.css")
            .body(Body::empty())
            .unwrap();
        let response = harness.app.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/css");
    }

    #[tokio::test]
    async fn generate_fills_the_form() {
        let harness = setup().await;
        let request = form_request(
            "/generate",
            &[("objective", "夏のセール告知"), ("template", "Sakura")],
        );
        let response = harness.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("夏のビッグセール"));
        assert!(body.contains("ひまわりと青空が広がる明るい夏のビーチ"));
        assert!(body.contains("夏のセール告知"));
        assert_eq!(harness.stub.chat_requests().len(), 1);
    }

    #[tokio::test]
    async fn generate_without_objective_shows_error() {
        let harness = setup().await;
        let request = form_request("/generate", &[("objective", "  ")]);
        let response = harness.app.oneshot(request).await.unwrap();
        let body = read_body(response).await;
        assert!(body.contains("目的を入力してください"));
        assert!(harness.stub.chat_requests().is_empty());
    }

    #[tokio::test]
    async fn generate_failure_is_shown_and_form_kept() {
        let harness = setup().await;
        harness.stub.fail_with(401);
        let request = form_request("/generate", &[("objective", "閉店セール")]);
        let response = harness.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("入力プロンプト生成に失敗しました"));
        assert!(body.contains("閉店セール"));
    }

    #[tokio::test]
    async fn synthesize_renders_one_image_per_template() {
        let harness = setup().await;
        let mut pairs = FILLED_FORM.to_vec();
        pairs.push(("template", "Summer"));
        pairs.push(("template", "winter"));
        let response = harness
            .app
            .clone()
            .oneshot(form_request("/synthesize", &pairs))
            .await
            .unwrap();
        let body = read_body(response).await;
        assert!(body.contains("/images/pop_image_Summer.jpg"));
        assert!(body.contains("/images/pop_image_winter.jpg"));
        assert!(harness.output.path().join("pop_image_Summer.jpg").exists());
        assert!(harness.output.path().join("pop_image_winter.jpg").exists());

        let prompts: Vec<String> = harness
            .stub
            .image_requests()
            .iter()
            .map(|request| request["prompt"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].ends_with("Key Colors: ['#FFD93D', '#4D96FF'] Dominant color: #FFFFFF"));

        let request = Request::builder()
            .uri("/images/pop_image_Summer.jpg")
            .body(Body::empty())
            .unwrap();
        let response = harness.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/jpeg");
    }

    #[tokio::test]
    async fn objective_to_thumbnail() {
        let stub = StubAzure::start().await;
        let client = AzureClient::new(stub_config(&stub)).expect("client");
        let generator = CopyGenerator::new(client.clone(), GenerationOptions::default());
        let synthesizer = ImageSynthesizer::new(client, SynthesisOptions::default());
        let output = tempfile::tempdir().expect("tempdir");

        let copy = generator.generate("夏のセール告知").await.expect("copy");
        let prompt = GenerationState::new("夏のセール告知")
            .with_copy(copy.clone())
            .base_prompt();
        assert_eq!(
            prompt,
            format!(
                "{}, Clearly shown Main Text: {}, Sub Text: {}",
                copy.caption_ja, copy.main_text, copy.sub_text
            )
        );

        let path = output.path().join("pop_image_default.jpg");
        let image = synthesizer.synthesize(&prompt, &path).await.expect("image");
        assert!(image.width <= 300 && image.height <= 300);
        let bytes = std::fs::read(&path).expect("read output");
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
        let (width, height) = ::image::image_dimensions(&path).expect("dimensions");
        assert!(width <= 300 && height <= 300);
        assert_eq!(stub.image_requests()[0]["prompt"], prompt.as_str());
    }

    #[tokio::test]
    async fn untemplated_image_has_no_template_label() {
        let harness = setup().await;
        let response = harness
            .app
            .oneshot(form_request("/synthesize", &FILLED_FORM))
            .await
            .unwrap();
        let body = read_body(response).await;
        assert!(body.contains("/images/pop_image_default.jpg"));
        assert!(!body.contains("Template:"));
    }

    #[tokio::test]
    async fn extra_templates_are_reported() {
        let stub = StubAzure::start().await;
        let output = tempfile::tempdir().expect("tempdir");
        let catalog = Catalog::from_json(
            "inline",
            r##"[
                {"name": "Summer", "color": ["#FFD93D"]},
                {"name": "Sakura", "color": ["#FFB7C5"]},
                {"name": "Autumn", "color": ["#D35400"]},
                {"name": "Winter", "color": ["#DDEEFF"]}
            ]"##,
        )
        .expect("catalog");
        let state = AppState::new(
            AzureClient::new(stub_config(&stub)).expect("client"),
            GenerationOptions::default(),
            SynthesisOptions::default(),
            PromptOptions::default(),
            catalog,
            output.path().to_path_buf(),
        );
        let app = create_router(&state).with_state(state);

        let mut pairs = FILLED_FORM.to_vec();
        for name in ["Summer", "Sakura", "Autumn", "Winter"] {
            pairs.push(("template", name));
        }
        let response = app
            .oneshot(form_request("/synthesize", &pairs))
            .await
            .unwrap();
        let body = read_body(response).await;
        assert!(body.contains("テンプレートは最大3つまで選択できます"));
        assert!(body.contains("Winter は使用されません"));
        assert_eq!(stub.image_requests().len(), 3);
        assert!(!output.path().join("pop_image_Winter.jpg").exists());
    }

    #[tokio::test]
    async fn synthesize_needs_main_text() {
        let harness = setup().await;
        let request = form_request("/synthesize", &[("captions_ja", "夏のビーチ")]);
        let response = harness.app.oneshot(request).await.unwrap();
        let body = read_body(response).await;
        assert!(body.contains("メインテキストと画像の説明を入力してください"));
        assert!(harness.stub.image_requests().is_empty());
    }

    #[tokio::test]
    async fn synthesize_failure_is_shown_per_image() {
        let harness = setup().await;
        harness.stub.fail_with(500);
        let response = harness
            .app
            .oneshot(form_request("/synthesize", &FILLED_FORM))
            .await
            .unwrap();
        let body = read_body(response).await;
        assert!(body.contains("画像生成に失敗しました"));
        assert!(!harness.output.path().join("pop_image_default.jpg").exists());
    }

    #[tokio::test]
    async fn api_generate_inputs_returns_wire_keys() {
        let harness = setup().await;
        let response = harness
            .app
            .clone()
            .oneshot(json_request(
                "/api/generateInputs",
                json!({"objectives": "夏のセール告知"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&read_body(response).await).expect("json");
        assert_eq!(body["copy_text_main"], "夏のビッグセール");
        assert!(body["captions_en"].is_string());

        let response = harness
            .app
            .oneshot(json_request("/api/generateInputs", json!({"objectives": ""})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_generate_and_edit_image() {
        let harness = setup().await;
        let response = harness
            .app
            .clone()
            .oneshot(json_request(
                "/api/generateImage",
                json!({"prompt": "夏のビーチ", "template": "Summer"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&read_body(response).await).expect("json");
        assert_eq!(body["url"], "/images/pop_image_Summer.jpg");

        let response = harness
            .app
            .clone()
            .oneshot(json_request(
                "/api/editImage",
                json!({"prompt": "背景を青に", "filePath": "images/pop_image_Summer.jpg"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&read_body(response).await).expect("json");
        assert_eq!(body["url"], "/images/pop_image_Summer_edited.jpg");
        assert!(
            harness
                .output
                .path()
                .join("pop_image_Summer_edited.jpg")
                .exists()
        );

        let response = harness
            .app
            .oneshot(json_request(
                "/api/editImage",
                json!({"prompt": "x", "filePath": "../Cargo.toml"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_errors_are_json() {
        let harness = setup().await;
        harness.stub.fail_with(503);
        let response = harness
            .app
            .oneshot(json_request("/api/generateImage", json!({"prompt": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&read_body(response).await).expect("json");
        assert!(body["error"].as_str().unwrap_or_default().contains("503"));
    }

    #[tokio::test]
    async fn template_json_lists_catalog() {
        let harness = setup().await;
        let request = Request::builder()
            .uri("/template.json")
            .body(Body::empty())
            .unwrap();
        let response = harness.app.oneshot(request).await.unwrap();
        let body: Value = serde_json::from_str(&read_body(response).await).expect("json");
        assert_eq!(body[0], json!({"name": "Summer", "color": ["#FFD93D", "#4D96FF"]}));
        assert_eq!(body[2]["name"], "winter");
    }
}
