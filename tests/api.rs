mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{png, Harness, ScriptedCopy};
use detail_page_studio::config::{PipelineSettings, QuotaConfig};
use detail_page_studio::quota::{MemoryQuota, QuotaGate};
use detail_page_studio::store::RecordStore;

const BOUNDARY: &str = "detail-page-boundary";

fn router(harness: &Harness) -> Router {
    detail_page_studio::app(harness.state())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

fn post_multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn generate(app: &Router) -> Uuid {
    let (status, body) = send(app, post_json("/generate", json!({ "product_title": "텀블러", "platform": "coupang" }))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["generation_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn generate_returns_created_summary() {
    let harness = Harness::new(ScriptedCopy::valid());
    let app = router(&harness);

    let (status, body) = send(&app, post_json("/generate", json!({ "product_title": "텀블러", "platform": "coupang" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["edits_remaining"], 3);
    assert!(body["zip_url"].as_str().unwrap().ends_with("/detail-page.zip"));

    let id = body["generation_id"].as_str().unwrap();
    let (status, view) = send(&app, get(&format!("/generations/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["generation"]["status"], "complete");
    assert_eq!(view["assets"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn missing_title_is_400_without_a_row() {
    let harness = Harness::new(ScriptedCopy::valid());
    let (status, body) = send(&router(&harness), post_json("/generate", json!({ "platform": "coupang" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "product_title is required");
    assert_eq!(harness.store.generation_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let harness = Harness::new(ScriptedCopy::valid());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/edit-cut")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&router(&harness), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn validation_exhaustion_is_422() {
    let harness = Harness::new(ScriptedCopy::new(vec![Ok(common::overlong_document())]));
    let (status, body) = send(&router(&harness), post_json("/generate", json!({ "product_title": "텀블러", "platform": "naver" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "validation_failed");
    assert_eq!(body["attempts"], 1);
    assert_eq!(body["errors"], json!(["length exceeded: cta.headline (31>30)"]));
    assert!(body["generation_id"].is_string());
}

#[tokio::test]
async fn multipart_generate_uploads_photos() {
    let harness = Harness::new(ScriptedCopy::valid());
    let app = router(&harness);
    let request = post_multipart(
        "/generate",
        &[
            Part::Text("product_title", "텀블러"),
            Part::Text("platform", "shopify"),
            Part::Text("must_include", "식기세척기 사용 가능"),
            Part::File("images", "front.png", png().to_vec()),
        ],
    );

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id: Uuid = body["generation_id"].as_str().unwrap().parse().unwrap();

    let generation = harness.store.get_generation(id).await.unwrap().unwrap();
    assert_eq!(generation.seller_input.image_urls.len(), 1);
    assert_eq!(generation.seller_input.must_include, vec!["식기세척기 사용 가능".to_string()]);
}

#[tokio::test]
async fn unknown_generation_is_404() {
    let harness = Harness::new(ScriptedCopy::valid());
    let (status, _) = send(&router(&harness), get(&format!("/generations/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn second_edit_within_cooldown_is_429() {
    let harness = Harness::new(ScriptedCopy::valid());
    let app = router(&harness);
    let id = generate(&app).await;

    let edit = json!({ "generation_id": id, "slide_id": "hero", "edited_text": "퇴근길까지 따뜻한 커피", "tweak": "shorter" });
    let (status, body) = send(&app, post_json("/edit-cut", edit.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["edits_remaining"], 2);
    assert!(body["image_url"].as_str().unwrap().contains(&format!("{id}/hero-")));

    let (status, body) = send(&app, post_json("/edit-cut", edit)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let wait = body["retry_after_secs"].as_u64().unwrap();
    assert!((1..=10).contains(&wait));
    assert!(body["error"].as_str().unwrap().contains(&wait.to_string()));
}

#[tokio::test]
async fn edit_without_a_change_is_400() {
    let harness = Harness::new(ScriptedCopy::valid());
    let edit = json!({ "generation_id": Uuid::new_v4(), "slide_id": "hero" });
    let (status, _) = send(&router(&harness), post_json("/edit-cut", edit)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replace_image_swaps_the_slide() {
    let harness = Harness::new(ScriptedCopy::valid());
    let app = router(&harness);
    let id = generate(&app).await;
    let id_text = id.to_string();

    let request = post_multipart(
        "/replace-image",
        &[
            Part::Text("generation_id", &id_text),
            Part::Text("slide_id", "details"),
            Part::File("image", "new.png", png().to_vec()),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["slide_id"], "details");

    let generation = harness.store.get_generation(id).await.unwrap().unwrap();
    assert_eq!(generation.seller_input.image_urls.len(), 3);
    assert_eq!(generation.seller_input.image_urls[0], "");
}

#[tokio::test]
async fn replace_image_requires_all_fields() {
    let harness = Harness::new(ScriptedCopy::valid());
    let request = post_multipart("/replace-image", &[Part::Text("slide_id", "hero")]);
    let (status, body) = send(&router(&harness), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "generation_id, slide_id, image are required");
}

#[tokio::test]
async fn feedback_for_unknown_generation_is_404() {
    let harness = Harness::new(ScriptedCopy::valid());
    let app = router(&harness);

    let (status, _) = send(&app, post_json("/feedback", json!({ "generation_id": Uuid::new_v4(), "score": 4 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = generate(&app).await;
    let (status, body) = send(&app, post_json("/feedback", json!({ "generation_id": id, "weak_cuts": ["cta"] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_submitted"], true);
}

#[tokio::test]
async fn whitelist_gate_answers_403_and_404() {
    let member = Uuid::new_v4();
    let quota = Arc::new(MemoryQuota::from_config(&QuotaConfig { whitelist: [member].into(), starting_credits: 0 }));
    let ghost = Uuid::new_v4();
    let partial = Arc::new(MemoryQuota::new([ghost]));

    let harness = Harness::build(ScriptedCopy::valid(), Some(quota as Arc<dyn QuotaGate>), PipelineSettings::default());
    let app = router(&harness);
    let body = json!({ "product_title": "텀블러", "platform": "coupang" });

    let (status, json) = send(&app, post_json("/generate", body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "not_whitelisted");

    let mut request = post_json("/generate", body.clone());
    request.headers_mut().insert("x-user-id", member.to_string().parse().unwrap());
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "no_credits");

    let harness = Harness::build(ScriptedCopy::valid(), Some(partial as Arc<dyn QuotaGate>), PipelineSettings::default());
    let mut request = post_json("/generate", body);
    request.headers_mut().insert("x-user-id", ghost.to_string().parse().unwrap());
    let (status, json) = send(&router(&harness), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "user_not_found");
    assert_eq!(harness.store.generation_count(), 0);
}
