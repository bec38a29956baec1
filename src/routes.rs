use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    EditCutRequest, Feedback, GenerateRequest, GenerationOutcome, GenerationView, PhotoUpload, SlideUpdate,
};
use crate::pipeline::{DocumentChange, GenerationInput, ImageReplacement, Orchestrator, SlideEdit};
use crate::quota::AuthProvider;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub auth: Arc<dyn AuthProvider>,
}

/// Successful responses carry `ok: true` next to their payload.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: true, body })
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(body)| body).map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

fn is_photo_field(name: &str) -> bool {
    matches!(name, "image" | "images" | "images[]" | "photos" | "photos[]")
}

async fn read_photo(field: axum::extract::multipart::Field<'_>) -> ApiResult<PhotoUpload> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    Ok(PhotoUpload { file_name, content_type, bytes })
}

async fn read_generate_form(mut multipart: Multipart) -> ApiResult<(GenerateRequest, Vec<PhotoUpload>)> {
    let mut request = GenerateRequest::default();
    let mut photos = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if is_photo_field(&name) {
            let photo = read_photo(field).await?;
            if !photo.bytes.is_empty() {
                photos.push(photo);
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "product_title" => request.product_title = Some(value),
            "platform" => request.platform = Some(value),
            "category" => request.category = Some(value),
            "additional_info" => request.additional_info = Some(value),
            "design_style" => request.design_style = Some(value),
            "must_include" => request.must_include.push(value),
            "must_avoid" => request.must_avoid.push(value),
            other => tracing::debug!("Ignoring form field {}", other),
        }
    }
    Ok((request, photos))
}

/// Accepts either a JSON body or a multipart form with photos.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
) -> ApiResult<(StatusCode, Json<Envelope<GenerationOutcome>>)> {
    let owner_id = state.auth.current_user(&headers)?;

    let (body, photos) = if is_multipart(&headers) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_generate_form(multipart).await?
    } else {
        (json_body(Json::<GenerateRequest>::from_request(request, &state).await)?, Vec::new())
    };

    let outcome = state
        .orchestrator
        .start_generation(GenerationInput { owner_id, request: body, photos })
        .await?;
    Ok((StatusCode::CREATED, ok(outcome)))
}

pub async fn get_generation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<GenerationView>>> {
    Ok(ok(state.orchestrator.get_generation(id).await?))
}

fn slide_edit(request: EditCutRequest) -> ApiResult<SlideEdit> {
    let generation_id = request
        .generation_id
        .ok_or_else(|| ApiError::BadRequest("generation_id is required".into()))?;
    let slide_id = request
        .slide_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("slide_id is required".into()))?;

    let change = if let Some(document) = request.full_json_update {
        DocumentChange::Replace(Box::new(document))
    } else if !request.edits.is_empty() {
        DocumentChange::Edits(request.edits)
    } else if let Some(text) = request.edited_text {
        DocumentChange::PrimaryText(text)
    } else if request.tweak.is_some() {
        DocumentChange::Unchanged
    } else {
        return Err(ApiError::BadRequest(
            "one of full_json_update, edits, edited_text or tweak is required".into(),
        ));
    };

    Ok(SlideEdit { generation_id, slide_id, change, tweak: request.tweak })
}

pub async fn edit_cut(
    State(state): State<AppState>,
    payload: Result<Json<EditCutRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<SlideUpdate>>> {
    let edit = slide_edit(json_body(payload)?)?;
    Ok(ok(state.orchestrator.edit_slide(edit).await?))
}

pub async fn replace_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Envelope<SlideUpdate>>> {
    let mut generation_id = None;
    let mut slide_id = None;
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "generation_id" => {
                let raw = field.text().await?;
                let id = raw
                    .trim()
                    .parse::<Uuid>()
                    .map_err(|_| ApiError::BadRequest(format!("invalid generation_id: {raw}")))?;
                generation_id = Some(id);
            }
            "slide_id" => slide_id = Some(field.text().await?.trim().to_string()).filter(|s| !s.is_empty()),
            other if is_photo_field(other) => photo = Some(read_photo(field).await?),
            _ => {}
        }
    }

    let (Some(generation_id), Some(slide_id), Some(photo)) = (generation_id, slide_id, photo) else {
        return Err(ApiError::BadRequest("generation_id, slide_id, image are required".into()));
    };
    let update = state
        .orchestrator
        .replace_image(ImageReplacement { generation_id, slide_id, photo })
        .await?;
    Ok(ok(update))
}

#[derive(Debug, Serialize)]
pub struct FeedbackReceipt {
    generation_id: Uuid,
    feedback_submitted: bool,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Feedback>, JsonRejection>,
) -> ApiResult<Json<Envelope<FeedbackReceipt>>> {
    let mut feedback = json_body(payload)?;
    if feedback.user_id.is_none() {
        feedback.user_id = state.auth.current_user(&headers)?;
    }
    let generation_id = feedback.generation_id;
    state.orchestrator.submit_feedback(feedback).await?;
    Ok(ok(FeedbackReceipt { generation_id, feedback_submitted: true }))
}
