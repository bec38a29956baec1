pub mod assets;
pub mod blob;
pub mod bundle;
pub mod config;
pub mod cooldown;
pub mod document;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod quota;
pub mod render;
pub mod retry;
pub mod routes;
pub mod store;
pub mod validation;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{edit_cut, generate, get_generation, replace_image, submit_feedback, AppState};

/// Seller photos arrive in one multipart request.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/generations/:id", get(get_generation))
        .route("/edit-cut", post(edit_cut))
        .route("/replace-image", post(replace_image))
        .route("/feedback", post(submit_feedback))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
