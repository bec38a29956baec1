use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::config::RenderConfig;
use crate::document::DetailPage;
use crate::llm::{truncate, MAX_ERROR_CHARS};
use crate::models::{Platform, Tweak};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("render transport error: {0}")]
    Transport(String),
    #[error("render failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("render response is not valid JSON: {0}")]
    Parse(String),
    #[error("render returned no slides")]
    Empty,
    #[error("render returned an undecodable image for {slide_id}: {reason}")]
    Decode { slide_id: String, reason: String },
    #[error("render response has no slide {0}")]
    SlideMissing(String),
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub document: DetailPage,
    pub platform: Platform,
    pub image_urls: Vec<String>,
    pub design_style: String,
    /// Empty means every slide.
    pub slide_ids: Vec<String>,
    pub tone_hint: Option<Tweak>,
}

#[derive(Debug, Clone)]
pub struct RenderedSlide {
    pub slide_id: String,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub slides: Vec<RenderedSlide>,
    pub elapsed_ms: u64,
}

impl RenderOutput {
    pub fn take_slide(self, slide_id: &str) -> Result<RenderedSlide, RenderError> {
        self.slides
            .into_iter()
            .find(|s| s.slide_id == slide_id)
            .ok_or_else(|| RenderError::SlideMissing(slide_id.to_string()))
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    fn ensure_configured(&self) -> Result<(), RenderError> {
        Ok(())
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError>;
}

pub struct HttpRenderClient {
    http: Client,
    endpoint: Option<String>,
}

impl HttpRenderClient {
    pub fn new(config: &RenderConfig) -> Result<Self, RenderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RenderError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint: config.endpoint.clone() })
    }

    fn endpoint(&self) -> Result<&str, RenderError> {
        self.endpoint.as_deref().ok_or(RenderError::MissingConfig("RENDER_SERVER_URL"))
    }
}

#[async_trait]
impl Renderer for HttpRenderClient {
    fn ensure_configured(&self) -> Result<(), RenderError> {
        self.endpoint().map(|_| ())
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let endpoint = self.endpoint()?;
        let body = WireRequest {
            json: &request.document,
            platform: request.platform,
            image_urls: &request.image_urls,
            design_style: &request.design_style,
            slide_ids: &request.slide_ids,
            tone_hint: request.tone_hint.map(|t| t.as_str()),
        };

        info!("🎨 Rendering {} slide(s) on {}", if request.slide_ids.is_empty() { "all".to_string() } else { request.slide_ids.join(",") }, request.platform);
        let started = Instant::now();

        let response = self.http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RenderError::Transport(truncate(&e.to_string(), MAX_ERROR_CHARS)))?;

        let status = response.status();
        let response_text = response.text().await
            .map_err(|e| RenderError::Transport(truncate(&e.to_string(), MAX_ERROR_CHARS)))?;
        let measured_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = truncate(&response_text, MAX_ERROR_CHARS);
            error!("❌ Render server error {}: {}", status, body);
            return Err(RenderError::Http { status: status.as_u16(), body });
        }

        let parsed: WireResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("❌ Unparsable render response: {}", truncate(&response_text, MAX_ERROR_CHARS));
            RenderError::Parse(e.to_string())
        })?;

        if parsed.slides.is_empty() {
            return Err(RenderError::Empty);
        }

        let slides = parsed.slides
            .into_iter()
            .map(|s| {
                let bytes = decode_base64(&s.base64).map_err(|e| RenderError::Decode {
                    slide_id: s.slide_id.clone(),
                    reason: e.to_string(),
                })?;
                Ok(RenderedSlide { slide_id: s.slide_id, bytes: Bytes::from(bytes), width: s.width, height: s.height })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        let elapsed_ms = parsed.render_time_ms.unwrap_or(measured_ms);
        info!("✅ Render returned {} slide(s) in {}ms", slides.len(), elapsed_ms);
        Ok(RenderOutput { slides, elapsed_ms })
    }
}

/// Decode a base64 payload, accepting an optional `data:...;base64,` prefix.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let cleaned = match payload.split_once("base64,") {
        Some((_, data)) => data,
        None => payload,
    };
    base64::engine::general_purpose::STANDARD.decode(cleaned.trim())
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    json: &'a DetailPage,
    platform: Platform,
    image_urls: &'a [String],
    design_style: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    slide_ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    tone_hint: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    slides: Vec<WireSlide>,
    #[serde(default)]
    render_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireSlide {
    slide_id: String,
    base64: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}
