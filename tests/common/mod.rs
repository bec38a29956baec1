//! Scripted collaborators and a harness wiring them into an `Orchestrator`.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use detail_page_studio::blob::{BlobError, BlobStore, MemoryBlobStore};
use detail_page_studio::config::PipelineSettings;
use detail_page_studio::cooldown::MemoryCooldown;
use detail_page_studio::document::DetailPage;
use detail_page_studio::llm::{parse_document, CopyDraft, CopyGenerator, CopyRequest, LlmError};
use detail_page_studio::models::{GenerateRequest, PhotoUpload};
use detail_page_studio::pipeline::{Collaborators, GenerationInput, Orchestrator};
use detail_page_studio::quota::{HeaderAuth, QuotaGate};
use detail_page_studio::render::{RenderError, RenderOutput, RenderRequest, RenderedSlide, Renderer};
use detail_page_studio::routes::AppState;
use detail_page_studio::store::MemoryRecordStore;

pub const SLIDES: [&str; 5] = ["hero", "problem-benefits", "details", "reasons-specs", "cta"];

pub fn valid_document() -> DetailPage {
    serde_json::from_str(include_str!("../fixtures/tumbler.json")).unwrap()
}

pub fn valid_value() -> serde_json::Value {
    serde_json::from_str(include_str!("../fixtures/tumbler.json")).unwrap()
}

/// Runs raw model output through the same parser the real client uses.
pub fn model_output(value: serde_json::Value) -> Result<DetailPage, LlmError> {
    parse_document(&format!("```json\n{value}\n```"))
}

/// Fails the `cta.headline` length rule on every attempt.
pub fn overlong_document() -> DetailPage {
    let mut doc = valid_document();
    doc.cta.as_mut().unwrap().headline = "가".repeat(31);
    doc
}

pub fn request(title: &str) -> GenerateRequest {
    GenerateRequest {
        product_title: Some(title.into()),
        platform: Some("coupang".into()),
        ..Default::default()
    }
}

pub fn input(title: &str) -> GenerationInput {
    GenerationInput { owner_id: None, request: request(title), photos: vec![] }
}

/// A 2x2 PNG, enough for format sniffing.
pub fn png() -> Bytes {
    let mut out = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(2, 2).write_to(&mut out, image::ImageFormat::Png).unwrap();
    Bytes::from(out.into_inner())
}

pub fn photo() -> PhotoUpload {
    PhotoUpload { file_name: Some("photo.png".into()), content_type: Some("image/png".into()), bytes: png() }
}

/// Replays scripted drafts in order, repeating the last one.
pub struct ScriptedCopy {
    drafts: Mutex<Vec<Result<DetailPage, LlmError>>>,
    calls: AtomicUsize,
    configured: bool,
}

impl ScriptedCopy {
    pub fn new(drafts: Vec<Result<DetailPage, LlmError>>) -> Self {
        Self { drafts: Mutex::new(drafts), calls: AtomicUsize::new(0), configured: true }
    }

    pub fn valid() -> Self {
        Self::new(vec![Ok(valid_document())])
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::valid() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CopyGenerator for ScriptedCopy {
    fn ensure_configured(&self) -> Result<(), LlmError> {
        if self.configured { Ok(()) } else { Err(LlmError::MissingConfig("ANTHROPIC_API_KEY")) }
    }

    async fn generate_copy(&self, _request: &CopyRequest) -> Result<CopyDraft, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut drafts = self.drafts.lock();
        let next = if drafts.len() > 1 { drafts.remove(0) } else { drafts[0].clone() };
        next.map(|document| CopyDraft { document, elapsed_ms: 5 })
    }
}

#[derive(Debug, Clone)]
pub enum RenderMode {
    Slides,
    Empty,
    Fail(RenderError),
}

/// Renders every requested slide as distinct bytes per call.
pub struct FakeRenderer {
    mode: Mutex<RenderMode>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self { mode: Mutex::new(mode), calls: AtomicUsize::new(0), requests: Mutex::new(vec![]) }
    }

    pub fn set_mode(&self, mode: RenderMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RenderRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let ids: Vec<String> = if request.slide_ids.is_empty() {
            SLIDES.iter().map(|s| s.to_string()).collect()
        } else {
            request.slide_ids.clone()
        };
        match self.mode.lock().clone() {
            RenderMode::Slides => Ok(RenderOutput {
                slides: ids
                    .into_iter()
                    .map(|slide_id| RenderedSlide {
                        bytes: Bytes::from(format!("{slide_id}-render-{call}")),
                        slide_id,
                        width: 860,
                        height: 1200,
                    })
                    .collect(),
                elapsed_ms: 40,
            }),
            RenderMode::Empty => Err(RenderError::Empty),
            RenderMode::Fail(e) => Err(e),
        }
    }
}

/// Memory blob store that rejects paths containing any configured needle.
#[derive(Default)]
pub struct FlakyBlobs {
    pub inner: MemoryBlobStore,
    needles: Mutex<Vec<String>>,
}

impl FlakyBlobs {
    pub fn fail_on(&self, needle: &str) {
        self.needles.lock().push(needle.to_string());
    }
}

#[async_trait]
impl BlobStore for FlakyBlobs {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        if self.needles.lock().iter().any(|n| path.contains(n.as_str())) {
            return Err(BlobError::Upload { path: path.into(), reason: "HTTP 503: unavailable".into() });
        }
        self.inner.put(path, bytes, content_type).await
    }

    fn public_url(&self, path: &str) -> Result<String, BlobError> {
        self.inner.public_url(path)
    }
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub copy: Arc<ScriptedCopy>,
    pub renderer: Arc<FakeRenderer>,
    pub blobs: Arc<FlakyBlobs>,
    pub store: Arc<MemoryRecordStore>,
}

impl Harness {
    pub fn new(copy: ScriptedCopy) -> Self {
        Self::build(copy, None, PipelineSettings::default())
    }

    pub fn build(copy: ScriptedCopy, quota: Option<Arc<dyn QuotaGate>>, settings: PipelineSettings) -> Self {
        let copy = Arc::new(copy);
        let renderer = Arc::new(FakeRenderer::new(RenderMode::Slides));
        let blobs = Arc::new(FlakyBlobs::default());
        let store = Arc::new(MemoryRecordStore::new());
        let deps = Collaborators {
            copy: copy.clone(),
            renderer: renderer.clone(),
            blob: blobs.clone(),
            store: store.clone(),
            cooldown: Arc::new(MemoryCooldown::for_window(settings.edit_cooldown)),
            quota,
        };
        Self { orchestrator: Arc::new(Orchestrator::new(deps, settings)), copy, renderer, blobs, store }
    }

    pub fn state(&self) -> AppState {
        AppState { orchestrator: self.orchestrator.clone(), auth: Arc::new(HeaderAuth) }
    }
}
