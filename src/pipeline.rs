//! Generation orchestration.
//!
//! The main pipeline is strictly sequential: every step starts only after the
//! previous step's write is durable, and every fatal failure is written to the
//! generation row in one place before the caller sees it. Edits and image
//! replacements run on completed generations, serialised per generation and
//! spaced by the cooldown limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assets::{persist_slides, replace_slide, sniff_photo, upload_replacement_photo, upload_seller_photos, FailurePolicy};
use crate::blob::{BlobError, BlobStore};
use crate::bundle::store_bundle;
use crate::config::PipelineSettings;
use crate::cooldown::{CooldownDecision, CooldownLimiter};
use crate::document::{DetailPage, DocumentError, TextField};
use crate::llm::{truncate, CopyGenerator, LlmError, MAX_ERROR_CHARS};
use crate::models::{
    Feedback, GenerateRequest, Generation, GenerationAsset, GenerationOutcome, GenerationPatch, GenerationStatus,
    GenerationView, NewGeneration, PhotoUpload, Platform, SellerInput, SlideUpdate, TextEdit, Tweak,
};
use crate::quota::{QuotaError, QuotaGate};
use crate::render::{RenderError, RenderRequest, RenderedSlide, Renderer};
use crate::retry::generate_validated_copy;
use crate::store::{RecordStore, StoreError};
use crate::validation::{CategoryKey, ValidationReport};

/// Fallback bucket for sellers that leave the category empty.
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("no edits remaining for generation {0}")]
    NoEditsRemaining(Uuid),
    #[error("edit cooldown active, retry in {}s", .0.remaining_secs())]
    CoolingDown(CooldownDecision),
    #[error("validation failed after {attempts} attempt(s)")]
    ValidationFailed { generation_id: Uuid, report: ValidationReport, attempts: u32 },
    #[error("{message}")]
    Failed { generation_id: Option<Uuid>, message: String },
}

impl PipelineError {
    fn failed(generation_id: Uuid, message: impl Into<String>) -> Self {
        PipelineError::Failed { generation_id: Some(generation_id), message: message.into() }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => PipelineError::NotFound { entity, id },
            other => PipelineError::Failed { generation_id: None, message: other.to_string() },
        }
    }
}

/// Where a fatal pipeline failure leaves the generation.
enum Halt {
    Invalid { report: ValidationReport, attempts: u32, llm_time_ms: u64 },
    Fatal { message: String, render_time_ms: Option<u64> },
}

impl Halt {
    fn fatal(message: impl Into<String>) -> Self {
        Halt::Fatal { message: message.into(), render_time_ms: None }
    }

    fn store(e: StoreError) -> Self {
        Halt::fatal(format!("record store error: {e}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    pub owner_id: Option<Uuid>,
    pub request: GenerateRequest,
    pub photos: Vec<PhotoUpload>,
}

/// What an edit does to the stored document before the slide is re-rendered.
#[derive(Debug, Clone)]
pub enum DocumentChange {
    Replace(Box<DetailPage>),
    Edits(Vec<TextEdit>),
    /// New text for the slide's primary text field.
    PrimaryText(String),
    /// Re-render as is, typically with a tone hint.
    Unchanged,
}

impl DocumentChange {
    pub fn apply(self, document: &mut DetailPage, slide_id: &str) -> Result<(), PipelineError> {
        match self {
            DocumentChange::Replace(updated) => *document = *updated,
            DocumentChange::Edits(edits) => {
                for edit in edits {
                    TextField::parse(&edit.path)?.set(document, edit.value)?;
                }
            }
            DocumentChange::PrimaryText(text) => {
                let field = TextField::primary_for_slide(slide_id).ok_or_else(|| {
                    PipelineError::InvalidInput(format!("slide {slide_id} has no editable primary text"))
                })?;
                field.set(document, text)?;
            }
            DocumentChange::Unchanged => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SlideEdit {
    pub generation_id: Uuid,
    pub slide_id: String,
    pub change: DocumentChange,
    pub tweak: Option<Tweak>,
}

#[derive(Debug, Clone)]
pub struct ImageReplacement {
    pub generation_id: Uuid,
    pub slide_id: String,
    pub photo: PhotoUpload,
}

/// Index in the seller photo list that a slide takes its reference image from.
pub fn photo_slot(slide_id: &str) -> Option<usize> {
    match slide_id {
        "hero" => Some(0),
        "problem-benefits" => Some(1),
        "details" => Some(2),
        "reasons-specs" => Some(3),
        _ => None,
    }
}

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub copy: Arc<dyn CopyGenerator>,
    pub renderer: Arc<dyn Renderer>,
    pub blob: Arc<dyn BlobStore>,
    pub store: Arc<dyn RecordStore>,
    pub cooldown: Arc<dyn CooldownLimiter>,
    /// `None` leaves generation open to anyone, including anonymous callers.
    pub quota: Option<Arc<dyn QuotaGate>>,
}

/// One async lock per generation with edits in flight.
#[derive(Default)]
struct EditLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl EditLocks {
    async fn acquire(&self, generation_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(generation_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct Orchestrator {
    deps: Collaborators,
    settings: PipelineSettings,
    edit_locks: EditLocks,
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn llm_config(e: LlmError) -> PipelineError {
    match e {
        LlmError::MissingConfig(name) => PipelineError::MissingConfig(name),
        other => PipelineError::Failed { generation_id: None, message: other.to_string() },
    }
}

fn render_config(e: RenderError) -> PipelineError {
    match e {
        RenderError::MissingConfig(name) => PipelineError::MissingConfig(name),
        other => PipelineError::Failed { generation_id: None, message: other.to_string() },
    }
}

fn blob_config(e: BlobError) -> PipelineError {
    match e {
        BlobError::MissingConfig(name) => PipelineError::MissingConfig(name),
        other => PipelineError::Failed { generation_id: None, message: other.to_string() },
    }
}

impl Orchestrator {
    pub fn new(deps: Collaborators, settings: PipelineSettings) -> Self {
        Self { deps, settings, edit_locks: EditLocks::default() }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn seller_input(&self, request: GenerateRequest) -> Result<SellerInput, PipelineError> {
        let product_title = request
            .product_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::InvalidInput("product_title is required".into()))?;
        let platform: Platform = request
            .platform
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PipelineError::InvalidInput("platform is required".into()))?
            .parse()
            .map_err(PipelineError::InvalidInput)?;

        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(SellerInput {
            product_title,
            platform,
            category: non_empty(request.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            additional_info: non_empty(request.additional_info),
            image_urls: Vec::new(),
            design_style: non_empty(request.design_style)
                .unwrap_or_else(|| self.settings.default_design_style.clone()),
            must_include: request.must_include,
            must_avoid: request.must_avoid,
        })
    }

    fn ensure_generation_configured(&self) -> Result<(), PipelineError> {
        self.deps.copy.ensure_configured().map_err(llm_config)?;
        self.ensure_edit_configured()
    }

    fn ensure_edit_configured(&self) -> Result<(), PipelineError> {
        self.deps.renderer.ensure_configured().map_err(render_config)?;
        self.deps.blob.ensure_configured().map_err(blob_config)
    }

    /// Run the whole pipeline for one request. Input, quota and configuration
    /// problems are reported before a generation row exists; anything later
    /// is recorded on the row and carries its id.
    pub async fn start_generation(&self, input: GenerationInput) -> Result<GenerationOutcome, PipelineError> {
        let started = Instant::now();
        let seller = self.seller_input(input.request)?;
        if let Some(quota) = &self.deps.quota {
            quota.authorize(input.owner_id).await?;
        }
        self.ensure_generation_configured()?;

        let generation = self
            .deps
            .store
            .insert_generation(NewGeneration { owner_id: input.owner_id, seller_input: seller.clone() }, 0)
            .await
            .map_err(|e| PipelineError::Failed {
                generation_id: None,
                message: format!("could not create generation: {e}"),
            })?;
        let id = generation.id;
        info!("🚀 Generation {} started: \"{}\" on {}", id, seller.product_title, seller.platform);

        match self.drive(id, seller, &input.photos, input.owner_id, started).await {
            Ok(outcome) => Ok(outcome),
            Err(halt) => Err(self.record_failure(id, halt).await),
        }
    }

    async fn drive(
        &self,
        id: Uuid,
        mut seller: SellerInput,
        photos: &[PhotoUpload],
        owner_id: Option<Uuid>,
        started: Instant,
    ) -> Result<GenerationOutcome, Halt> {
        let store = &*self.deps.store;
        let blob = &*self.deps.blob;

        if !photos.is_empty() {
            seller.image_urls = upload_seller_photos(blob, id, photos).await;
            store
                .update_generation(id, GenerationPatch { seller_input: Some(seller.clone()), ..Default::default() })
                .await
                .map_err(Halt::store)?;
        }

        let category =
            CategoryKey::infer(Some(&seller.category), &seller.product_title, seller.additional_info.as_deref());
        let copy = generate_validated_copy(&*self.deps.copy, &seller, category, category.max_attempts())
            .await
            .map_err(|e| Halt::fatal(format!("copy generation failed: {e}")))?;
        if !copy.report.valid {
            return Err(Halt::Invalid { report: copy.report, attempts: copy.attempts, llm_time_ms: copy.llm_time_ms });
        }

        store
            .update_generation(
                id,
                GenerationPatch {
                    status: Some(GenerationStatus::Rendering),
                    generated_json: Some(copy.document.clone()),
                    llm_time_ms: Some(copy.llm_time_ms),
                    ..Default::default()
                },
            )
            .await
            .map_err(Halt::store)?;
        info!("📝 Generation {} copy accepted ({} attempt(s), {} category), rendering", id, copy.attempts, category);

        let render_started = Instant::now();
        let request = RenderRequest {
            document: copy.document,
            platform: seller.platform,
            image_urls: seller.image_urls.clone(),
            design_style: seller.design_style.clone(),
            slide_ids: Vec::new(),
            tone_hint: None,
        };
        let output = self.deps.renderer.render(&request).await.map_err(|e| Halt::Fatal {
            message: format!("render failed: {e}"),
            render_time_ms: Some(elapsed_ms(render_started)),
        })?;
        let render_time_ms = output.elapsed_ms;

        let assets = persist_slides(blob, store, id, &output.slides).await.map_err(|e| Halt::Fatal {
            message: format!("asset persistence failed: {e}"),
            render_time_ms: Some(render_time_ms),
        })?;

        let zip_url = if self.settings.bundle_zip {
            FailurePolicy::Tolerated.apply("zip bundle", store_bundle(blob, id, &output.slides).await).ok().flatten()
        } else {
            None
        };

        let completed = store
            .update_generation(
                id,
                GenerationPatch {
                    status: Some(GenerationStatus::Complete),
                    render_time_ms: Some(render_time_ms),
                    edits_remaining: Some(self.settings.edit_grant),
                    zip_url: zip_url.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(Halt::store)?;

        if let (Some(quota), Some(owner)) = (&self.deps.quota, owner_id) {
            let left = FailurePolicy::Tolerated.apply("credit decrement", quota.consume_credit(owner).await);
            if let Ok(Some(left)) = left {
                info!("💳 {} credit(s) left for {}", left, owner);
            }
        }

        let total_time_ms = elapsed_ms(started);
        info!("✅ Generation {} complete: {} slide(s) in {}ms", id, assets.len(), total_time_ms);
        Ok(GenerationOutcome {
            generation_id: id,
            status: completed.status,
            total_time_ms,
            attempts: copy.attempts,
            edits_remaining: completed.edits_remaining,
            zip_pending: self.settings.bundle_zip && zip_url.is_none(),
            zip_url,
            warnings: copy.report.warnings,
        })
    }

    async fn record_failure(&self, id: Uuid, halt: Halt) -> PipelineError {
        let (patch, err) = match halt {
            Halt::Invalid { report, attempts, llm_time_ms } => {
                let message = truncate(
                    &format!("validation failed after {attempts} attempt(s): {}", report.errors.join("; ")),
                    MAX_ERROR_CHARS,
                );
                let patch = GenerationPatch { llm_time_ms: Some(llm_time_ms), ..GenerationPatch::failed(message) };
                (patch, PipelineError::ValidationFailed { generation_id: id, report, attempts })
            }
            Halt::Fatal { message, render_time_ms } => {
                let message = truncate(&message, MAX_ERROR_CHARS);
                let patch = GenerationPatch { render_time_ms, ..GenerationPatch::failed(message.clone()) };
                (patch, PipelineError::failed(id, message))
            }
        };

        error!("❌ Generation {} failed: {}", id, patch.error_message.as_deref().unwrap_or_default());
        if let Err(e) = self.deps.store.update_generation(id, patch).await {
            error!("❌ Could not record failure of generation {}: {}", id, e);
        }
        err
    }

    pub async fn get_generation(&self, id: Uuid) -> Result<GenerationView, PipelineError> {
        let generation = self
            .deps
            .store
            .get_generation(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound { entity: "generation", id: id.to_string() })?;
        let assets = self.deps.store.list_assets(id).await?;
        Ok(GenerationView { generation, assets })
    }

    /// Cooldown first, then the rows. Must run under the generation's edit lock.
    async fn edit_target(&self, id: Uuid, slide_id: &str) -> Result<(Generation, GenerationAsset), PipelineError> {
        let decision = self.deps.cooldown.check(&id.to_string(), self.settings.edit_cooldown);
        if !decision.allowed {
            warn!("⏳ Edit on {} rejected, cooling down for {}s", id, decision.remaining_secs());
            return Err(PipelineError::CoolingDown(decision));
        }

        let generation = self
            .deps
            .store
            .get_generation(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound { entity: "generation", id: id.to_string() })?;
        let asset = self
            .deps
            .store
            .find_asset(id, slide_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound { entity: "slide", id: format!("{id}/{slide_id}") })?;
        if generation.edits_remaining == 0 {
            return Err(PipelineError::NoEditsRemaining(id));
        }
        Ok((generation, asset))
    }

    async fn render_slide(
        &self,
        generation: &Generation,
        document: &DetailPage,
        slide_id: &str,
        image_urls: Vec<String>,
        tone_hint: Option<Tweak>,
    ) -> Result<RenderedSlide, PipelineError> {
        let request = RenderRequest {
            document: document.clone(),
            platform: generation.seller_input.platform,
            image_urls,
            design_style: generation.seller_input.design_style.clone(),
            slide_ids: vec![slide_id.to_string()],
            tone_hint,
        };
        self.deps
            .renderer
            .render(&request)
            .await
            .and_then(|output| output.take_slide(slide_id))
            .map_err(|e| PipelineError::failed(generation.id, truncate(&format!("render failed: {e}"), MAX_ERROR_CHARS)))
    }

    async fn commit_slide(
        &self,
        generation: &Generation,
        asset: &GenerationAsset,
        slide: RenderedSlide,
        document: DetailPage,
        seller_image_urls: Option<Vec<String>>,
    ) -> Result<SlideUpdate, PipelineError> {
        let updated = replace_slide(&*self.deps.blob, &*self.deps.store, asset, slide.bytes, document, seller_image_urls)
            .await
            .map_err(|e| PipelineError::failed(generation.id, format!("could not store edited slide: {e}")))?;
        self.deps.cooldown.record(&generation.id.to_string());

        Ok(SlideUpdate {
            generation_id: generation.id,
            slide_id: updated.slide_id,
            image_url: updated.image_url,
            edits_remaining: generation.edits_remaining.saturating_sub(1),
        })
    }

    /// Re-render one slide from an edited document. A failure leaves the
    /// previous image, document and cooldown untouched.
    pub async fn edit_slide(&self, edit: SlideEdit) -> Result<SlideUpdate, PipelineError> {
        self.ensure_edit_configured()?;
        let _guard = self.edit_locks.acquire(edit.generation_id).await;
        let (generation, asset) = self.edit_target(edit.generation_id, &edit.slide_id).await?;

        let mut document = generation.generated_json.clone().ok_or_else(|| {
            PipelineError::InvalidInput(format!("generation {} has no document to edit", generation.id))
        })?;
        edit.change.apply(&mut document, &edit.slide_id)?;

        info!("✏️ Editing slide {} of {}", edit.slide_id, generation.id);
        let image_urls = generation.seller_input.image_urls.clone();
        let slide = self.render_slide(&generation, &document, &edit.slide_id, image_urls, edit.tweak).await?;
        self.commit_slide(&generation, &asset, slide, document, None).await
    }

    /// Swap the reference photo behind one slide and re-render it.
    pub async fn replace_image(&self, replacement: ImageReplacement) -> Result<SlideUpdate, PipelineError> {
        self.ensure_edit_configured()?;
        if sniff_photo(&replacement.photo.bytes).is_none() {
            return Err(PipelineError::InvalidInput("uploaded file is not a supported image".into()));
        }

        let ImageReplacement { generation_id, slide_id, photo } = replacement;
        let _guard = self.edit_locks.acquire(generation_id).await;
        let (generation, asset) = self.edit_target(generation_id, &slide_id).await?;
        let mut document = generation.generated_json.clone().ok_or_else(|| {
            PipelineError::InvalidInput(format!("generation {generation_id} has no document to edit"))
        })?;

        let photo_url = upload_replacement_photo(&*self.deps.blob, generation_id, &slide_id, &photo)
            .await
            .map_err(|e| PipelineError::failed(generation_id, e.to_string()))?;
        document.replaced_images.insert(slide_id.clone(), photo_url.clone());

        let slot = photo_slot(&slide_id);
        let mut image_urls = generation.seller_input.image_urls.clone();
        if let Some(index) = slot {
            if image_urls.len() <= index {
                image_urls.resize(index + 1, String::new());
            }
            image_urls[index] = photo_url;
        }

        info!("🖼️ Replacing image of slide {} of {}", slide_id, generation_id);
        let slide = self.render_slide(&generation, &document, &slide_id, image_urls.clone(), None).await?;
        self.commit_slide(&generation, &asset, slide, document, slot.map(|_| image_urls)).await
    }

    pub async fn submit_feedback(&self, feedback: Feedback) -> Result<(), PipelineError> {
        if let Some(score) = feedback.score {
            if !(1..=5).contains(&score) {
                return Err(PipelineError::InvalidInput(format!("score must be between 1 and 5, got {score}")));
            }
        }
        let id = feedback.generation_id;
        self.deps.store.record_feedback(feedback).await?;
        info!("🗳️ Feedback recorded for {}", id);
        Ok(())
    }
}
