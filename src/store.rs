use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Feedback, Generation, GenerationAsset, GenerationPatch, GenerationStatus, NewAsset, NewGeneration,
    SlideReplacement,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: GenerationStatus, to: GenerationStatus },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Typed row access for generations, their slide assets and feedback.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_generation(&self, new: NewGeneration, edits_remaining: u32) -> Result<Generation, StoreError>;

    async fn get_generation(&self, id: Uuid) -> Result<Option<Generation>, StoreError>;

    /// Rejects status changes that would leave a terminal state or skip a step.
    async fn update_generation(&self, id: Uuid, patch: GenerationPatch) -> Result<Generation, StoreError>;

    /// All-or-nothing: either every asset is inserted or none is.
    async fn insert_assets(&self, assets: Vec<NewAsset>) -> Result<Vec<GenerationAsset>, StoreError>;

    async fn list_assets(&self, generation_id: Uuid) -> Result<Vec<GenerationAsset>, StoreError>;

    async fn find_asset(&self, generation_id: Uuid, slide_id: &str) -> Result<Option<GenerationAsset>, StoreError>;

    /// Swap one slide's image URL, store the matching document and consume one edit.
    async fn apply_slide_replacement(&self, replacement: SlideReplacement) -> Result<GenerationAsset, StoreError>;

    async fn record_feedback(&self, feedback: Feedback) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    generations: HashMap<Uuid, Generation>,
    status_history: HashMap<Uuid, Vec<GenerationStatus>>,
    assets: Vec<GenerationAsset>,
    feedback: Vec<Feedback>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status a generation has held, oldest first.
    pub fn status_history(&self, id: Uuid) -> Vec<GenerationStatus> {
        self.tables.read().status_history.get(&id).cloned().unwrap_or_default()
    }

    pub fn generation_count(&self) -> usize {
        self.tables.read().generations.len()
    }

    pub fn feedback_for(&self, generation_id: Uuid) -> Vec<Feedback> {
        self.tables.read().feedback.iter().filter(|f| f.generation_id == generation_id).cloned().collect()
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound { entity, id: id.to_string() }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_generation(&self, new: NewGeneration, edits_remaining: u32) -> Result<Generation, StoreError> {
        let now = Utc::now();
        let generation = Generation {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            seller_input: new.seller_input,
            status: GenerationStatus::Generating,
            generated_json: None,
            error_message: None,
            llm_time_ms: None,
            render_time_ms: None,
            zip_url: None,
            edits_remaining,
            feedback_submitted: false,
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.write();
        tables.status_history.insert(generation.id, vec![generation.status]);
        tables.generations.insert(generation.id, generation.clone());
        Ok(generation)
    }

    async fn get_generation(&self, id: Uuid) -> Result<Option<Generation>, StoreError> {
        Ok(self.tables.read().generations.get(&id).cloned())
    }

    async fn update_generation(&self, id: Uuid, patch: GenerationPatch) -> Result<Generation, StoreError> {
        let mut tables = self.tables.write();
        let generation = tables.generations.get_mut(&id).ok_or_else(|| not_found("generation", id))?;

        let mut moved_to = None;
        if let Some(next) = patch.status {
            let from = generation.status;
            if next != from || from.is_terminal() {
                if !from.can_transition_to(next) {
                    return Err(StoreError::InvalidTransition { from, to: next });
                }
                moved_to = Some(next);
            }
        }

        if let Some(status) = moved_to {
            generation.status = status;
        }
        if let Some(seller_input) = patch.seller_input {
            generation.seller_input = seller_input;
        }
        if let Some(document) = patch.generated_json {
            generation.generated_json = Some(document);
        }
        if let Some(message) = patch.error_message {
            generation.error_message = Some(message);
        }
        if let Some(ms) = patch.llm_time_ms {
            generation.llm_time_ms = Some(ms);
        }
        if let Some(ms) = patch.render_time_ms {
            generation.render_time_ms = Some(ms);
        }
        if let Some(url) = patch.zip_url {
            generation.zip_url = Some(url);
        }
        if let Some(edits) = patch.edits_remaining {
            generation.edits_remaining = edits;
        }
        if let Some(submitted) = patch.feedback_submitted {
            generation.feedback_submitted = submitted;
        }
        generation.updated_at = Utc::now();
        let updated = generation.clone();

        if let Some(status) = moved_to {
            tables.status_history.entry(id).or_default().push(status);
        }
        Ok(updated)
    }

    async fn insert_assets(&self, assets: Vec<NewAsset>) -> Result<Vec<GenerationAsset>, StoreError> {
        let mut tables = self.tables.write();

        let mut taken: HashSet<(Uuid, String)> =
            tables.assets.iter().map(|a| (a.generation_id, a.slide_id.clone())).collect();
        for asset in &assets {
            if !tables.generations.contains_key(&asset.generation_id) {
                return Err(not_found("generation", asset.generation_id));
            }
            if !taken.insert((asset.generation_id, asset.slide_id.clone())) {
                return Err(StoreError::Conflict(format!(
                    "asset for slide {} already exists on generation {}",
                    asset.slide_id, asset.generation_id
                )));
            }
        }

        let now = Utc::now();
        let inserted: Vec<GenerationAsset> = assets
            .into_iter()
            .map(|a| GenerationAsset {
                id: Uuid::new_v4(),
                generation_id: a.generation_id,
                slide_id: a.slide_id,
                image_url: a.image_url,
                width: a.width,
                height: a.height,
                file_size_kb: a.file_size_kb,
                created_at: now,
            })
            .collect();
        tables.assets.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn list_assets(&self, generation_id: Uuid) -> Result<Vec<GenerationAsset>, StoreError> {
        Ok(self.tables.read().assets.iter().filter(|a| a.generation_id == generation_id).cloned().collect())
    }

    async fn find_asset(&self, generation_id: Uuid, slide_id: &str) -> Result<Option<GenerationAsset>, StoreError> {
        Ok(self
            .tables
            .read()
            .assets
            .iter()
            .find(|a| a.generation_id == generation_id && a.slide_id == slide_id)
            .cloned())
    }

    async fn apply_slide_replacement(&self, replacement: SlideReplacement) -> Result<GenerationAsset, StoreError> {
        let mut tables = self.tables.write();
        let Tables { generations, assets, .. } = &mut *tables;

        let generation = generations
            .get_mut(&replacement.generation_id)
            .ok_or_else(|| not_found("generation", replacement.generation_id))?;
        let asset = assets
            .iter_mut()
            .find(|a| a.id == replacement.asset_id && a.generation_id == replacement.generation_id)
            .ok_or_else(|| not_found("asset", replacement.asset_id))?;

        asset.image_url = replacement.image_url;
        generation.generated_json = Some(replacement.document);
        if let Some(urls) = replacement.seller_image_urls {
            generation.seller_input.image_urls = urls;
        }
        generation.edits_remaining = generation.edits_remaining.saturating_sub(1);
        generation.updated_at = Utc::now();
        Ok(asset.clone())
    }

    async fn record_feedback(&self, feedback: Feedback) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let generation = tables
            .generations
            .get_mut(&feedback.generation_id)
            .ok_or_else(|| not_found("generation", feedback.generation_id))?;
        generation.feedback_submitted = true;
        generation.updated_at = Utc::now();
        tables.feedback.push(feedback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DetailPage;
    use crate::models::{Platform, SellerInput};
    use pretty_assertions::assert_eq;

    fn new_generation() -> NewGeneration {
        NewGeneration {
            owner_id: None,
            seller_input: SellerInput {
                product_title: "텀블러".into(),
                platform: Platform::Coupang,
                category: "general".into(),
                additional_info: None,
                image_urls: vec![],
                design_style: "modern_red".into(),
                must_include: vec![],
                must_avoid: vec![],
            },
        }
    }

    fn asset(generation_id: Uuid, slide_id: &str) -> NewAsset {
        NewAsset {
            generation_id,
            slide_id: slide_id.into(),
            image_url: format!("memory://{generation_id}/{slide_id}.png"),
            width: 860,
            height: 1200,
            file_size_kb: 120,
        }
    }

    #[tokio::test]
    async fn status_moves_forward_only() {
        let store = MemoryRecordStore::new();
        let g = store.insert_generation(new_generation(), 0).await.unwrap();

        store.update_generation(g.id, GenerationPatch::status(GenerationStatus::Rendering)).await.unwrap();
        store.update_generation(g.id, GenerationPatch::status(GenerationStatus::Complete)).await.unwrap();
        let err = store.update_generation(g.id, GenerationPatch::failed("late")).await.unwrap_err();
        assert_eq!(err, StoreError::InvalidTransition { from: GenerationStatus::Complete, to: GenerationStatus::Failed });

        assert_eq!(
            store.status_history(g.id),
            vec![GenerationStatus::Generating, GenerationStatus::Rendering, GenerationStatus::Complete]
        );
        let stored = store.get_generation(g.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message, None);
    }

    #[tokio::test]
    async fn failed_is_absorbing() {
        let store = MemoryRecordStore::new();
        let g = store.insert_generation(new_generation(), 0).await.unwrap();
        store.update_generation(g.id, GenerationPatch::failed("boom")).await.unwrap();
        assert!(store.update_generation(g.id, GenerationPatch::failed("again")).await.is_err());
        assert!(store.update_generation(g.id, GenerationPatch::status(GenerationStatus::Rendering)).await.is_err());
    }

    #[tokio::test]
    async fn asset_batches_are_atomic() {
        let store = MemoryRecordStore::new();
        let g = store.insert_generation(new_generation(), 0).await.unwrap();
        store.insert_assets(vec![asset(g.id, "hero")]).await.unwrap();

        let err = store.insert_assets(vec![asset(g.id, "cta"), asset(g.id, "hero")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let slides: Vec<String> = store.list_assets(g.id).await.unwrap().into_iter().map(|a| a.slide_id).collect();
        assert_eq!(slides, vec!["hero".to_string()]);
    }

    #[tokio::test]
    async fn replacement_updates_asset_document_and_quota_together() {
        let store = MemoryRecordStore::new();
        let g = store.insert_generation(new_generation(), 3).await.unwrap();
        let inserted = store.insert_assets(vec![asset(g.id, "hero")]).await.unwrap();

        let document = DetailPage { schema_version: Some("5.2".into()), ..Default::default() };
        let updated = store
            .apply_slide_replacement(SlideReplacement {
                generation_id: g.id,
                asset_id: inserted[0].id,
                image_url: "memory://new.png".into(),
                document: document.clone(),
                seller_image_urls: Some(vec!["memory://photo.jpg".into()]),
            })
            .await
            .unwrap();

        assert_eq!(updated.image_url, "memory://new.png");
        let stored = store.get_generation(g.id).await.unwrap().unwrap();
        assert_eq!(stored.generated_json, Some(document));
        assert_eq!(stored.seller_input.image_urls, vec!["memory://photo.jpg".to_string()]);
        assert_eq!(stored.edits_remaining, 2);
    }

    #[tokio::test]
    async fn feedback_sets_download_gate() {
        let store = MemoryRecordStore::new();
        let g = store.insert_generation(new_generation(), 0).await.unwrap();
        store
            .record_feedback(Feedback {
                generation_id: g.id,
                user_id: None,
                score: Some(4),
                weak_cuts: vec!["cta".into()],
                upload_intent: None,
                paid_intent: None,
                improvement_areas: vec![],
                comment: None,
            })
            .await
            .unwrap();
        assert!(store.get_generation(g.id).await.unwrap().unwrap().feedback_submitted);
        assert_eq!(store.feedback_for(g.id).len(), 1);

        let missing = Feedback { generation_id: Uuid::new_v4(), ..store.feedback_for(g.id)[0].clone() };
        assert!(matches!(store.record_feedback(missing).await, Err(StoreError::NotFound { .. })));
    }
}
