use std::fmt::Display;

use bytes::Bytes;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use image::ImageFormat;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::blob::{BlobError, BlobStore};
use crate::document::DetailPage;
use crate::models::{GenerationAsset, NewAsset, PhotoUpload, SlideReplacement};
use crate::render::RenderedSlide;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a call site treats the failure of a side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Logged and swallowed; the caller continues without the value.
    Tolerated,
    /// Propagated; the caller aborts.
    Fatal,
}

impl FailurePolicy {
    pub fn apply<T, E: Display>(self, what: &str, result: Result<T, E>) -> Result<Option<T>, E> {
        match (self, result) {
            (_, Ok(value)) => Ok(Some(value)),
            (FailurePolicy::Tolerated, Err(e)) => {
                warn!("⚠️ {} failed, continuing: {}", what, e);
                Ok(None)
            }
            (FailurePolicy::Fatal, Err(e)) => {
                error!("❌ {} failed: {}", what, e);
                Err(e)
            }
        }
    }
}

pub fn slide_path(generation_id: Uuid, slide_id: &str) -> String {
    format!("{generation_id}/{slide_id}.png")
}

/// Fresh path per edit so earlier renders stay reachable and caches never serve a stale slide.
pub fn versioned_slide_path(generation_id: Uuid, slide_id: &str) -> String {
    format!("{generation_id}/{slide_id}-{}.png", Utc::now().timestamp_millis())
}

pub fn size_kb(len: usize) -> u64 {
    (len as f64 / 1024.0).round() as u64
}

/// Real format of an uploaded photo, judged from its bytes rather than its name.
pub fn sniff_photo(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    let format = image::guess_format(bytes).ok()?;
    let ext = match format {
        ImageFormat::Jpeg => "jpg",
        other => other.extensions_str().first().copied()?,
    };
    Some((ext, format.to_mime_type()))
}

fn photo_kind(photo: &PhotoUpload) -> (String, String) {
    if let Some((ext, mime)) = sniff_photo(&photo.bytes) {
        return (ext.to_string(), mime.to_string());
    }
    let ext = photo
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    let mime = photo.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
    (ext, mime)
}

/// Upload seller photos concurrently. A failed photo is left out of the result.
pub async fn upload_seller_photos(blob: &dyn BlobStore, generation_id: Uuid, photos: &[PhotoUpload]) -> Vec<String> {
    let uploads = photos.iter().enumerate().map(|(index, photo)| async move {
        let (ext, mime) = photo_kind(photo);
        let path = format!("seller-photos/{generation_id}/photo-{index}.{ext}");
        let result = blob.put(&path, photo.bytes.clone(), &mime).await;
        FailurePolicy::Tolerated.apply(&format!("seller photo upload {path}"), result).ok().flatten()
    });

    let urls: Vec<String> = join_all(uploads).await.into_iter().flatten().collect();
    info!("📷 Uploaded {}/{} seller photo(s) for {}", urls.len(), photos.len(), generation_id);
    urls
}

/// Upload the photo that replaces a slide's reference image.
pub async fn upload_replacement_photo(
    blob: &dyn BlobStore,
    generation_id: Uuid,
    slide_id: &str,
    photo: &PhotoUpload,
) -> Result<String, BlobError> {
    let (ext, mime) = photo_kind(photo);
    let path = format!("seller-photos/{generation_id}/replace-{slide_id}-{}.{ext}", Utc::now().timestamp_millis());
    let result = blob.put(&path, photo.bytes.clone(), &mime).await;
    Ok(FailurePolicy::Fatal.apply("replacement photo upload", result)?.unwrap_or_default())
}

/// Upload every rendered slide, then register all of them in one batch.
pub async fn persist_slides(
    blob: &dyn BlobStore,
    store: &dyn RecordStore,
    generation_id: Uuid,
    slides: &[RenderedSlide],
) -> Result<Vec<GenerationAsset>, AssetError> {
    let uploads = slides.iter().map(|slide| async move {
        let path = slide_path(generation_id, &slide.slide_id);
        let url = blob.put(&path, slide.bytes.clone(), "image/png").await?;
        Ok::<_, BlobError>(NewAsset {
            generation_id,
            slide_id: slide.slide_id.clone(),
            image_url: url,
            width: slide.width,
            height: slide.height,
            file_size_kb: size_kb(slide.bytes.len()),
        })
    });

    let batch = FailurePolicy::Fatal.apply("slide upload", try_join_all(uploads).await)?.unwrap_or_default();
    let assets = store.insert_assets(batch).await?;
    info!("🗂️ Persisted {} slide asset(s) for {}", assets.len(), generation_id);
    Ok(assets)
}

/// Store a re-rendered slide under a fresh path and commit it together with
/// the document it was rendered from.
pub async fn replace_slide(
    blob: &dyn BlobStore,
    store: &dyn RecordStore,
    asset: &GenerationAsset,
    bytes: Bytes,
    document: DetailPage,
    seller_image_urls: Option<Vec<String>>,
) -> Result<GenerationAsset, AssetError> {
    let path = versioned_slide_path(asset.generation_id, &asset.slide_id);
    let image_url = blob.put(&path, bytes, "image/png").await?;
    let updated = store
        .apply_slide_replacement(SlideReplacement {
            generation_id: asset.generation_id,
            asset_id: asset.id,
            image_url,
            document,
            seller_image_urls,
        })
        .await?;
    info!("🔄 Slide {} of {} now at {}", updated.slide_id, updated.generation_id, updated.image_url);
    Ok(updated)
}
