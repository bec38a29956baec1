use std::io::{Cursor, Write};

use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::blob::{BlobError, BlobStore};
use crate::render::RenderedSlide;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("zip write: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

pub fn bundle_path(generation_id: Uuid) -> String {
    format!("{generation_id}/detail-page.zip")
}

/// Entries are numbered in render order so the archive lists slides top to bottom.
pub fn build_zip(slides: &[RenderedSlide]) -> Result<Vec<u8>, BundleError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, slide) in slides.iter().enumerate() {
        writer.start_file(format!("{:02}_{}.png", index + 1, slide.slide_id), options)?;
        writer.write_all(&slide.bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

pub async fn store_bundle(
    blob: &dyn BlobStore,
    generation_id: Uuid,
    slides: &[RenderedSlide],
) -> Result<String, BundleError> {
    let archive = build_zip(slides)?;
    let size = archive.len();
    let url = blob.put(&bundle_path(generation_id), Bytes::from(archive), "application/zip").await?;
    info!("🗜️ Bundled {} slide(s) for {} ({} bytes)", slides.len(), generation_id, size);
    Ok(url)
}
