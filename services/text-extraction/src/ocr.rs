use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::error::{ExtractionError, Result};
use tracing::{debug, error, info, warn};

/// One text annotation as reported by the OCR service. The first entry of a
/// response holds the full text of the image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub locale: Option<String>,
}

/// Text detection as offered by an external OCR service.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Runs text detection on raw image bytes.
    async fn detect_text(&self, content: &[u8]) -> Result<Vec<TextAnnotation>>;
}

/// Makes sure the file is a raster image we can decode. Only the header is
/// read, like opening an image without loading its pixels.
pub async fn verify_image(path: &Path) -> Result<(u32, u32)> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let reader = image::ImageReader::open(&owned)?
            .with_guessed_format()
            .map_err(|e| ExtractionError::CorruptInput(e.to_string()))?;
        if reader.format().is_none() {
            return Err(ExtractionError::CorruptInput("unrecognised image format".into()));
        }
        reader
            .into_dimensions()
            .map_err(|e| ExtractionError::CorruptInput(e.to_string()))
    })
    .await
    .map_err(|e| ExtractionError::Io(e.to_string()))?
}

/// Extracts the primary text of one image file.
///
/// Fails with `CorruptInput` before anything is sent when the file does not
/// decode, and with `NoTextFound` when the service sees no text.
pub async fn extract_image_text(backend: &dyn OcrBackend, path: &Path) -> Result<String> {
    debug!(path = %path.display(), "processing image");

    let (width, height) = verify_image(path).await.map_err(|e| {
        error!(%e, path = %path.display(), "failed to open image");
        e
    })?;
    debug!(width, height, "image opened");

    let content = tokio::fs::read(path).await?;
    debug!(bytes = content.len(), "image read");

    let annotations = backend.detect_text(&content).await.map_err(|e| {
        error!(%e, kind = e.kind(), "ocr call failed");
        e
    })?;

    let text = annotations
        .into_iter()
        .next()
        .map(|a| a.description)
        .unwrap_or_default();
    if text.trim().is_empty() {
        warn!("no text detected in the image");
        return Err(ExtractionError::NoTextFound);
    }

    info!(step = "ocr.ok", len = text.len(), "extracted text");
    Ok(text)
}
