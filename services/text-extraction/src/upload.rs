use std::path::{Path, PathBuf};

use shared::error::{ExtractionError, Result};
use tempfile::TempDir;
use tracing::{debug, info};

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Accepts `pdf`, `png`, `jpg` and `jpeg`, case-insensitive.
pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Checks the submitted name and returns the lowercased extension.
pub fn validate_filename(filename: Option<&str>) -> Result<String> {
    let name = filename.ok_or_else(|| {
        ExtractionError::InvalidInput("No se ha subido ningún archivo".into())
    })?;
    if name.trim().is_empty() {
        return Err(ExtractionError::InvalidInput(
            "No se ha seleccionado ningún archivo".into(),
        ));
    }
    if !allowed_file(name) {
        return Err(ExtractionError::InvalidInput("Tipo de archivo no válido".into()));
    }
    extension_of(name).ok_or_else(|| ExtractionError::InvalidInput("Tipo de archivo no válido".into()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    /// PDF when either the extension or the declared MIME type says so.
    pub fn detect(filename: &str, content_type: Option<&str>) -> Self {
        let by_ext = extension_of(filename).as_deref() == Some("pdf");
        let by_mime = content_type
            .map(|m| m.eq_ignore_ascii_case("application/pdf"))
            .unwrap_or(false);
        if by_ext || by_mime {
            FileKind::Pdf
        } else {
            FileKind::Image
        }
    }
}

/// An uploaded file parked in its own scratch directory. Dropping it removes
/// the file together with the directory, whatever the request outcome.
#[derive(Debug)]
pub struct ScratchUpload {
    dir: TempDir,
    path: PathBuf,
    kind: FileKind,
}

impl ScratchUpload {
    pub async fn write(root: &Path, extension: &str, kind: FileKind, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new().prefix("ocr-upload-").tempdir_in(root)?;
        // the client's filename never touches the filesystem
        let path = dir.path().join(format!("upload.{extension}"));
        tokio::fs::write(&path, bytes).await?;
        info!(step = "tempfile.write.ok", path = %path.display(), bytes = bytes.len(), "upload written to scratch");
        Ok(Self { dir, path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory for derived artefacts such as rendered pages.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }
}

impl Drop for ScratchUpload {
    fn drop(&mut self) {
        debug!(step = "tempfile.cleanup", dir = %self.dir.path().display(), "removing scratch dir");
    }
}
