use std::path::{Path, PathBuf};
use std::sync::Arc;

use shared::config::Settings;
use shared::error::{ExtractionError, Result};
use tracing::{error, info, warn};

use crate::assembler::{assemble, DocumentResult};
use crate::ocr::{extract_image_text, OcrBackend};
use crate::rasterizer::{PageSource, PdfRasterizer};
use crate::upload::{validate_filename, FileKind, ScratchUpload};
use crate::vision::VisionClient;

/// Upload → dispatch → OCR → assembly, shared by every front-end.
#[derive(Clone)]
pub struct Pipeline {
    backend: Option<Arc<dyn OcrBackend>>,
    rasterizer: PdfRasterizer,
    scratch_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        backend: Option<Arc<dyn OcrBackend>>,
        rasterizer: PdfRasterizer,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            rasterizer,
            scratch_root: scratch_root.into(),
        }
    }

    /// Builds the Vision backend from the environment. Bad or missing
    /// credentials leave OCR disabled instead of failing startup.
    pub fn from_settings(settings: &Settings) -> Self {
        let backend = settings
            .vision_credentials()
            .and_then(|creds| VisionClient::new(&creds, settings.ocr_timeout()))
            .map(|client| {
                info!("ocr backend initialised");
                Arc::new(client) as Arc<dyn OcrBackend>
            })
            .map_err(|e| error!(%e, "ocr backend disabled"))
            .ok();
        Self::new(
            backend,
            PdfRasterizer::new(settings.pdftoppm_bin.clone(), settings.pdf_dpi)
                .with_pdfinfo(settings.pdfinfo_bin.clone()),
            settings.scratch_root(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&dyn OcrBackend> {
        self.backend.as_deref().ok_or_else(|| {
            ExtractionError::ServiceUnavailable("ocr client not initialised".into())
        })
    }

    /// Handles one uploaded file end to end. The scratch copy is gone by the
    /// time this returns, whatever the outcome.
    pub async fn process_upload(
        &self,
        filename: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<DocumentResult> {
        let extension = validate_filename(filename)?;
        let kind = FileKind::detect(filename.unwrap_or_default(), content_type);
        self.backend()?;
        info!(step = "upload.validated", ?kind, bytes = bytes.len(), "upload accepted");

        let upload = ScratchUpload::write(&self.scratch_root, &extension, kind, bytes).await?;
        self.dispatch(&upload).await
    }

    /// Routes PDFs through the rasterizer and everything else straight to OCR.
    pub async fn dispatch(&self, upload: &ScratchUpload) -> Result<DocumentResult> {
        match upload.kind() {
            FileKind::Image => {
                let text = extract_image_text(self.backend()?, upload.path()).await?;
                assemble([Some(text)])
            }
            FileKind::Pdf => self.process_pdf(upload.path(), upload.dir()).await,
        }
    }

    /// Rasterizes `pdf` into `work_dir` page by page and OCRs each page.
    pub async fn process_pdf(&self, pdf: &Path, work_dir: &Path) -> Result<DocumentResult> {
        let backend = self.backend()?;
        let mut pages = self.rasterizer.open(pdf, work_dir).await?;
        extract_pages(backend, &mut pages).await
    }
}

/// OCRs pages in order. A page without text is skipped; any other failure
/// aborts the document since it points at the service or the file itself.
pub async fn extract_pages<S>(backend: &dyn OcrBackend, pages: &mut S) -> Result<DocumentResult>
where
    S: PageSource + ?Sized,
{
    let total = pages.page_count();
    let mut texts = Vec::new();
    while let Some(page) = pages.next_page().await {
        let page = page?;
        info!(page = page.index, ?total, "processing pdf page");
        match extract_image_text(backend, page.path()).await {
            Ok(text) => {
                info!(step = "page.ocr.ok", page = page.index, "extracted text from page");
                texts.push(Some(text));
            }
            Err(ExtractionError::NoTextFound) => {
                warn!(step = "page.ocr.skipped", page = page.index, "no text extracted from page");
                texts.push(None);
            }
            Err(e) => {
                error!(%e, kind = e.kind(), page = page.index, "aborting pdf");
                return Err(e);
            }
        }
    }
    assemble(texts)
}
