use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::Document;
use shared::error::{ExtractionError, Result};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// A rendered page waiting for OCR. The image file is deleted when the value
/// is dropped.
#[derive(Debug)]
pub struct PageImage {
    /// 1-based page number.
    pub index: u32,
    path: PathBuf,
}

impl PageImage {
    pub fn new(index: u32, path: PathBuf) -> Self {
        Self { index, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PageImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(page = self.index, "page image removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(%e, page = self.index, path = %self.path.display(), "failed to remove page image"),
        }
    }
}

/// Ordered, finite sequence of page images, produced one at a time.
#[async_trait]
pub trait PageSource: Send {
    async fn next_page(&mut self) -> Option<Result<PageImage>>;

    /// Number of pages the source will yield in total, if known.
    fn page_count(&self) -> Option<u32> {
        None
    }
}

/// Renders PDF pages to PNG with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    bin: String,
    pdfinfo_bin: String,
    dpi: u32,
}

impl PdfRasterizer {
    pub fn new(bin: impl Into<String>, dpi: u32) -> Self {
        Self {
            bin: bin.into(),
            pdfinfo_bin: "pdfinfo".into(),
            dpi,
        }
    }

    /// Poppler's `pdfinfo`, asked for the page count when lopdf cannot parse
    /// a document the renderer may still handle.
    pub fn with_pdfinfo(mut self, bin: impl Into<String>) -> Self {
        self.pdfinfo_bin = bin.into();
        self
    }

    /// Learns the page count. Rendering happens lazily in
    /// [`PdfPages::next_page`], writing into `out_dir`.
    pub async fn open(&self, pdf: &Path, out_dir: &Path) -> Result<PdfPages> {
        let owned = pdf.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || {
            Document::load(&owned).map(|doc| doc.get_pages().len() as u32)
        })
        .await
        .map_err(|e| ExtractionError::Io(e.to_string()))?;

        let total = match parsed {
            Ok(total) => total,
            Err(e) => {
                warn!(%e, "lopdf rejected pdf, asking pdfinfo");
                self.pdfinfo_pages(pdf)
                    .await
                    .map_err(|info_err| {
                        ExtractionError::CorruptInput(format!("unreadable pdf: {e}; {info_err}"))
                    })?
            }
        };

        if total == 0 {
            return Err(ExtractionError::CorruptInput("pdf has no pages".into()));
        }
        info!(pages = total, dpi = self.dpi, "pdf opened for rasterization");

        Ok(PdfPages {
            rasterizer: self.clone(),
            pdf: pdf.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            next: 1,
            total,
        })
    }

    async fn pdfinfo_pages(&self, pdf: &Path) -> std::result::Result<u32, String> {
        let output = Command::new(&self.pdfinfo_bin)
            .arg(pdf)
            .output()
            .await
            .map_err(|e| format!("pdfinfo unavailable: {e}"))?;
        if !output.status.success() {
            return Err(format!(
                "pdfinfo failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| "pdfinfo reported no page count".to_string())
    }
}

/// Reads the `Pages:` line of `pdfinfo` output.
pub(crate) fn parse_pdfinfo_pages(output: &str) -> Option<u32> {
    output
        .lines()
        .find_map(|l| l.strip_prefix("Pages:"))
        .and_then(|v| v.trim().parse().ok())
}

pub struct PdfPages {
    rasterizer: PdfRasterizer,
    pdf: PathBuf,
    out_dir: PathBuf,
    next: u32,
    total: u32,
}

impl PdfPages {
    async fn render(&self, page: u32) -> Result<PageImage> {
        let prefix = self.out_dir.join(format!("page-{page}"));
        let page_arg = page.to_string();
        let output = Command::new(&self.rasterizer.bin)
            .args(["-png", "-r", &self.rasterizer.dpi.to_string()])
            .args(["-f", &page_arg, "-l", &page_arg, "-singlefile"])
            .arg(&self.pdf)
            .arg(&prefix)
            .output()
            .await
            .map_err(|e| {
                error!(%e, bin = %self.rasterizer.bin, "failed to launch pdf renderer");
                ExtractionError::Io(format!("pdf renderer unavailable: {e}"))
            })?;

        let path = prefix.with_extension("png");
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(page, status = %output.status, %stderr, "page rendering failed");
            let _ = std::fs::remove_file(&path);
            return Err(ExtractionError::CorruptInput(format!(
                "page {page} could not be rendered: {}",
                stderr.trim()
            )));
        }
        if !path.exists() {
            return Err(ExtractionError::CorruptInput(format!(
                "renderer produced no image for page {page}"
            )));
        }
        debug!(step = "page.render.ok", page, path = %path.display(), "page rendered");
        Ok(PageImage::new(page, path))
    }
}

#[async_trait]
impl PageSource for PdfPages {
    async fn next_page(&mut self) -> Option<Result<PageImage>> {
        if self.next > self.total {
            return None;
        }
        let page = self.next;
        self.next += 1;
        let rendered = self.render(page).await;
        if rendered.is_err() {
            // no partial results after a rendering failure
            self.next = self.total + 1;
        }
        Some(rendered)
    }

    fn page_count(&self) -> Option<u32> {
        Some(self.total)
    }
}
