use shared::error::{ExtractionError, Result};
use tracing::{info, warn};

pub const PAGE_SEPARATOR: &str = "\n\n";

/// Text of a whole document. Only exists when at least one page had text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentResult {
    pub text: String,
    /// Pages that contributed text.
    pub pages: usize,
}

/// Joins per-page texts in page order, dropping pages without text.
pub fn assemble<I>(pages: I) -> Result<DocumentResult>
where
    I: IntoIterator<Item = Option<String>>,
{
    let kept: Vec<String> = pages
        .into_iter()
        .flatten()
        .filter(|t| !t.trim().is_empty())
        .collect();

    if kept.is_empty() {
        warn!("no text extracted from any page");
        return Err(ExtractionError::NoTextFound);
    }
    info!(step = "assemble.ok", pages = kept.len(), "document assembled");
    Ok(DocumentResult {
        pages: kept.len(),
        text: kept.join(PAGE_SEPARATOR),
    })
}
