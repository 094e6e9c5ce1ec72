//! OCR extraction pipeline shared by every front-end.
//!
//! An upload is validated and parked in a scratch directory
//! ([`upload`]), routed by [`pipeline::Pipeline`] either straight to the OCR
//! adapter ([`ocr`]) or through the page rasterizer ([`rasterizer`]) first,
//! and the per-page texts are joined by [`assembler`].

pub mod assembler;
pub mod ocr;
pub mod pipeline;
pub mod rasterizer;
pub mod upload;
pub mod vision;

pub use assembler::{assemble, DocumentResult};
pub use ocr::{extract_image_text, OcrBackend, TextAnnotation};
pub use pipeline::Pipeline;
pub use rasterizer::{PageImage, PageSource, PdfRasterizer};
pub use upload::{allowed_file, FileKind, ScratchUpload};
pub use vision::VisionClient;
