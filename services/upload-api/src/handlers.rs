use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use askama::Template;
use shared::dto::{ErrorBody, ExtractResponse, HealthStatus};
use shared::error::ExtractionError;
use text_extraction::DocumentResult;
use tracing::{error, info};

use crate::multipart::read_upload;
use crate::templates::{DashboardTemplate, IndexTemplate, ResultsTemplate};
use crate::AppState;

fn html<T: Template>(template: &T) -> actix_web::Result<HttpResponse> {
    let body = template
        .render()
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

/// `{"error": ...}` with 400 for input and processing failures, 500 for
/// unexpected local ones.
fn error_response(e: &ExtractionError) -> HttpResponse {
    let status = if e.is_internal() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    HttpResponse::build(status).json(ErrorBody {
        error: e.user_message(),
    })
}

async fn run(payload: Multipart, state: &AppState) -> Result<DocumentResult, ExtractionError> {
    let file = read_upload(payload, state.max_upload_bytes).await?;
    info!(step = "upload.received", filename = ?file.filename, bytes = file.bytes.len(), "upload received");
    state
        .pipeline
        .process_upload(
            file.filename.as_deref(),
            file.content_type.as_deref(),
            &file.bytes,
        )
        .await
}

fn log_failure(e: &ExtractionError) {
    error!(%e, kind = e.kind(), retryable = e.is_retryable(), "processing failed");
}

fn max_upload_mb(state: &AppState) -> usize {
    state.max_upload_bytes / (1024 * 1024)
}

pub async fn index(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    html(&IndexTemplate {
        max_upload_mb: max_upload_mb(&state),
    })
}

/// Form-style surface: rendered results page or a JSON error.
pub async fn process(
    payload: Multipart,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    match run(payload, &state).await {
        Ok(doc) => {
            info!(pages = doc.pages, len = doc.text.len(), "request succeeded");
            html(&ResultsTemplate {
                extracted_text: &doc.text,
                pages: doc.pages,
            })
        }
        Err(e) => {
            log_failure(&e);
            Ok(error_response(&e))
        }
    }
}

pub async fn dashboard(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    html(&DashboardTemplate {
        max_upload_mb: max_upload_mb(&state),
        ocr_configured: state.pipeline.is_configured(),
    })
}

/// JSON endpoint behind the dashboard.
pub async fn api_extract(payload: Multipart, state: web::Data<AppState>) -> HttpResponse {
    match run(payload, &state).await {
        Ok(doc) => {
            info!(pages = doc.pages, len = doc.text.len(), "request succeeded");
            HttpResponse::Ok().json(ExtractResponse {
                text: doc.text,
                pages: doc.pages,
            })
        }
        Err(e) => {
            log_failure(&e);
            error_response(&e)
        }
    }
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        status: "ok".into(),
        ocr_configured: state.pipeline.is_configured(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use actix_web::{test, App};
    use async_trait::async_trait;
    use text_extraction::{OcrBackend, PdfRasterizer, Pipeline, TextAnnotation};

    use super::*;
    use crate::routes;

    const BOUNDARY: &str = "----ocrtestboundary";

    struct FixedOcr {
        text: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OcrBackend for FixedOcr {
        async fn detect_text(&self, _content: &[u8]) -> shared::error::Result<Vec<TextAnnotation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.text.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![TextAnnotation {
                description: self.text.clone(),
                locale: None,
            }])
        }
    }

    fn fixed(text: &str) -> Arc<FixedOcr> {
        Arc::new(FixedOcr {
            text: text.into(),
            calls: AtomicUsize::new(0),
        })
    }

    fn state(backend: Option<Arc<FixedOcr>>, root: &Path, max_upload_bytes: usize) -> AppState {
        AppState {
            pipeline: Pipeline::new(
                backend.map(|b| b as Arc<dyn OcrBackend>),
                PdfRasterizer::new("pdftoppm", 72),
                root,
            ),
            max_upload_bytes,
        }
    }

    fn png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 3, image::Rgb([0, 0, 0]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(uri: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[actix_rt::test]
    async fn index_serves_upload_form() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None, root.path(), 1024)))
                .configure(routes),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        let page = String::from_utf8_lossy(&body);
        assert!(page.contains("name=\"file\""));
        assert!(page.contains("/process"));
    }

    #[actix_rt::test]
    async fn process_renders_escaped_text() {
        let root = tempfile::tempdir().unwrap();
        let ocr = fixed("Total <b>42</b>");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(ocr.clone()), root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("file", "ticket.png", "image/png", &png()));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let page = String::from_utf8_lossy(&body);
        assert!(page.contains("Total &lt;b&gt;42"), "{page}");
        assert!(!page.contains("<b>42"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
        assert!(is_empty(root.path()));
    }

    #[actix_rt::test]
    async fn missing_file_field_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("x")), root.path(), 1024)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("other", "a.png", "image/png", b"x"));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "No se ha subido ningún archivo");
    }

    #[actix_rt::test]
    async fn empty_filename_and_bad_extension_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let ocr = fixed("x");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(ocr.clone()), root.path(), 1024)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("file", "", "application/octet-stream", b""));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "No se ha seleccionado ningún archivo");

        let req = upload("/process", multipart_body("file", "notes.txt", "text/plain", b"hi"));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "Tipo de archivo no válido");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn unconfigured_ocr_reports_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(None, root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("file", "scan.png", "image/png", &png()));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "El servicio de OCR no está disponible");
        assert!(is_empty(root.path()));
    }

    #[actix_rt::test]
    async fn oversized_upload_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("x")), root.path(), 16)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("file", "big.png", "image/png", &[0u8; 64]));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(is_empty(root.path()));
    }

    #[actix_rt::test]
    async fn scratch_failure_is_internal_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("x")), &blocker, 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/process", multipart_body("file", "a.png", "image/png", &png()));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "Error interno al procesar el archivo");
    }

    #[actix_rt::test]
    async fn api_extract_returns_json_text() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("línea 1\nlínea 2")), root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/api/extract", multipart_body("file", "A.JPG", "image/jpeg", &png()));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: ExtractResponse = test::read_body_json(resp).await;
        assert_eq!(body.text, "línea 1\nlínea 2");
        assert_eq!(body.pages, 1);
        assert!(is_empty(root.path()));
    }

    #[actix_rt::test]
    async fn api_extract_reports_corrupt_image() {
        let root = tempfile::tempdir().unwrap();
        let ocr = fixed("x");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(ocr.clone()), root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/api/extract", multipart_body("file", "a.png", "image/png", b"garbage"));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert!(body.error.contains("inválido o dañado"));
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty(root.path()));
    }

    #[actix_rt::test]
    async fn api_extract_no_text() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("")), root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let req = upload("/api/extract", multipart_body("file", "a.png", "image/png", &png()));
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "No se pudo extraer texto del archivo");
    }

    #[actix_rt::test]
    async fn dashboard_and_health() {
        let root = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Some(fixed("x")), root.path(), 1 << 20)))
                .configure(routes),
        )
        .await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/dashboard").to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("/api/extract"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        let health: HealthStatus = test::read_body_json(resp).await;
        assert_eq!(health.status, "ok");
        assert!(health.ocr_configured);
    }
}
