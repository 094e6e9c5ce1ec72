//! HTTP front-ends for the OCR pipeline: a classic upload form that answers
//! with a rendered results page, and an interactive dashboard backed by a
//! JSON endpoint.

mod handlers;
mod multipart;
mod templates;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use shared::config::Settings;
use text_extraction::Pipeline;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// State shared by all workers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pipeline: Pipeline::from_settings(settings),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/process", web::post().to(handlers::process))
        .route("/dashboard", web::get().to(handlers::dashboard))
        .route("/api/extract", web::post().to(handlers::api_extract))
        .route("/health", web::get().to(handlers::health));
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            init_tracing(false);
            error!(%e, "invalid configuration");
            return Err(std::io::Error::other(e.to_string()));
        }
    };
    init_tracing(settings.log_json);
    info!("starting ocr upload service");

    let state = web::Data::new(AppState::from_settings(&settings));
    if !state.pipeline.is_configured() {
        error!("GOOGLE_CLOUD_CREDENTIALS missing or invalid, every upload will be rejected");
    }

    info!(bind = %settings.http_bind, port = settings.http_port, "starting http server");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(routes)
    })
    .bind((settings.http_bind.as_str(), settings.http_port))?
    .run()
    .await
}
