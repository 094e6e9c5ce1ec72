use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ExtractionError;

fn default_http_bind() -> String {
    "0.0.0.0".into()
}

fn default_http_port() -> u16 {
    5000
}

fn default_vision_endpoint() -> String {
    "https://vision.googleapis.com".into()
}

fn default_ocr_timeout_secs() -> u64 {
    60
}

fn default_pdf_dpi() -> u32 {
    300
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_pdftoppm_bin() -> String {
    "pdftoppm".into()
}

fn default_pdfinfo_bin() -> String {
    "pdfinfo".into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Raw JSON credential blob for the OCR service.
    #[serde(default)]
    pub google_cloud_credentials: Option<String>,
    #[serde(default = "default_vision_endpoint")]
    pub vision_endpoint: String,
    #[serde(default = "default_ocr_timeout_secs")]
    pub ocr_timeout_secs: u64,
    #[serde(default = "default_pdf_dpi")]
    pub pdf_dpi: u32,
    #[serde(default)]
    pub scratch_dir: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_pdftoppm_bin")]
    pub pdftoppm_bin: String,
    #[serde(default = "default_pdfinfo_bin")]
    pub pdfinfo_bin: String,
    #[serde(default)]
    pub log_json: bool,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    /// Parent directory of all per-request scratch directories.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir
            .as_ref()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Parses the credential blob. Any error here means OCR stays disabled
    /// for the lifetime of the process.
    pub fn vision_credentials(&self) -> Result<VisionCredentials, ExtractionError> {
        let blob = self
            .google_cloud_credentials
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| {
                ExtractionError::ServiceUnavailable(
                    "GOOGLE_CLOUD_CREDENTIALS not set".into(),
                )
            })?;
        let creds = VisionCredentials::from_json(blob)?;
        Ok(VisionCredentials {
            endpoint: creds
                .endpoint
                .or_else(|| Some(self.vision_endpoint.clone())),
            ..creds
        })
    }
}

/// How requests to the OCR service authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionAuth {
    ApiKey(String),
    Bearer(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionCredentials {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl VisionCredentials {
    pub fn from_json(blob: &str) -> Result<Self, ExtractionError> {
        let creds: VisionCredentials = serde_json::from_str(blob).map_err(|e| {
            ExtractionError::ServiceUnavailable(format!("invalid JSON in credentials: {e}"))
        })?;
        creds.auth()?;
        Ok(creds)
    }

    /// An API key wins over a bearer token when both are present.
    pub fn auth(&self) -> Result<VisionAuth, ExtractionError> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        if let Some(key) = non_empty(&self.api_key) {
            return Ok(VisionAuth::ApiKey(key));
        }
        if let Some(token) = non_empty(&self.access_token) {
            return Ok(VisionAuth::Bearer(token));
        }
        Err(ExtractionError::ServiceUnavailable(
            "credentials carry neither api_key nor access_token".into(),
        ))
    }
}
