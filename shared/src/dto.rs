use serde::{Deserialize, Serialize};

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Successful result of the dashboard's `POST /api/extract`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub text: String,
    /// Number of pages that contributed text.
    pub pages: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub ocr_configured: bool,
}
