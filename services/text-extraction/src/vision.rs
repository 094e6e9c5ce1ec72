//! Google Cloud Vision `images:annotate` over plain REST.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::config::{VisionAuth, VisionCredentials};
use shared::error::{ExtractionError, Result};
use tracing::{debug, error};

use crate::ocr::{OcrBackend, TextAnnotation};

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize, Default)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize, Default)]
struct Status {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    endpoint: String,
    auth: VisionAuth,
}

impl VisionClient {
    pub fn new(credentials: &VisionCredentials, timeout: Duration) -> Result<Self> {
        let auth = credentials.auth()?;
        let endpoint = credentials
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://vision.googleapis.com".into())
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::ServiceUnavailable(e.to_string()))?;
        Ok(Self { http, endpoint, auth })
    }

    fn url(&self) -> String {
        format!("{}/v1/images:annotate", self.endpoint)
    }
}

/// The request URL may carry the API key, so it is stripped before the
/// error is turned into text.
fn map_send_error(e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::Timeout
    } else {
        ExtractionError::service(e.without_url().to_string())
    }
}

#[async_trait]
impl OcrBackend for VisionClient {
    async fn detect_text(&self, content: &[u8]) -> Result<Vec<TextAnnotation>> {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(content),
                },
                features: [Feature { kind: "TEXT_DETECTION" }],
            }],
        };

        let mut req = self.http.post(self.url()).json(&body);
        req = match &self.auth {
            VisionAuth::ApiKey(key) => req.query(&[("key", key)]),
            VisionAuth::Bearer(token) => req.bearer_auth(token),
        };

        debug!("\u{2192} vision request: {} bytes", content.len());
        let res = req.send().await.map_err(map_send_error)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(map_send_error)?;
        debug!(%status, "\u{2190} vision response: {} bytes", bytes.len());

        if !status.is_success() {
            let err = match serde_json::from_slice::<ErrorEnvelope>(&bytes) {
                Ok(env) if !env.error.message.is_empty() => ExtractionError::api(env.error.message),
                _ => ExtractionError::service(format!("http status {}", status.as_u16())),
            };
            error!(%status, %err, "vision api error");
            return Err(err);
        }

        let parsed: AnnotateResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ExtractionError::service(format!("unreadable response: {e}")))?;
        let first = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(err) = first.error.filter(|s| !s.message.is_empty()) {
            error!(message = %err.message, "vision api error");
            return Err(ExtractionError::api(err.message));
        }
        Ok(first.text_annotations)
    }
}
