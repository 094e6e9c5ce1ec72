use strum_macros::IntoStaticStr;
use thiserror::Error;

/// Every way a single extraction request can end without text.
#[derive(Error, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("ocr service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("corrupt input: {0}")]
    CorruptInput(String),
    /// `api_message` is only set for text reported by the OCR service itself;
    /// `detail` may carry transport internals and never reaches the user.
    #[error("ocr service error: {detail}")]
    ServiceCall {
        detail: String,
        api_message: Option<String>,
    },
    #[error("no text detected")]
    NoTextFound,
    #[error("ocr service timed out")]
    Timeout,
    #[error("IO error: {0}")]
    Io(String),
}

impl ExtractionError {
    /// Error reported by the OCR service in its response.
    pub fn api(message: impl Into<String>) -> Self {
        let message = message.into();
        ExtractionError::ServiceCall {
            detail: message.clone(),
            api_message: Some(message),
        }
    }

    /// Failure talking to the OCR service: transport, status or decoding.
    pub fn service(detail: impl Into<String>) -> Self {
        ExtractionError::ServiceCall {
            detail: detail.into(),
            api_message: None,
        }
    }

    /// Stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::Timeout)
    }

    /// Unexpected local faults, as opposed to problems with the input or the
    /// OCR service.
    pub fn is_internal(&self) -> bool {
        matches!(self, ExtractionError::Io(_))
    }

    /// Short text shown to the end user. Details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::InvalidInput(msg) => msg.clone(),
            ExtractionError::ServiceUnavailable(_) => {
                "El servicio de OCR no está disponible".into()
            }
            ExtractionError::CorruptInput(_) => {
                "Error al procesar la imagen: archivo inválido o dañado".into()
            }
            ExtractionError::ServiceCall {
                api_message: Some(msg),
                ..
            } => format!("Error al procesar la imagen: {msg}"),
            ExtractionError::ServiceCall { api_message: None, .. } => {
                "Error al procesar la imagen: el servicio de OCR no respondió correctamente".into()
            }
            ExtractionError::NoTextFound => "No se pudo extraer texto del archivo".into(),
            ExtractionError::Timeout => {
                "El servicio de OCR tardó demasiado en responder, inténtelo de nuevo".into()
            }
            ExtractionError::Io(_) => "Error interno al procesar el archivo".into(),
        }
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(e: std::io::Error) -> Self {
        ExtractionError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(ExtractionError::NoTextFound.kind(), "no_text_found");
        assert_eq!(
            ExtractionError::ServiceUnavailable("x".into()).kind(),
            "service_unavailable"
        );
        assert_eq!(ExtractionError::Io("disk".into()).kind(), "io");
    }

    #[test]
    fn only_timeout_is_retryable() {
        assert!(ExtractionError::Timeout.is_retryable());
        assert!(!ExtractionError::api("quota").is_retryable());
        assert!(!ExtractionError::NoTextFound.is_retryable());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let e = ExtractionError::Io("/tmp/ocr-abc: permission denied".into());
        assert!(!e.user_message().contains("/tmp"));
        assert!(e.is_internal());

        let e = ExtractionError::CorruptInput("png decoder: bad IHDR".into());
        assert!(!e.user_message().contains("IHDR"));
    }

    #[test]
    fn only_api_messages_reach_the_user() {
        let e = ExtractionError::api("API key not valid.");
        assert_eq!(e.user_message(), "Error al procesar la imagen: API key not valid.");

        let e = ExtractionError::service("connect refused for http://h/v1?key=abc");
        assert!(!e.user_message().contains("key=abc"));
        assert_eq!(e.kind(), "service_call");
    }

    #[test]
    fn validation_message_passes_through() {
        let e = ExtractionError::InvalidInput("Tipo de archivo no válido".into());
        assert_eq!(e.user_message(), "Tipo de archivo no válido");
    }
}
