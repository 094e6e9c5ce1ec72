use actix_multipart::Multipart;
use futures_util::StreamExt as _;
use shared::error::ExtractionError;
use tracing::debug;

/// The `file` field of an upload form.
#[derive(Debug, Default)]
pub struct ReceivedFile {
    /// `None` when the form carried no `file` field at all.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Reads the `file` field into memory, draining every other field.
pub async fn read_upload(
    mut payload: Multipart,
    limit: usize,
) -> Result<ReceivedFile, ExtractionError> {
    let mut received = ReceivedFile::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| ExtractionError::InvalidInput(format!("Formulario inválido: {e}")))?;
        if field.name() != "file" || received.filename.is_some() {
            while let Some(_chunk) = field.next().await {
                // drain
            }
            continue;
        }

        received.filename = Some(
            field
                .content_disposition()
                .get_filename()
                .map(|f| f.to_string())
                .unwrap_or_default(),
        );
        received.content_type = field.content_type().map(|m| m.essence_str().to_string());

        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| ExtractionError::InvalidInput(format!("Formulario inválido: {e}")))?;
            if received.bytes.len() + chunk.len() > limit {
                return Err(ExtractionError::InvalidInput(
                    "El archivo supera el tamaño máximo permitido".into(),
                ));
            }
            received.bytes.extend_from_slice(&chunk);
        }
        debug!(filename = ?received.filename, bytes = received.bytes.len(), "file field received");
    }

    Ok(received)
}
