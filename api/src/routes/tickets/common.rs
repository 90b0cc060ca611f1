//! Multipart parsing shared by the ticket-creation and message endpoints.
//!
//! Text fields (`subject`, `body`, `dedup_key`) and any number of file fields
//! are accepted in any order. Files are written to the upload root as they
//! stream in; on a later service failure the caller must discard them again.

use axum::{Json, extract::Multipart, http::StatusCode, response::IntoResponse, response::Response};
use tracing::warn;
use util::paths;

use crate::response::ApiResponse;
use crate::services::tickets::UploadedFile;

#[derive(Default)]
pub struct ParsedUpload {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub dedup_key: Option<String>,
    pub files: Vec<UploadedFile>,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}

fn storage_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Failed to store attachment")),
    )
        .into_response()
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<ParsedUpload, Response> {
    let mut parsed = ParsedUpload::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard_uploads(&parsed.files).await;
                return Err(bad_request(format!("Malformed multipart body: {e}")));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        if field.file_name().is_none() {
            let value = match field.text().await {
                Ok(v) => v,
                Err(e) => {
                    discard_uploads(&parsed.files).await;
                    return Err(bad_request(format!("Unreadable field '{name}': {e}")));
                }
            };
            match name.as_str() {
                "subject" => parsed.subject = Some(value),
                "body" => parsed.body = Some(value),
                "dedup_key" => parsed.dedup_key = Some(value),
                _ => {}
            }
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_owned)
            .unwrap_or_else(|| "file".into());
        let mime_type = field.content_type().map(str::to_owned).or_else(|| {
            mime_guess::from_path(&original_name)
                .first()
                .map(|m| m.to_string())
        });

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                discard_uploads(&parsed.files).await;
                return Err(bad_request(format!(
                    "Unreadable upload '{original_name}': {e}"
                )));
            }
        };

        let stored_name = paths::attachment_filename(&original_name);
        let path = paths::attachment_path(&stored_name);
        if paths::ensure_dir(paths::upload_root()).is_err() {
            discard_uploads(&parsed.files).await;
            return Err(storage_failure());
        }
        if let Err(e) = tokio::fs::write(&path, &data).await {
            warn!(file = %path.display(), error = %e, "Failed to write upload");
            discard_uploads(&parsed.files).await;
            return Err(storage_failure());
        }

        parsed.files.push(UploadedFile {
            original_name,
            url: paths::attachment_url(&stored_name),
            mime_type,
            size_bytes: Some(data.len() as i64),
        });
    }

    Ok(parsed)
}

/// Removes already-stored files after a failed operation so orphans don't
/// accumulate under the upload root.
pub async fn discard_uploads(files: &[UploadedFile]) {
    for file in files {
        let stored_name = file.url.trim_start_matches("/uploads/");
        let path = paths::attachment_path(stored_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(file = %path.display(), error = %e, "Failed to remove orphaned upload");
        }
    }
}
