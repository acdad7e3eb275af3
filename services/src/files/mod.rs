//! Upload and tag endpoints.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::AppState;
use crate::database::MetadataStore;
use crate::error::ApiError;
use crate::qr::LinkArtifact;
use crate::uploads::store_upload;

/// Success body for `POST /upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub original_name: String,
    pub saved_filename: String,
    pub pdf_url: String,
    pub tags: Vec<String>,
    pub qr_code_data_url: String,
}

/// Multipart fields as the browser form sends them. `pdfFile` is required,
/// `customName` and `tags` are optional text fields.
struct UploadForm {
    original_name: String,
    bytes: Vec<u8>,
    custom_name: Option<String>,
    tags: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut custom_name = None;
    let mut tags = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("pdfFile") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                file = Some((original_name, bytes.to_vec()));
            }
            Some("customName") => {
                custom_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Internal(e.to_string()))?,
                );
            }
            Some("tags") => {
                tags = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Internal(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let (original_name, bytes) = file.ok_or(ApiError::NoFile)?;
    if bytes.is_empty() {
        return Err(ApiError::NoFile);
    }

    Ok(UploadForm {
        original_name,
        bytes,
        custom_name,
        tags,
    })
}

pub async fn upload<S, A>(
    State(state): State<AppState<S, A>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    S: MetadataStore,
    A: LinkArtifact,
{
    let form = read_form(multipart).await?;

    let committed = store_upload(
        &state.store,
        &state.uploads,
        &state.artifact,
        state.config.public_base_url(),
        &form.original_name,
        form.custom_name.as_deref().filter(|n| !n.trim().is_empty()),
        form.tags.as_deref(),
        &form.bytes,
    )
    .await?;

    tracing::info!(
        file_id = committed.file.id,
        saved_filename = %committed.file.saved_filename,
        "file uploaded"
    );

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            original_name: committed.file.original_name,
            saved_filename: committed.file.saved_filename,
            pdf_url: committed.file.file_url,
            // Echo the tags as submitted (trimmed, deduplicated, original
            // order); `GET /tags` is the alphabetized global view.
            tags: committed.tags,
            qr_code_data_url: committed.qr_data_url,
        }),
    ))
}

pub async fn list_tags<S, A>(
    State(state): State<AppState<S, A>>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: MetadataStore,
    A: LinkArtifact,
{
    let tags = state.store.list_tag_names().await?;
    Ok(Json(tags))
}
