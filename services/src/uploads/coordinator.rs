//! The upload transaction coordinator.
//!
//! Converts "a file arrived with a name and tags" into durable state or a
//! precise error. The filesystem write and the database transaction are two
//! separate resources, so atomicity across them is approximated with a
//! compensating delete: write the binary, run the metadata transaction, and
//! remove the binary on every failure branch before the commit. Artifact
//! generation runs strictly after the commit and never rolls it back.

use crate::database::{ConflictField, MetadataError, MetadataStore, NewFile};
use crate::qr::{ArtifactError, LinkArtifact};
use crate::sanitize::sanitize_filename;
use crate::uploads::UploadStore;
use thiserror::Error;

/// Upload transaction errors, one stable category per caller reaction.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("a file with this URL is already registered; use a different name or file")]
    DuplicateUrl,

    #[error("{field} already exists; use a different name or file")]
    Conflict { field: ConflictField },

    #[error("metadata store fault: {0}")]
    Store(#[source] MetadataError),

    #[error("failed to persist upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("QR generation failed for committed file {file_id}: {source}")]
    ArtifactGeneration {
        file_id: i64,
        file_url: String,
        #[source]
        source: ArtifactError,
    },
}

/// A fully committed upload: the durable row, the tag names as submitted
/// (trimmed and deduplicated, submission order), and the QR artifact.
#[derive(Debug, Clone)]
pub struct CommittedUpload {
    pub file: crate::database::FileRecord,
    pub tags: Vec<String>,
    pub qr_data_url: String,
}

/// Split a comma-separated tag field into trimmed, de-duplicated names.
/// Order of first appearance is preserved; empty entries are dropped.
pub fn parse_tags(field: Option<&str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in field.unwrap_or_default().split(',') {
        let name = raw.trim();
        if !name.is_empty() && !tags.iter().any(|t| t == name) {
            tags.push(name.to_string());
        }
    }
    tags
}

/// Insert a disambiguating suffix before the extension.
fn with_collision_suffix(filename: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    match filename.rsplit_once('.') {
        Some((base, ext)) => format!("{base}_{millis}.{ext}"),
        None => format!("{filename}_{millis}"),
    }
}

/// Run the whole upload transaction: sanitize, persist the binary, commit
/// metadata, then generate the link artifact.
pub async fn store_upload<S, A>(
    store: &S,
    files: &UploadStore,
    artifact: &A,
    public_base_url: &str,
    original_name: &str,
    custom_name: Option<&str>,
    tags_field: Option<&str>,
    bytes: &[u8],
) -> Result<CommittedUpload, UploadError>
where
    S: MetadataStore,
    A: LinkArtifact,
{
    // Step 1: candidate storage key. Advisory only; the store's UNIQUE
    // constraints are the real authority.
    let mut saved_filename = sanitize_filename(custom_name, original_name);

    // Step 2: persist the binary. `save` refuses to clobber an existing key,
    // so two requests racing to the same sanitized name cannot overwrite each
    // other; the loser disambiguates and writes under its own key. From here
    // on every binary this request touches is one it wrote itself.
    match files.save(&saved_filename, bytes).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            saved_filename = with_collision_suffix(&saved_filename);
            tracing::debug!(%saved_filename, "sanitized name collided on disk, suffixed");
            files.save(&saved_filename, bytes).await?;
        }
        Err(err) => return Err(err.into()),
    }

    // Step 3: canonical retrieval URL.
    let file_url = format!(
        "{}/pdfs/{}",
        public_base_url.trim_end_matches('/'),
        saved_filename
    );

    // Step 4: one atomic metadata transaction.
    let tags = parse_tags(tags_field);
    let new_file = NewFile {
        original_name: original_name.to_string(),
        custom_name: custom_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        saved_filename: saved_filename.clone(),
        file_url,
    };

    let record = match store.create_file_with_tags(new_file, &tags).await {
        Ok(record) => record,
        Err(err) => {
            // Compensating action: the binary this request just wrote must
            // not outlive its failed metadata transaction.
            if let Err(cleanup) = files.delete(&saved_filename).await {
                tracing::warn!(
                    %saved_filename,
                    error = %cleanup,
                    "failed to remove binary after aborted transaction"
                );
            }
            return Err(match err {
                MetadataError::Conflict(ConflictField::FileUrl) => UploadError::DuplicateUrl,
                MetadataError::Conflict(field) => UploadError::Conflict { field },
                other => UploadError::Store(other),
            });
        }
    };

    // Step 5: post-commit artifact. Failure here is partial success; the
    // committed row and the binary both stay.
    match artifact.generate(&record.file_url) {
        Ok(qr_data_url) => Ok(CommittedUpload {
            file: record,
            tags,
            qr_data_url,
        }),
        Err(source) => {
            tracing::error!(
                file_id = record.id,
                file_url = %record.file_url,
                error = %source,
                "upload committed but artifact generation failed"
            );
            Err(UploadError::ArtifactGeneration {
                file_id: record.id,
                file_url: record.file_url,
                source,
            })
        }
    }
}
