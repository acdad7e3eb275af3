//! Metadata store: files, tags, and their many-to-many association.
//!
//! The store owns the on-disk SQLite database and is its sole mutator. All
//! writes happen inside explicit transactions; handlers only see committed
//! state. Uniqueness of `saved_filename` and `file_url` is enforced by the
//! engine's UNIQUE constraints, and violations are reported per column so
//! callers can tell a rename-and-retry conflict from a real fault.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use thiserror::Error;

mod sqlite;

pub use sqlite::SqliteStore;

/// Which unique column a constraint violation hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictField {
    SavedFilename,
    FileUrl,
    TagName,
}

impl Display for ConflictField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictField::SavedFilename => write!(f, "saved_filename"),
            ConflictField::FileUrl => write!(f, "file_url"),
            ConflictField::TagName => write!(f, "tag name"),
        }
    }
}

/// Metadata store operation errors.
///
/// Conflicts represent legitimate duplicate submissions and are never
/// retried; any other fault propagates as fatal to the request.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("{0} already exists")]
    Conflict(ConflictField),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// A stored document row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub original_name: String,
    pub custom_name: Option<String>,
    pub saved_filename: String,
    pub file_url: String,
    pub created_at: String,
}

/// Input for a file insert. `saved_filename` and `file_url` must be unique
/// across the whole store; the transaction reports which one collided.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_name: String,
    pub custom_name: Option<String>,
    pub saved_filename: String,
    pub file_url: String,
}

/// Transactional storage for file metadata and tag associations.
pub trait MetadataStore: Clone + Send + Sync + 'static {
    /// Connectivity probe for the health endpoint.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Insert a file row and its tag associations in one atomic unit.
    ///
    /// Tag names are get-or-created (insert-ignore then select) and linked
    /// inside the same transaction as the file insert; any failure rolls the
    /// whole unit back. A pre-existing `file_url` aborts with
    /// `Conflict(FileUrl)` before anything is written.
    fn create_file_with_tags(
        &self,
        file: NewFile,
        tags: &[String],
    ) -> impl Future<Output = MetadataResult<FileRecord>> + Send;

    /// All distinct tag names, alphabetically ascending.
    fn list_tag_names(&self) -> impl Future<Output = MetadataResult<Vec<String>>> + Send;

    /// Fetch a file row by id.
    fn get_file(&self, id: i64) -> impl Future<Output = MetadataResult<Option<FileRecord>>> + Send;

    /// Tag names associated with a file, alphabetically ascending.
    fn tags_for_file(&self, id: i64)
    -> impl Future<Output = MetadataResult<Vec<String>>> + Send;
}
