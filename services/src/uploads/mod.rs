//! Upload handling: binary persistence plus the upload transaction.

mod coordinator;
mod store;

pub use coordinator::{CommittedUpload, UploadError, store_upload};
pub use store::UploadStore;
