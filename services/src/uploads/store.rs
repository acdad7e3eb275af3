//! Filesystem home for uploaded binaries.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Owns the uploads directory. The upload coordinator is the only writer and
/// the only deleter; deletes happen solely as compensating actions, scoped to
/// the file the same request just wrote.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Create the store, making the uploads directory if missing.
    pub async fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The directory served statically under `/pdfs`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage key, rejecting anything that could escape the root.
    /// Keys are single sanitized filenames, so any separator is hostile.
    fn key_path(&self, key: &str) -> io::Result<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe storage key: {key}"),
            ));
        }
        Ok(self.root.join(key))
    }

    pub async fn exists(&self, key: &str) -> io::Result<bool> {
        let path = self.key_path(key)?;
        fs::try_exists(&path).await
    }

    /// Write a new file under `key`. An existing key is a hard
    /// `AlreadyExists` error; two writers racing to the same key can never
    /// overwrite each other, the loser must pick another key.
    pub async fn save(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.key_path(key)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }

    pub async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.key_path(key)?;
        fs::remove_file(&path).await
    }

    pub async fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        let path = self.key_path(key)?;
        fs::read(&path).await
    }
}
