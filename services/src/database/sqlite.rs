//! SQLite-backed metadata store.

use super::{ConflictField, FileRecord, MetadataError, MetadataResult, MetadataStore, NewFile};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Three-table schema: files, tags, and the file_tags join table. Cascading
/// deletes on the join table are a safety net; this service never deletes.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_name TEXT,
    custom_name TEXT,
    saved_filename TEXT UNIQUE,
    file_url TEXT UNIQUE,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS file_tags (
    file_id INTEGER,
    tag_id INTEGER,
    PRIMARY KEY (file_id, tag_id),
    FOREIGN KEY (file_id) REFERENCES files (id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags (id) ON DELETE CASCADE
);
"#;

/// SQLite metadata store with an explicit lifecycle: opened once at process
/// start and passed by handle, never looked up through a global.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        // SQLite permits limited write concurrency; a single connection keeps
        // the single-writer assumption honest under axum concurrency.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Map a SQLite UNIQUE-constraint failure onto the column that caused it.
fn map_unique_violation(err: sqlx::Error) -> MetadataError {
    if let sqlx::Error::Database(ref db_err) = err {
        let msg = db_err.message();
        if msg.contains("UNIQUE constraint failed") {
            if msg.contains("files.saved_filename") {
                return MetadataError::Conflict(ConflictField::SavedFilename);
            }
            if msg.contains("files.file_url") {
                return MetadataError::Conflict(ConflictField::FileUrl);
            }
            if msg.contains("tags.name") {
                return MetadataError::Conflict(ConflictField::TagName);
            }
        }
    }
    MetadataError::Database(err)
}

/// Insert the file row, distinguishing which unique column conflicted.
async fn insert_file(conn: &mut SqliteConnection, file: &NewFile) -> MetadataResult<i64> {
    let result = sqlx::query(
        "INSERT INTO files (original_name, custom_name, saved_filename, file_url)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&file.original_name)
    .bind(&file.custom_name)
    .bind(&file.saved_filename)
    .bind(&file.file_url)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(err) => Err(map_unique_violation(err)),
    }
}

/// Race-safe get-or-create: attempt-insert, ignore conflict, read by name.
/// Stays inside the caller's transaction.
async fn get_or_create_tag(conn: &mut SqliteConnection, name: &str) -> MetadataResult<i64> {
    sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let (tag_id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(tag_id)
}

/// Idempotent pair insert: a no-op when the association already exists.
async fn link_file_tag(conn: &mut SqliteConnection, file_id: i64, tag_id: i64) -> MetadataResult<()> {
    sqlx::query("INSERT OR IGNORE INTO file_tags (file_id, tag_id) VALUES (?, ?)")
        .bind(file_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl MetadataStore for SqliteStore {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn create_file_with_tags(
        &self,
        file: NewFile,
        tags: &[String],
    ) -> MetadataResult<FileRecord> {
        let mut tx = self.pool.begin().await?;

        // Abort on a pre-existing URL without writing anything. The UNIQUE
        // constraint still backstops the race between this check and the
        // insert; both paths report the same conflict category.
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM files WHERE file_url = ?")
            .bind(&file.file_url)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(MetadataError::Conflict(ConflictField::FileUrl));
        }

        let file_id = insert_file(&mut *tx, &file).await?;

        for name in tags {
            let tag_id = get_or_create_tag(&mut *tx, name).await?;
            link_file_tag(&mut *tx, file_id, tag_id).await?;
        }

        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn list_tag_names(&self) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn get_file(&self, id: i64) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn tags_for_file(&self, id: i64) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t
             INNER JOIN file_tags ft ON t.id = ft.tag_id
             WHERE ft.file_id = ?
             ORDER BY t.name ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("test.db"))
            .await
            .expect("store opens");
        (dir, store)
    }

    fn new_file(name: &str) -> NewFile {
        NewFile {
            original_name: format!("{name}.pdf"),
            custom_name: None,
            saved_filename: format!("{name}.pdf"),
            file_url: format!("http://127.0.0.1:3001/pdfs/{name}.pdf"),
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let (_dir, store) = open_temp_store().await;

        let record = store
            .create_file_with_tags(new_file("report"), &["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(record.saved_filename, "report.pdf");
        assert!(!record.created_at.is_empty());

        let fetched = store.get_file(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(store.tags_for_file(record.id).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn duplicate_file_url_is_a_distinct_conflict() {
        let (_dir, store) = open_temp_store().await;

        store.create_file_with_tags(new_file("dup"), &[]).await.unwrap();

        let mut second = new_file("dup");
        second.saved_filename = "dup_2.pdf".to_string();
        let err = store.create_file_with_tags(second, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Conflict(ConflictField::FileUrl)
        ));
    }

    #[tokio::test]
    async fn duplicate_saved_filename_is_reported_per_column() {
        let (_dir, store) = open_temp_store().await;

        store.create_file_with_tags(new_file("same"), &[]).await.unwrap();

        let mut second = new_file("same");
        second.file_url = "http://127.0.0.1:3001/pdfs/other.pdf".to_string();
        let err = store.create_file_with_tags(second, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Conflict(ConflictField::SavedFilename)
        ));
    }

    #[tokio::test]
    async fn conflict_rolls_back_everything() {
        let (_dir, store) = open_temp_store().await;

        store.create_file_with_tags(new_file("first"), &[]).await.unwrap();

        // Same saved_filename, different URL: the insert fails after the
        // URL pre-check passed, so the whole transaction must roll back.
        let mut second = new_file("first");
        second.file_url = "http://127.0.0.1:3001/pdfs/unique.pdf".to_string();
        let err = store
            .create_file_with_tags(second, &["orphan".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Conflict(_)));

        // No tag row leaked from the rolled-back transaction.
        assert!(store.list_tag_names().await.unwrap().is_empty());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn tags_are_shared_across_files() {
        let (_dir, store) = open_temp_store().await;

        let first = store
            .create_file_with_tags(new_file("one"), &["shared".to_string(), "x".to_string()])
            .await
            .unwrap();
        let second = store
            .create_file_with_tags(new_file("two"), &["shared".to_string(), "y".to_string()])
            .await
            .unwrap();

        // One tag row per distinct name, regardless of how many files cite it.
        assert_eq!(
            store.list_tag_names().await.unwrap(),
            vec!["shared", "x", "y"]
        );
        assert_eq!(store.tags_for_file(first.id).await.unwrap(), vec!["shared", "x"]);
        assert_eq!(store.tags_for_file(second.id).await.unwrap(), vec!["shared", "y"]);
    }

    #[tokio::test]
    async fn repeated_tag_names_link_once() {
        let (_dir, store) = open_temp_store().await;

        let record = store
            .create_file_with_tags(
                new_file("dups"),
                &["a".to_string(), "a".to_string(), "a".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(store.tags_for_file(record.id).await.unwrap(), vec!["a"]);

        let (links,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_tags WHERE file_id = ?")
            .bind(record.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn empty_tag_list_is_valid() {
        let (_dir, store) = open_temp_store().await;

        let record = store.create_file_with_tags(new_file("bare"), &[]).await.unwrap();
        assert!(store.tags_for_file(record.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tag_listing_is_alphabetical() {
        let (_dir, store) = open_temp_store().await;

        store
            .create_file_with_tags(
                new_file("sorted"),
                &["zebra".to_string(), "Alpha".to_string(), "mango".to_string()],
            )
            .await
            .unwrap();

        // SQLite's default BINARY collation: uppercase sorts first.
        assert_eq!(
            store.list_tag_names().await.unwrap(),
            vec!["Alpha", "mango", "zebra"]
        );
    }

    #[tokio::test]
    async fn deleting_a_file_cascades_to_associations() {
        let (_dir, store) = open_temp_store().await;

        let record = store
            .create_file_with_tags(new_file("doomed"), &["t".to_string()])
            .await
            .unwrap();

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(record.id)
            .execute(store.pool())
            .await
            .unwrap();

        let (links,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_tags")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(links, 0);

        // Tag rows survive; only the association is removed.
        assert_eq!(store.list_tag_names().await.unwrap(), vec!["t"]);
    }
}
