//! Visited-request tracker.
//!
//! Pure existence-set semantics: a row for an ID means the crawler already
//! processed that request. SQLite has no unsigned 64-bit column type, so IDs
//! are stored bit-cast to `i64` and cast back on the way out; the mapping is
//! lossless and never crosses an API boundary.

use exn::ResultExt;
use sqlx::Connection;
use std::path::{Path, PathBuf};
use time::UtcDateTime;

use crate::db;
use crate::error::{ErrorKind, Result, is_unique_violation};

const CREATE_VISIT_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS visit (
        id              INTEGER NOT NULL UNIQUE,
        created_at      INTEGER NOT NULL,
        PRIMARY KEY (id)
    );
    CREATE INDEX IF NOT EXISTS idx_visit_created_at ON visit(created_at);
"#;
const DROP_VISIT_DDL: &str = r#"
    DROP INDEX IF EXISTS idx_visit_created_at;
    DROP TABLE IF EXISTS visit;
"#;

/// SQLite-backed record of which request IDs have been visited.
#[derive(Debug, Clone)]
pub struct VisitTracker {
    path: PathBuf,
}

impl VisitTracker {
    /// Create a tracker handle for the given base name (`.sqlite` appended).
    pub fn new(base: impl AsRef<Path>) -> Self {
        let mut path = base.as_ref().as_os_str().to_os_string();
        path.push(".sqlite");
        Self { path: PathBuf::from(path) }
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotently create the backing file, table and index.
    pub async fn init(&self) -> Result<()> {
        db::ensure_parent_dir(&self.path).await?;
        let mut conn = db::connect(&self.path).await?;
        sqlx::raw_sql(CREATE_VISIT_DDL)
            .execute(&mut conn)
            .await
            .or_raise(|| ErrorKind::Schema)?;
        conn.close().await.or_raise(|| ErrorKind::Database)
    }

    /// Drop the visit table and index; remove the database file if no
    /// sibling store still keeps a table in it.
    pub async fn destroy(&self) -> Result<()> {
        let mut conn = db::connect(&self.path).await?;
        sqlx::raw_sql(DROP_VISIT_DDL)
            .execute(&mut conn)
            .await
            .or_raise(|| ErrorKind::Schema)?;
        db::remove_if_no_tables(conn, &self.path).await
    }

    /// Record that `request_id` has been visited.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Duplicate`] if the ID was already recorded.
    /// Callers are expected to check [`is_visited`](Self::is_visited) first
    /// rather than re-record.
    pub async fn visited(&self, request_id: u64) -> Result<()> {
        let mut conn = db::connect(&self.path).await?;
        let result = sqlx::query("INSERT INTO visit (id, created_at) VALUES (?, ?)")
            .bind(request_id as i64)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut conn)
            .await;
        conn.close().await.or_raise(|| ErrorKind::Database)?;
        if let Err(err) = result {
            if is_unique_violation(&err) {
                exn::bail!(ErrorKind::Duplicate(request_id.to_string()));
            }
            return Err(err).or_raise(|| ErrorKind::Database);
        }
        Ok(())
    }

    /// Whether `request_id` has been recorded as visited.
    pub async fn is_visited(&self, request_id: u64) -> Result<bool> {
        let mut conn = db::connect(&self.path).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM visit WHERE id = ?")
            .bind(request_id as i64)
            .fetch_one(&mut conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        conn.close().await.or_raise(|| ErrorKind::Database)?;
        Ok(count == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = VisitTracker::new(dir.path().join("crawl-visits"));
        tracker.init().await.unwrap();
        assert!(tracker.path().exists());
        tracker.destroy().await.unwrap();
        assert!(!tracker.path().exists());
    }

    #[tokio::test]
    async fn test_tracks_visits() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = VisitTracker::new(dir.path().join("crawl-visits"));
        tracker.init().await.unwrap();

        tracker.visited(12345).await.unwrap();
        assert!(tracker.is_visited(12345).await.unwrap());
        assert!(!tracker.is_visited(123).await.unwrap());
    }

    #[tokio::test]
    async fn test_revisit_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = VisitTracker::new(dir.path().join("crawl-visits"));
        tracker.init().await.unwrap();

        tracker.visited(42).await.unwrap();
        let err = tracker.visited(42).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_ids_above_i64_max_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = VisitTracker::new(dir.path().join("crawl-visits"));
        tracker.init().await.unwrap();

        let id = u64::MAX - 7;
        tracker.visited(id).await.unwrap();
        assert!(tracker.is_visited(id).await.unwrap());
        assert!(!tracker.is_visited(u64::MAX).await.unwrap());
    }
}
