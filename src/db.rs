//! Per-call SQLite connection and teardown helpers.
//!
//! Every store operation opens its own connection and closes it before
//! returning. That pays connection setup on each call, but call volume is
//! one cache/jar/tracker call per crawled URL, so bounded resource usage
//! wins over throughput here. Swapping in a shared pool later would not
//! change observable behaviour.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::Path;
use tokio::fs;

use crate::error::{ErrorKind, Result};

/// Open a connection to the database file at `path`, creating the file if
/// it does not exist yet.
pub(crate) async fn connect(path: &Path) -> Result<SqliteConnection> {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        // Connections are opened and closed per call, so WAL buys nothing
        // and its sidecar files would outlive `destroy`.
        .journal_mode(SqliteJournalMode::Delete)
        // PRAGMA synchronous = NORMAL (balance between safety and speed)
        .synchronous(SqliteSynchronous::Normal)
        // PRAGMA busy_timeout = 1500ms
        // Stores sharing one database file contend for the writer slot.
        .busy_timeout(std::time::Duration::from_millis(1500))
        .connect()
        .await
        .or_raise(|| ErrorKind::Database)
}

/// Create the directory hierarchy leading up to `path`, if any.
///
/// Called by every store's `init` so a base name like `./data/crawl` works
/// without the caller preparing `./data` first.
pub(crate) async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
    }
    Ok(())
}

/// Remove the database file at `path` if it no longer holds any tables.
///
/// Stores may share one database file (same base name), each owning its own
/// table. `destroy` drops only the calling store's table, then uses this to
/// delete the file once the last sibling is gone. Consumes the connection:
/// the file must be closed before it is unlinked so no journal lingers.
pub(crate) async fn remove_if_no_tables(mut conn: SqliteConnection, path: &Path) -> Result<()> {
    let tables: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
        .fetch_one(&mut conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    conn.close().await.or_raise(|| ErrorKind::Database)?;
    if tables == 0 {
        tracing::debug!(path = %path.display(), "removing empty database file");
        fs::remove_file(path).await.map_err(ErrorKind::Io)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.sqlite");
        let conn = connect(&path).await.unwrap();
        conn.close().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/store.sqlite");
        ensure_parent_dir(&path).await.unwrap();
        ensure_parent_dir(&path).await.unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_remove_if_no_tables_spares_populated_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("populated.sqlite");
        let mut conn = connect(&path).await.unwrap();
        sqlx::raw_sql("CREATE TABLE keep (id INTEGER PRIMARY KEY)")
            .execute(&mut conn)
            .await
            .unwrap();
        remove_if_no_tables(conn, &path).await.unwrap();
        assert!(path.exists());

        let mut conn = connect(&path).await.unwrap();
        sqlx::raw_sql("DROP TABLE keep").execute(&mut conn).await.unwrap();
        remove_if_no_tables(conn, &path).await.unwrap();
        assert!(!path.exists());
    }
}
