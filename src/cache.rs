//! Response cache store.
//!
//! One row per URL holding the fetched response body and a creation
//! timestamp. The `created_at` index exists to support time-based eviction
//! later; no current operation queries it.

use exn::ResultExt;
use sqlx::Connection;
use std::path::{Path, PathBuf};
use time::UtcDateTime;

use crate::db;
use crate::error::{ErrorKind, Result, is_unique_violation};

const CREATE_CACHE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS cache (
        url             TEXT NOT NULL UNIQUE,
        data            BLOB,
        created_at      INTEGER NOT NULL,
        PRIMARY KEY (url)
    );
    CREATE INDEX IF NOT EXISTS idx_cache_created_at ON cache(created_at);
"#;
const DROP_CACHE_DDL: &str = r#"
    DROP INDEX IF EXISTS idx_cache_created_at;
    DROP TABLE IF EXISTS cache;
"#;

/// SQLite-backed response cache keyed by URL.
///
/// At most one record exists per URL. `put` is a plain insert: re-caching a
/// URL requires a `remove` first, or treating the duplicate error as benign.
#[derive(Debug, Clone)]
pub struct Cache {
    path: PathBuf,
}

impl Cache {
    /// Create a cache handle for the given base name.
    ///
    /// A `.sqlite` extension is appended, so `Cache::new("./data/crawl")`
    /// stores into `./data/crawl.sqlite`. Nothing touches the filesystem
    /// until [`init`](Self::init).
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
        sqlx::raw_sql(CREATE_CACHE_DDL)
            .execute(&mut conn)
            .await
            .or_raise(|| ErrorKind::Schema)?;
        conn.close().await.or_raise(|| ErrorKind::Database)
    }

    /// Drop the cache table and index; remove the database file if no
    /// sibling store still keeps a table in it.
    pub async fn destroy(&self) -> Result<()> {
        let mut conn = db::connect(&self.path).await?;
        sqlx::raw_sql(DROP_CACHE_DDL)
            .execute(&mut conn)
            .await
            .or_raise(|| ErrorKind::Schema)?;
        db::remove_if_no_tables(conn, &self.path).await
    }

    /// Fetch the cached payload for `url`.
    ///
    /// An absent record is `Ok(None)`, not an error.
    pub async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = db::connect(&self.path).await?;
        let data = sqlx::query_scalar("SELECT data FROM cache WHERE url = ?")
            .bind(url)
            .fetch_optional(&mut conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        conn.close().await.or_raise(|| ErrorKind::Database)?;
        Ok(data)
    }

    /// Insert a payload for `url` with the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Duplicate`] if a record for `url` already
    /// exists; there is no implicit upsert.
    pub async fn put(&self, url: &str, data: &[u8]) -> Result<()> {
        let mut conn = db::connect(&self.path).await?;
        let result = sqlx::query("INSERT INTO cache (url, data, created_at) VALUES (?, ?, ?)")
            .bind(url)
            .bind(data)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut conn)
            .await;
        conn.close().await.or_raise(|| ErrorKind::Database)?;
        if let Err(err) = result {
            if is_unique_violation(&err) {
                exn::bail!(ErrorKind::Duplicate(url.to_string()));
            }
            return Err(err).or_raise(|| ErrorKind::Database);
        }
        Ok(())
    }

    /// Delete the record for `url`. Succeeds even when no record exists.
    pub async fn remove(&self, url: &str) -> Result<()> {
        let mut conn = db::connect(&self.path).await?;
        sqlx::query("DELETE FROM cache WHERE url = ?")
            .bind(url)
            .execute(&mut conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
        conn.close().await.or_raise(|| ErrorKind::Database)
    }
}
