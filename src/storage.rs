//! Storage facade composing the three stores under one lifecycle, plus the
//! no-error cookie jar view expected by crawler hosts.

use async_trait::async_trait;
use cookie::Cookie;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::cache::Cache;
use crate::error::Result;
use crate::jar::CookieJar;
use crate::visits::VisitTracker;

/// The cookie jar capability a crawler host expects: no error channel.
///
/// Mirrors the shape of an in-memory jar, where operations cannot fail. A
/// persistent jar can fail, so implementors of this trait must decide what
/// to do with errors they cannot return; see [`AbortingCookieJar`].
#[async_trait]
pub trait HostCookieJar: Send + Sync {
    /// Cookies applicable to a request for `url`.
    async fn cookies(&self, url: &Url) -> Vec<Cookie<'static>>;
    /// Store cookies received in a response for `url`.
    async fn set_cookies(&self, url: &Url, cookies: Vec<Cookie<'static>>);
}

/// Composite store for a crawler: visit tracker, cookie jar and response
/// cache sharing one base name.
///
/// `Storage::new("./data/crawl")` owns `./data/crawl-visits.sqlite`,
/// `./data/crawl-cookies.sqlite` and `./data/crawl-cache.sqlite`. The three
/// stores never interact with one another; this type only ties their
/// lifecycles together and forwards their operations.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
    visits: VisitTracker,
    jar: Arc<CookieJar>,
    cache: Cache,
}

impl Storage {
    /// Create a composite store handle for the given base name.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            path: base.to_path_buf(),
            visits: VisitTracker::new(suffixed(base, "-visits")),
            jar: Arc::new(CookieJar::new(suffixed(base, "-cookies"))),
            cache: Cache::new(suffixed(base, "-cache")),
        }
    }

    /// Base name the substores derive their file names from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initialize all substores, in a fixed order, stopping at the first
    /// failure.
    pub async fn init(&self) -> Result<()> {
        self.visits.init().await?;
        self.jar.init().await?;
        self.cache.init().await
    }

    /// Destroy all substores. Every substore is attempted even after a
    /// failure; only the first error is returned, later ones are discarded.
    pub async fn destroy(&self) -> Result<()> {
        let visits = self.visits.destroy().await;
        let jar = self.jar.destroy().await;
        let cache = self.cache.destroy().await;
        visits.and(jar).and(cache)
    }

    /// The visit tracker substore.
    pub fn visits(&self) -> &VisitTracker {
        &self.visits
    }

    /// The cookie jar substore, with its error-returning interface.
    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    /// The response cache substore.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The host-facing cookie jar view. Any storage error inside it
    /// terminates the process; see [`AbortingCookieJar`].
    pub fn cookie_jar(&self) -> AbortingCookieJar {
        AbortingCookieJar { jar: Arc::clone(&self.jar) }
    }

    /// Record that `request_id` has been visited.
    pub async fn visited(&self, request_id: u64) -> Result<()> {
        self.visits.visited(request_id).await
    }

    /// Whether `request_id` has been recorded as visited.
    pub async fn is_visited(&self, request_id: u64) -> Result<bool> {
        self.visits.is_visited(request_id).await
    }

    /// Fetch the cached payload for `url`.
    pub async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.cache.get(url).await
    }

    /// Cache a payload for `url`.
    pub async fn put(&self, url: &str, data: &[u8]) -> Result<()> {
        self.cache.put(url, data).await
    }

    /// Drop the cached payload for `url`.
    pub async fn remove(&self, url: &str) -> Result<()> {
        self.cache.remove(url).await
    }

    /// Cookies applicable to a request for `url`.
    pub async fn cookies(&self, url: &Url) -> Result<Vec<Cookie<'static>>> {
        self.jar.cookies(url).await
    }

    /// Store cookies for `url`'s host, merging with any stored set.
    pub async fn set_cookies(&self, url: &Url, cookies: Vec<Cookie<'static>>) -> Result<()> {
        self.jar.set_cookies(url, cookies).await
    }
}

/// Compatibility shim fitting the persistent [`CookieJar`] into the
/// no-error [`HostCookieJar`] capability.
///
/// The host contract leaves nowhere for a storage error to go, so this
/// adapter logs the error and terminates the process. That is an accepted
/// limitation of the host integration, not a pattern to copy: a host that
/// can handle a `Result`-returning jar should use [`CookieJar`] directly.
#[derive(Debug, Clone)]
pub struct AbortingCookieJar {
    jar: Arc<CookieJar>,
}

impl AbortingCookieJar {
    /// Wrap a jar in the aborting adapter.
    pub fn new(jar: Arc<CookieJar>) -> Self {
        Self { jar }
    }
}

#[async_trait]
impl HostCookieJar for AbortingCookieJar {
    async fn cookies(&self, url: &Url) -> Vec<Cookie<'static>> {
        match self.jar.cookies(url).await {
            Ok(cookies) => cookies,
            Err(err) => {
                tracing::error!(%url, "cookie jar read failed, aborting: {err}");
                std::process::exit(1);
            }
        }
    }

    async fn set_cookies(&self, url: &Url, cookies: Vec<Cookie<'static>>) {
        if let Err(err) = self.jar.set_cookies(url, cookies).await {
            tracing::error!(%url, "cookie jar write failed, aborting: {err}");
            std::process::exit(1);
        }
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_destroy_cover_all_substores() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("crawl"));
        storage.init().await.unwrap();
        assert!(dir.path().join("crawl-visits.sqlite").exists());
        assert!(dir.path().join("crawl-cookies.sqlite").exists());
        assert!(dir.path().join("crawl-cache.sqlite").exists());

        storage.destroy().await.unwrap();
        assert!(!dir.path().join("crawl-visits.sqlite").exists());
        assert!(!dir.path().join("crawl-cookies.sqlite").exists());
        assert!(!dir.path().join("crawl-cache.sqlite").exists());
    }

    #[tokio::test]
    async fn test_substores_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("crawl"));
        storage.init().await.unwrap();

        let url = Url::parse("http://example.org/page").unwrap();
        storage.visited(1).await.unwrap();
        storage.put(url.as_str(), b"<html></html>").await.unwrap();
        storage
            .set_cookies(&url, vec![Cookie::new("session", "abc123")])
            .await
            .unwrap();

        assert!(storage.is_visited(1).await.unwrap());
        assert_eq!(storage.get(url.as_str()).await.unwrap(), Some(b"<html></html>".to_vec()));
        let cookies = storage.cookies(&url).await.unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), "session");
    }

    #[tokio::test]
    async fn test_host_jar_view_round_trips_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("crawl"));
        storage.init().await.unwrap();

        let view = storage.cookie_jar();
        let url = Url::parse("https://example.org").unwrap();
        HostCookieJar::set_cookies(&view, &url, vec![Cookie::new("a", "1")]).await;
        let got = HostCookieJar::cookies(&view, &url).await;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name(), "a");
    }

    #[tokio::test]
    async fn test_shared_base_name_destroys_cleanly() {
        // Two stores pointed at the same base share one database file; the
        // file survives until the last table is dropped.
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("shared");
        let cache = Cache::new(&base);
        let jar = CookieJar::new(&base);
        cache.init().await.unwrap();
        jar.init().await.unwrap();
        assert_eq!(cache.path(), jar.path());

        cache.destroy().await.unwrap();
        assert!(jar.path().exists());
        jar.destroy().await.unwrap();
        assert!(!jar.path().exists());
    }
}
