//! SQLite-backed persistent storage for web crawlers.
//!
//! This crate provides the three stores a crawling engine needs to survive a
//! restart: a response cache, a visited-request tracker and a persistent
//! cookie jar. Each store is an independent SQLite database and exposes the
//! same small lifecycle (`init`/`destroy`) around its own operations;
//! [`Storage`] composes all three under one base name for hosts that want a
//! single handle.
//!
//! # Architecture
//! - [`Cache`]: one row per URL holding the fetched response body.
//! - [`VisitTracker`]: one row per request ID; presence means "visited".
//! - [`CookieJar`]: one row per host holding its serialized cookie set, with
//!   name-keyed merge on write and expiry/secure filtering on read. This is
//!   the only store with real consistency hazards; see its module docs.
//!
//! Every operation opens and closes its own connection, so a store handle is
//! cheap to create and safe to share. The databases are plain files: deleting
//! them (or calling `destroy`) simply starts the crawl state from scratch.

mod cache;
mod db;
pub mod error;
mod jar;
mod storage;
mod visits;

pub use crate::cache::Cache;
pub use crate::jar::CookieJar;
pub use crate::storage::{AbortingCookieJar, HostCookieJar, Storage};
pub use crate::visits::VisitTracker;

// Re-exported so hosts don't have to pin matching versions themselves.
pub use cookie::Cookie;
pub use url::Url;
