//! Key-value persistence used by the tracker and overlay settings.
//! The main realization is [file_store::FileStore]:
//!  - Every key is stored in its own json file inside a store directory.
//!  - Writes replace the whole file atomically, so readers never observe partial values.
//!  - Older shapes of the tracker blob are understood through [entities].

use anyhow::Result;
use async_trait::async_trait;

pub mod entities;
pub mod file_store;

/// Async get/set/remove of a single serialized value by key. Every call may fail, callers
/// decide whether the failure matters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
