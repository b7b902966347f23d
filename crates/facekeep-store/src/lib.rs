//! facekeep-store: Profile persistence.
//!
//! Defines the [`ProfileStore`] contract used by enrollment and matching,
//! with an in-memory backend and a SQLite backend.

use async_trait::async_trait;
use facekeep_core::{DescriptorWindow, Profile};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no profile for identity {0:?}")]
    NotFound(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("corrupt descriptor window for {id:?}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode descriptor window: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Keyed profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    /// Create or fully replace the profile stored under `profile.id`.
    async fn put(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Replace only the window of an existing profile.
    ///
    /// Fails with [`StoreError::NotFound`], writing nothing, if `id` is absent.
    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError>;
}
