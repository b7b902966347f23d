//! SQLite profile store.
//!
//! One row per identity; the descriptor window is a JSON array of arrays.
//! All statements run on tokio-rusqlite's background connection thread.

use crate::{ProfileStore, StoreError};
use async_trait::async_trait;
use facekeep_core::{DescriptorWindow, Profile};
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id            TEXT PRIMARY KEY NOT NULL,
    label         TEXT NOT NULL,
    descriptors   TEXT NOT NULL,
    enrollment_id TEXT NOT NULL,
    enrolled_at   TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
";

/// Undecoded `profiles` row.
struct ProfileRow {
    id: String,
    label: String,
    descriptors: String,
    enrollment_id: String,
    enrolled_at: String,
}

impl ProfileRow {
    fn decode(self) -> Result<Profile, StoreError> {
        let window: DescriptorWindow =
            serde_json::from_str(&self.descriptors).map_err(|source| StoreError::Corrupt {
                id: self.id.clone(),
                source,
            })?;
        Ok(Profile {
            id: self.id,
            label: self.label,
            window,
            enrollment_id: self.enrollment_id,
            enrolled_at: self.enrolled_at,
        })
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        tracing::info!(path = %path.as_ref().display(), "opened profile database");
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|c| {
            c.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn encode(window: &DescriptorWindow) -> Result<String, StoreError> {
    serde_json::to_string(window).map_err(StoreError::Encode)
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let key = id.to_string();
        let row = self
            .conn
            .call(move |c| {
                let row = c
                    .query_row(
                        "SELECT id, label, descriptors, enrollment_id, enrolled_at
                         FROM profiles WHERE id = ?1",
                        params![key],
                        |r| {
                            Ok(ProfileRow {
                                id: r.get(0)?,
                                label: r.get(1)?,
                                descriptors: r.get(2)?,
                                enrollment_id: r.get(3)?,
                                enrolled_at: r.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(ProfileRow::decode).transpose()
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        let descriptors = encode(&profile.window)?;
        let profile = profile.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |c| {
                c.execute(
                    "INSERT INTO profiles (id, label, descriptors, enrollment_id, enrolled_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                         label = excluded.label,
                         descriptors = excluded.descriptors,
                         enrollment_id = excluded.enrollment_id,
                         enrolled_at = excluded.enrolled_at,
                         updated_at = excluded.updated_at",
                    params![
                        profile.id,
                        profile.label,
                        descriptors,
                        profile.enrollment_id,
                        profile.enrolled_at,
                        now
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError> {
        let descriptors = encode(window)?;
        let key = id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |c| {
                let n = c.execute(
                    "UPDATE profiles SET descriptors = ?2, updated_at = ?3 WHERE id = ?1",
                    params![key, descriptors, now],
                )?;
                Ok(n)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[tokio::test]
    async fn test_contract() {
        contract::get_missing_is_none(&SqliteStore::open_in_memory().await.unwrap()).await;
        contract::put_then_get(&SqliteStore::open_in_memory().await.unwrap()).await;
        contract::put_replaces_whole_profile(&SqliteStore::open_in_memory().await.unwrap()).await;
        contract::update_window_keeps_identity_fields(&SqliteStore::open_in_memory().await.unwrap())
            .await;
        contract::update_window_missing_writes_nothing(&SqliteStore::open_in_memory().await.unwrap())
            .await;
        contract::empty_window_round_trips(&SqliteStore::open_in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_profiles_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.db");

        let profile = Profile::enrolled("u1", "alice", contract::window(&[0.25, 0.5]));
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.put(&profile).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("u1").await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_corrupt_descriptors_are_reported() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .conn
            .call(|c| {
                c.execute(
                    "INSERT INTO profiles VALUES ('u1', 'alice', 'not json', 'e1', 'now', 'now')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.get("u1").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "u1"));
    }
}
