//! In-process profile store.

use crate::{ProfileStore, StoreError};
use async_trait::async_trait;
use facekeep_core::{DescriptorWindow, Profile};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Profiles held in a map behind an async lock. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        profile.window = window.clone();
        Ok(())
    }
}
