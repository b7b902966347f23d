//! Fakes shared by the service tests.

use async_trait::async_trait;
use facekeep_core::{DescriptorWindow, Embedding, EmbeddingExtractor, ExtractError, MatchPolicy, Profile};
use facekeep_store::{MemoryStore, ProfileStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A 2-d embedding at `v` on the first axis, so distances are easy to read.
pub fn emb(v: f32) -> Embedding {
    Embedding::new(vec![v, 0.0])
}

pub fn policy() -> MatchPolicy {
    MatchPolicy {
        embedding_dim: 2,
        ..MatchPolicy::default()
    }
}

enum Script {
    Face(Embedding),
    NoFace,
    Broken,
}

/// Extractor that answers from a table keyed by the image bytes.
#[derive(Default)]
pub struct ScriptedExtractor {
    script: HashMap<Vec<u8>, Script>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn face(mut self, image: &str, embedding: Embedding) -> Self {
        self.script.insert(image.as_bytes().to_vec(), Script::Face(embedding));
        self
    }

    pub fn no_face(mut self, image: &str) -> Self {
        self.script.insert(image.as_bytes().to_vec(), Script::NoFace);
        self
    }

    pub fn broken(mut self, image: &str) -> Self {
        self.script.insert(image.as_bytes().to_vec(), Script::Broken);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingExtractor for ScriptedExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Option<Embedding>, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(image) {
            Some(Script::Face(e)) => Ok(Some(e.clone())),
            Some(Script::NoFace) => Ok(None),
            Some(Script::Broken) => Err(ExtractError::Inference("scripted fault".into())),
            None => Err(ExtractError::Decode("unscripted image".into())),
        }
    }
}

/// Holds every extraction until [`GatedExtractor::release`] is called.
pub struct GatedExtractor {
    inner: ScriptedExtractor,
    entered: Notify,
    released: Notify,
}

impl GatedExtractor {
    pub fn new(inner: ScriptedExtractor) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Resolves once an extraction is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl EmbeddingExtractor for GatedExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Option<Embedding>, ExtractError> {
        self.entered.notify_one();
        self.released.notified().await;
        self.inner.extract(image).await
    }
}

/// Memory store with switchable faults per operation.
pub struct FailingStore {
    inner: MemoryStore,
    gets: bool,
    puts: bool,
    updates: bool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            gets: false,
            puts: false,
            updates: false,
        }
    }

    pub fn fail_gets(mut self) -> Self {
        self.gets = true;
        self
    }

    pub fn fail_puts(mut self) -> Self {
        self.puts = true;
        self
    }

    pub fn fail_updates(mut self) -> Self {
        self.updates = true;
        self
    }
}

fn injected() -> StoreError {
    let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    StoreError::Encode(cause)
}

#[async_trait]
impl ProfileStore for FailingStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        if self.gets {
            return Err(injected());
        }
        self.inner.get(id).await
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        if self.puts {
            return Err(injected());
        }
        self.inner.put(profile).await
    }

    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError> {
        if self.updates {
            return Err(injected());
        }
        self.inner.update_window(id, window).await
    }
}

/// Memory store that yields between reading and writing, widening any
/// lost-update window.
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ProfileStore for SlowStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let profile = self.inner.get(id).await;
        tokio::time::sleep(self.delay).await;
        profile
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        self.inner.put(profile).await
    }

    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_window(id, window).await
    }
}

/// Memory store that parks every `update_window` until
/// [`GatedStore::release`] is called.
pub struct GatedStore {
    inner: MemoryStore,
    entered: Notify,
    released: Notify,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    /// Resolves once a window write is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl ProfileStore for GatedStore {
    async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        self.inner.get(id).await
    }

    async fn put(&self, profile: &Profile) -> Result<(), StoreError> {
        self.inner.put(profile).await
    }

    async fn update_window(&self, id: &str, window: &DescriptorWindow) -> Result<(), StoreError> {
        self.entered.notify_one();
        self.released.notified().await;
        self.inner.update_window(id, window).await
    }
}
