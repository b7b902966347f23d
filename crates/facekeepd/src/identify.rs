use crate::locks::IdentityLocks;
use facekeep_core::{
    Embedding, EmbeddingExtractor, EuclideanMatcher, ExtractError, MatchPolicy, MatchVerdict, Matcher,
    Profile,
};
use facekeep_store::{ProfileStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("no profile enrolled for {0:?}")]
    UnknownIdentity(String),
    #[error("no face detected in probe image")]
    NoFaceDetected,
    #[error("extraction failed: {0}")]
    ExtractionFailure(#[from] ExtractError),
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

/// What happened to the stored window after scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowUpdate {
    /// Best distance above the update threshold; nothing written.
    NotEligible,
    /// Probe appended; the window now holds `len` embeddings.
    Applied { len: usize },
    /// The profile was re-enrolled (or removed) after scoring; the probe was dropped.
    Superseded,
    /// Persisting the grown window failed. The verdict still stands.
    Failed(String),
}

impl WindowUpdate {
    /// Stable outcome name for clients.
    pub fn token(&self) -> &'static str {
        match self {
            WindowUpdate::NotEligible => "not-eligible",
            WindowUpdate::Applied { .. } => "applied",
            WindowUpdate::Superseded => "superseded",
            WindowUpdate::Failed(_) => "failed",
        }
    }

    /// Window length when applied, the error when failed, otherwise empty.
    pub fn detail(&self) -> String {
        match self {
            WindowUpdate::Applied { len } => len.to_string(),
            WindowUpdate::Failed(reason) => reason.clone(),
            WindowUpdate::NotEligible | WindowUpdate::Superseded => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Identification {
    pub verdict: MatchVerdict,
    pub update: WindowUpdate,
}

/// Scores probes against a claimed identity and absorbs close matches.
#[derive(Clone)]
pub struct MatchingService {
    extractor: Arc<dyn EmbeddingExtractor>,
    store: Arc<dyn ProfileStore>,
    locks: IdentityLocks,
    policy: MatchPolicy,
}

impl MatchingService {
    pub fn new(
        extractor: Arc<dyn EmbeddingExtractor>,
        store: Arc<dyn ProfileStore>,
        locks: IdentityLocks,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            extractor,
            store,
            locks,
            policy,
        }
    }

    /// Identify `image` against the profile enrolled for `user_id`.
    ///
    /// The window update, when eligible, is persisted before returning.
    /// Its outcome never changes the verdict.
    pub async fn identify(&self, image: &[u8], user_id: &str) -> Result<Identification, MatchError> {
        if user_id.trim().is_empty() {
            return Err(MatchError::InvalidInput("user id is empty"));
        }
        if image.is_empty() {
            return Err(MatchError::InvalidInput("image is empty"));
        }

        let profile = self
            .store
            .get(user_id)
            .await?
            .ok_or_else(|| MatchError::UnknownIdentity(user_id.to_string()))?;

        let probe = self
            .extractor
            .extract(image)
            .await?
            .ok_or(MatchError::NoFaceDetected)?;
        self.policy.check_dimension(&probe)?;

        let verdict = EuclideanMatcher.compare(&probe, &profile, &self.policy);
        tracing::info!(
            user_id,
            matched = verdict.matched,
            distance = verdict.distance,
            window = profile.window.len(),
            "identify scored"
        );

        let update = if self.policy.admits_update(verdict.distance) {
            self.absorb(&profile, probe).await
        } else {
            WindowUpdate::NotEligible
        };

        Ok(Identification { verdict, update })
    }

    /// Append `probe` to the stored window under the identity lock.
    ///
    /// Re-reads the profile so concurrent absorbs stack instead of
    /// overwriting each other, and drops the probe if the identity was
    /// re-enrolled after `scored` was read.
    async fn absorb(&self, scored: &Profile, probe: Embedding) -> WindowUpdate {
        let user_id = scored.id.as_str();
        let _guard = self.locks.lock(user_id).await;

        let current = match self.store.get(user_id).await {
            Ok(Some(p)) if p.enrollment_id == scored.enrollment_id => p,
            Ok(_) => {
                tracing::info!(user_id, "profile re-enrolled since scoring; dropping probe");
                return WindowUpdate::Superseded;
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "window update failed: re-read");
                return WindowUpdate::Failed(e.to_string());
            }
        };

        let window = current.window.append(probe, self.policy.max_window);
        match self.store.update_window(user_id, &window).await {
            Ok(()) => {
                tracing::info!(user_id, descriptors = window.len(), "window updated");
                WindowUpdate::Applied { len: window.len() }
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "window update failed: write");
                WindowUpdate::Failed(e.to_string())
            }
        }
    }
}
