use crate::locks::IdentityLocks;
use facekeep_core::{DescriptorWindow, EmbeddingExtractor, ExtractError, MatchPolicy, Profile};
use facekeep_store::{ProfileStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("extraction failed on image {index}: {source}")]
    ExtractionFailure {
        index: usize,
        #[source]
        source: ExtractError,
    },
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

/// What an enrollment kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollReport {
    /// Embeddings in the new window.
    pub descriptors: usize,
    /// Images in which no face was found.
    pub skipped: usize,
}

/// Builds a fresh profile from a batch of images.
#[derive(Clone)]
pub struct EnrollmentService {
    extractor: Arc<dyn EmbeddingExtractor>,
    store: Arc<dyn ProfileStore>,
    locks: IdentityLocks,
    policy: MatchPolicy,
}

impl EnrollmentService {
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

    /// Enroll `user_id`, replacing any existing profile in full.
    ///
    /// Images without a face are skipped; an enrollment that keeps no
    /// embeddings still succeeds with an empty window.
    pub async fn enroll(
        &self,
        images: &[Vec<u8>],
        label: &str,
        user_id: &str,
    ) -> Result<EnrollReport, EnrollError> {
        if user_id.trim().is_empty() {
            return Err(EnrollError::InvalidInput("user id is empty"));
        }
        if label.trim().is_empty() {
            return Err(EnrollError::InvalidInput("label is empty"));
        }
        if images.is_empty() {
            return Err(EnrollError::InvalidInput("no images supplied"));
        }
        if images.iter().any(|img| img.is_empty()) {
            return Err(EnrollError::InvalidInput("an image is empty"));
        }

        tracing::info!(user_id, label, images = images.len(), "enroll started");

        let mut accepted = Vec::with_capacity(images.len());
        let mut skipped = 0usize;
        for (i, image) in images.iter().enumerate() {
            let index = i + 1;
            let fault = |source| EnrollError::ExtractionFailure { index, source };
            match self.extractor.extract(image).await.map_err(fault)? {
                Some(embedding) => {
                    self.policy.check_dimension(&embedding).map_err(fault)?;
                    accepted.push(embedding);
                }
                None => {
                    tracing::warn!(user_id, image = index, "no face detected; skipping image");
                    skipped += 1;
                }
            }
        }

        let window = DescriptorWindow::from_batch(accepted, self.policy.max_window);
        let profile = Profile::enrolled(user_id, label, window);

        let _guard = self.locks.lock(user_id).await;
        self.store.put(&profile).await?;

        tracing::info!(
            user_id,
            descriptors = profile.window.len(),
            skipped,
            enrollment_id = %profile.enrollment_id,
            "profile enrolled"
        );

        Ok(EnrollReport {
            descriptors: profile.window.len(),
            skipped,
        })
    }
}
