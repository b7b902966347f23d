//! Embedding extraction seam.

use crate::types::Embedding;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Hard extraction faults. "No face in the image" is not one of them: it is
/// reported as `Ok(None)`.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("expected {expected}-dim embedding, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),
    #[error("extraction engine unavailable")]
    Unavailable,
}

/// Turns an encoded image into at most one face embedding.
///
/// Implementations must be deterministic for a given image.
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<Option<Embedding>, ExtractError>;
}
