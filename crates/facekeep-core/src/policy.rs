//! Window size and distance thresholds.

use crate::extractor::ExtractError;
use crate::recognizer::ARCFACE_EMBEDDING_DIM;
use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_WINDOW: usize = 10;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;
pub const DEFAULT_UPDATE_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    #[error("max_window must be at least 1")]
    EmptyWindow,
    #[error("embedding_dim must be at least 1")]
    ZeroDimension,
    #[error("thresholds must be finite and positive (match {match_threshold}, update {update_threshold})")]
    InvalidThreshold {
        match_threshold: f32,
        update_threshold: f32,
    },
    #[error("update threshold {update_threshold} is looser than match threshold {match_threshold}")]
    UpdateLooserThanMatch {
        match_threshold: f32,
        update_threshold: f32,
    },
}

/// Tunable matching policy.
///
/// `match_threshold` decides whether a probe is the claimed person;
/// the stricter `update_threshold` decides whether the probe may join the
/// stored window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchPolicy {
    pub max_window: usize,
    pub match_threshold: f32,
    pub update_threshold: f32,
    pub embedding_dim: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            max_window: DEFAULT_MAX_WINDOW,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            update_threshold: DEFAULT_UPDATE_THRESHOLD,
            embedding_dim: ARCFACE_EMBEDDING_DIM,
        }
    }
}

impl MatchPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_window == 0 {
            return Err(PolicyError::EmptyWindow);
        }
        if self.embedding_dim == 0 {
            return Err(PolicyError::ZeroDimension);
        }
        let finite_positive = |t: f32| t.is_finite() && t > 0.0;
        if !finite_positive(self.match_threshold) || !finite_positive(self.update_threshold) {
            return Err(PolicyError::InvalidThreshold {
                match_threshold: self.match_threshold,
                update_threshold: self.update_threshold,
            });
        }
        if self.update_threshold > self.match_threshold {
            return Err(PolicyError::UpdateLooserThanMatch {
                match_threshold: self.match_threshold,
                update_threshold: self.update_threshold,
            });
        }
        Ok(())
    }

    pub fn is_match(&self, distance: f32) -> bool {
        distance <= self.match_threshold
    }

    pub fn admits_update(&self, distance: f32) -> bool {
        distance <= self.update_threshold
    }

    /// Reject embeddings that cannot be compared against the stored windows.
    pub fn check_dimension(&self, embedding: &Embedding) -> Result<(), ExtractError> {
        if embedding.dim() != self.embedding_dim {
            return Err(ExtractError::Dimension {
                expected: self.embedding_dim,
                actual: embedding.dim(),
            });
        }
        Ok(())
    }
}
