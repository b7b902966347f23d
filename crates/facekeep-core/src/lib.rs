//! facekeep-core: Face descriptor windows and adaptive matching.
//!
//! Holds the per-identity descriptor window, the Euclidean match policy,
//! and an ONNX pipeline (SCRFD detection + ArcFace recognition) that turns
//! an encoded image into a face embedding.

use std::path::PathBuf;

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod matcher;
pub mod pipeline;
pub mod policy;
pub mod recognizer;
pub mod types;

pub use extractor::{EmbeddingExtractor, ExtractError};
pub use matcher::{EuclideanMatcher, Matcher};
pub use pipeline::FacePipeline;
pub use policy::{MatchPolicy, PolicyError};
pub use types::{DescriptorWindow, Embedding, FaceBox, MatchVerdict, Profile};

/// Default directory searched for the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facekeep/models")
}
