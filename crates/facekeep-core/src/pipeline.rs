//! Image bytes to embedding: decode, detect, align, recognize.

use crate::alignment;
use crate::detector::{DetectorError, FaceDetector};
use crate::extractor::ExtractError;
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use std::path::Path;
use thiserror::Error;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

impl From<DetectorError> for ExtractError {
    fn from(e: DetectorError) -> Self {
        ExtractError::Inference(format!("detector: {e}"))
    }
}

impl From<RecognizerError> for ExtractError {
    fn from(e: RecognizerError) -> Self {
        ExtractError::Inference(format!("recognizer: {e}"))
    }
}

/// Loaded detector + recognizer pair. Not `Sync`: inference needs `&mut`.
pub struct FacePipeline {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FacePipeline {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, LoadError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }

    /// Embed the most confident face in `image`, or `None` if there is none.
    pub fn embed(&mut self, image: &[u8]) -> Result<Option<Embedding>, ExtractError> {
        let rgb = image::load_from_memory(image)
            .map_err(|e| ExtractError::Decode(e.to_string()))?
            .to_rgb8();

        let faces = self.detector.detect(&rgb)?;
        let Some(face) = faces.first() else {
            tracing::debug!(width = rgb.width(), height = rgb.height(), "no face detected");
            return Ok(None);
        };
        if faces.len() > 1 {
            tracing::debug!(faces = faces.len(), "multiple faces; using the most confident");
        }

        let aligned = alignment::align_face(&rgb, &face.landmarks);
        let embedding = self.recognizer.extract(&aligned)?;
        tracing::debug!(score = face.score, dim = embedding.dim(), "face embedded");
        Ok(Some(embedding))
    }
}
