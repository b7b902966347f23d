use crate::enroll::{EnrollError, EnrollmentService};
use crate::identify::{MatchError, MatchingService};
use facekeep_core::pipeline::{DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE};
use facekeep_core::{MatchPolicy, Profile};
use facekeep_store::ProfileStore;
use std::path::PathBuf;
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.facekeep.FaceKeep1";
pub const OBJECT_PATH: &str = "/org/facekeep/FaceKeep1";

/// Errors returned to D-Bus callers as `org.facekeep.Error.<Kind>`.
#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.facekeep.Error")]
pub enum ServiceError {
    #[zbus(error)]
    ZBus(zbus::Error),
    InvalidInput(String),
    NoFaceDetected(String),
    UnknownIdentity(String),
    ExtractionFailure(String),
    StoreFailure(String),
}

impl From<EnrollError> for ServiceError {
    fn from(e: EnrollError) -> Self {
        let msg = e.to_string();
        match e {
            EnrollError::InvalidInput(_) => ServiceError::InvalidInput(msg),
            EnrollError::ExtractionFailure { .. } => ServiceError::ExtractionFailure(msg),
            EnrollError::StoreFailure(_) => ServiceError::StoreFailure(msg),
        }
    }
}

impl From<MatchError> for ServiceError {
    fn from(e: MatchError) -> Self {
        let msg = e.to_string();
        match e {
            MatchError::InvalidInput(_) => ServiceError::InvalidInput(msg),
            MatchError::UnknownIdentity(_) => ServiceError::UnknownIdentity(msg),
            MatchError::NoFaceDetected => ServiceError::NoFaceDetected(msg),
            MatchError::ExtractionFailure(_) => ServiceError::ExtractionFailure(msg),
            MatchError::StoreFailure(_) => ServiceError::StoreFailure(msg),
        }
    }
}

/// D-Bus interface for the facekeep daemon.
///
/// Bus name: org.facekeep.FaceKeep1
/// Object path: /org/facekeep/FaceKeep1
pub struct FaceKeepService {
    enrollment: EnrollmentService,
    matching: MatchingService,
    store: Arc<dyn ProfileStore>,
    policy: MatchPolicy,
    model_dir: PathBuf,
    bus: &'static str,
}

impl FaceKeepService {
    pub fn new(
        enrollment: EnrollmentService,
        matching: MatchingService,
        store: Arc<dyn ProfileStore>,
        policy: MatchPolicy,
        model_dir: PathBuf,
        bus: &'static str,
    ) -> Self {
        Self {
            enrollment,
            matching,
            store,
            policy,
            model_dir,
            bus,
        }
    }
}

#[interface(name = "org.facekeep.FaceKeep1")]
impl FaceKeepService {
    /// Enroll `user_id` from a batch of encoded images, replacing any
    /// existing profile.
    #[zbus(out_args("descriptors", "skipped"))]
    async fn enroll(
        &self,
        user_id: &str,
        label: &str,
        images: Vec<Vec<u8>>,
    ) -> Result<(u32, u32), ServiceError> {
        tracing::info!(user_id, label, images = images.len(), "enroll requested");
        let report = self.enrollment.enroll(&images, label, user_id).await?;
        Ok((report.descriptors as u32, report.skipped as u32))
    }

    /// Score one encoded image against the profile enrolled for `user_id`.
    ///
    /// `update` is one of `not-eligible`, `applied`, `superseded`, `failed`;
    /// `detail` carries the new window length or the failure reason.
    #[zbus(out_args("matched", "label", "distance", "update", "detail"))]
    async fn identify(
        &self,
        user_id: &str,
        image: Vec<u8>,
    ) -> Result<(bool, String, f64, String, String), ServiceError> {
        tracing::info!(user_id, bytes = image.len(), "identify requested");
        let id = self.matching.identify(&image, user_id).await?;
        Ok((
            id.verdict.matched,
            id.verdict.label,
            f64::from(id.verdict.distance),
            id.update.token().to_string(),
            id.update.detail(),
        ))
    }

    /// JSON summary of a stored profile. Embeddings are not exposed.
    async fn profile(&self, user_id: &str) -> Result<String, ServiceError> {
        let profile = self
            .store
            .get(user_id)
            .await
            .map_err(|e| ServiceError::StoreFailure(e.to_string()))?
            .ok_or_else(|| ServiceError::UnknownIdentity(format!("no profile enrolled for {user_id:?}")))?;
        Ok(profile_summary(&profile).to_string())
    }

    /// Return daemon status information.
    async fn status(&self) -> String {
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "bus": self.bus,
            "policy": self.policy,
            "models": {
                "dir": self.model_dir.display().to_string(),
                "detector": DETECTOR_MODEL_FILE,
                "recognizer": RECOGNIZER_MODEL_FILE,
            },
        })
        .to_string()
    }
}

fn profile_summary(profile: &Profile) -> serde_json::Value {
    serde_json::json!({
        "id": profile.id,
        "label": profile.label,
        "descriptors": profile.window.len(),
        "enrollment_id": profile.enrollment_id,
        "enrolled_at": profile.enrolled_at,
    })
}
