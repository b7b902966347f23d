use async_trait::async_trait;
use facekeep_core::pipeline::LoadError;
use facekeep_core::{EmbeddingExtractor, Embedding, ExtractError, FacePipeline};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    Load(#[from] LoadError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Embed {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Option<Embedding>, ExtractError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    timeout: Duration,
}

#[async_trait]
impl EmbeddingExtractor for EngineHandle {
    /// Queue an image on the engine thread and wait for its embedding,
    /// bounded by the configured timeout.
    async fn extract(&self, image: &[u8]) -> Result<Option<Embedding>, ExtractError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = EngineRequest::Embed {
            image: image.to_vec(),
            reply: reply_tx,
        };

        let round_trip = async {
            self.tx
                .send(request)
                .await
                .map_err(|_| ExtractError::Unavailable)?;
            reply_rx.await.map_err(|_| ExtractError::Unavailable)?
        };

        tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| ExtractError::Timeout(self.timeout))?
    }
}

/// Load the face models and start the engine thread.
///
/// Model loading happens before this returns, so the daemon never accepts
/// requests against a half-loaded pipeline. Fails fast if a model is missing.
pub fn spawn_engine(model_dir: &Path, timeout: Duration) -> Result<EngineHandle, EngineError> {
    let mut pipeline = FacePipeline::load(model_dir)?;
    tracing::info!(dir = %model_dir.display(), "face models loaded");
    spawn_worker(move |image| pipeline.embed(image), timeout)
}

/// Run `embed` on a dedicated OS thread, one request at a time.
fn spawn_worker<F>(mut embed: F, timeout: Duration) -> Result<EngineHandle, EngineError>
where
    F: FnMut(&[u8]) -> Result<Option<Embedding>, ExtractError> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facekeep-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Embed { image, reply } => {
                        if reply.is_closed() {
                            tracing::debug!(bytes = image.len(), "caller gone; skipping request");
                            continue;
                        }
                        let result = embed(&image);
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, bytes = image.len(), "extraction failed");
                        }
                        // Caller may have timed out and gone away.
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx, timeout })
}
