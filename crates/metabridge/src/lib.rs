//! Metadata callback bridge (§4.F): the coordinator never holds metadata
//! locks itself. Installing a new XLocSet means handing a request across
//! to the metadata processing stage and awaiting its reply — modeled here
//! as a channel with a reply channel rather than a raw callback, so the
//! hand-off is a plain awaitable and cancellation has an explicit edge.

use async_trait::async_trait;
use policy::XLocSet;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("metadata install not allowed")]
    PermissionDenied,

    #[error("not the master replica for this volume; redirect to {target}")]
    Redirect { target: Uuid },

    #[error("internal metadata error: {0}")]
    Internal(String),
}

pub struct InstallRequest {
    pub file_id: String,
    pub ext_xloc_set: XLocSet,
    reply: oneshot::Sender<Result<(), InstallError>>,
}

impl InstallRequest {
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn ext_xloc_set(&self) -> &XLocSet {
        &self.ext_xloc_set
    }

    pub fn reply(self, result: Result<(), InstallError>) {
        // The receiving end may have gone away (processing stage shut
        // down mid-flight); the coordinator surfaces that as Shutdown
        // when its `install` await resolves to a channel-closed error.
        let _ = self.reply.send(result);
    }
}

/// Held by the coordinator. Enqueues install requests for the metadata
/// processing stage and awaits the per-request reply.
#[derive(Clone)]
pub struct MetadataBridge {
    sender: mpsc::UnboundedSender<InstallRequest>,
}

impl MetadataBridge {
    /// Returns the bridge handle plus the receiver the processing stage
    /// drains — typically fed into [`run_processing_stage`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InstallRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Installs `ext_xloc_set` for `file_id`, atomically per §4.E's
    /// INSTALL-XLOCSET step: either the call resolves `Ok(())` and the new
    /// set is visible to all future operations, or it resolves `Err` and
    /// nothing changed.
    pub async fn install(&self, file_id: String, ext_xloc_set: XLocSet) -> Result<(), InstallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(InstallRequest {
                file_id,
                ext_xloc_set,
                reply: reply_tx,
            })
            .map_err(|_| InstallError::Internal("metadata processing stage is gone".to_string()))?;

        reply_rx
            .await
            .map_err(|_| InstallError::Internal("metadata processing stage dropped the reply".to_string()))?
    }
}

/// Implemented by the metadata processing stage: replaces the file's
/// XLocSet under its own transaction/concurrency discipline
/// (single-writer-per-file).
#[async_trait]
pub trait MetadataInstaller: Send + Sync {
    async fn install_xloc_set(&self, file_id: &str, ext_xloc_set: &XLocSet) -> Result<(), InstallError>;
}

/// Drains install requests one at a time, handing each to `installer` and
/// replying on its channel. Requests for different files may still be
/// processed concurrently by a more elaborate installer; this loop only
/// guarantees the bridge itself never reorders replies relative to
/// submission.
pub async fn run_processing_stage(
    mut receiver: mpsc::UnboundedReceiver<InstallRequest>,
    installer: std::sync::Arc<dyn MetadataInstaller>,
) {
    while let Some(request) = receiver.recv().await {
        let result = installer
            .install_xloc_set(&request.file_id, &request.ext_xloc_set)
            .await;
        request.reply(result);
    }
}
