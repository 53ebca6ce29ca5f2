use crate::error::CoordinatorError;
use policy::{XLoc, XLocSet};
use tokio::sync::oneshot;

/// The tagged sum the original union (`kind ∈ {Add, Remove, Replace}`)
/// maps to. Per-variant payloads make the worker's dispatch exhaustive
/// and compiler-checked instead of a runtime switch over a string tag.
#[derive(Debug, Clone)]
pub enum RequestKind {
    AddReplicas { new_xlocs: Vec<XLoc> },
    RemoveReplicas { remove_xlocs: Vec<XLoc> },
    ReplaceReplica { old_xloc: XLoc, new_xloc: XLoc },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledXLocSet {
    pub file_id: String,
    pub version: u64,
}

/// Queue element owned exclusively by the worker once dequeued. XLocSets
/// are immutable snapshots; the metadata database owns the canonical
/// XLocList for the file.
pub struct SubmittedRequest {
    pub file_id: String,
    pub cur_xloc_set: XLocSet,
    pub ext_xloc_set: XLocSet,
    pub kind: RequestKind,
    pub(crate) reply: oneshot::Sender<Result<InstalledXLocSet, CoordinatorError>>,
}

/// Returned by `submit`. The originating operation awaits this without
/// blocking the queue — the worker replies once the request finishes (or
/// fails) somewhere in BUILD-CAP..INSTALL-XLOCSET.
pub struct RequestHandle {
    pub(crate) outcome: oneshot::Receiver<Result<InstalledXLocSet, CoordinatorError>>,
}

impl RequestHandle {
    pub async fn wait(self) -> Result<InstalledXLocSet, CoordinatorError> {
        self.outcome
            .await
            .unwrap_or(Err(CoordinatorError::Shutdown))
    }
}
