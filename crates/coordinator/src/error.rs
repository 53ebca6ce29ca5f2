use thiserror::Error;
use uuid::Uuid;

/// §7 error taxonomy. Each variant's handling policy lives with the
/// worker code that raises it, not here — this enum is just the shared
/// vocabulary a [`RequestHandle`](crate::RequestHandle) resolves to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Caller violated a precondition: unknown policy tag, malformed
    /// striping record, mismatched XLocSet versions. Not retried.
    #[error("user error: {0}")]
    UserError(String),

    /// Metadata install returned NOT_ALLOWED. Maps to EPERM; not retried.
    #[error("permission denied")]
    PermissionDenied,

    /// Metadata indicates another replica is master for this volume.
    #[error("redirect to {target}")]
    Redirect { target: Uuid },

    /// RPC timeout / IO failure for one invalidate. Individually
    /// non-fatal to the fan-out; this variant is what surfaces if the
    /// failure count pushes the request into InsufficientQuorum.
    #[error("transport error: {0}")]
    TransportError(String),

    /// `responseCount == 0` or `requiredUpdates >= newReplicas.length`.
    /// Reconfiguration aborted; canonical XLocList is untouched.
    #[error("insufficient quorum: {0}")]
    InsufficientQuorum(String),

    #[error("internal error: {0}")]
    InternalError(String),

    /// Coordinator shutdown interrupted the in-flight request.
    #[error("coordinator is shutting down")]
    Shutdown,
}

impl From<metabridge::InstallError> for CoordinatorError {
    fn from(e: metabridge::InstallError) -> Self {
        match e {
            metabridge::InstallError::PermissionDenied => CoordinatorError::PermissionDenied,
            metabridge::InstallError::Redirect { target } => CoordinatorError::Redirect { target },
            metabridge::InstallError::Internal(msg) => CoordinatorError::InternalError(msg),
        }
    }
}

impl From<policy::PolicyError> for CoordinatorError {
    fn from(e: policy::PolicyError) -> Self {
        CoordinatorError::UserError(e.to_string())
    }
}

impl From<capability::CapabilityError> for CoordinatorError {
    fn from(e: capability::CapabilityError) -> Self {
        CoordinatorError::InternalError(e.to_string())
    }
}
