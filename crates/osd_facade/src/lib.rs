//! OSD client façade: the RPC surface the coordinator drives directly
//! (invalidate, read-probe) plus the reconciliation call used by the
//! on-OSD path. Every call is bounded by a per-call deadline and surfaces
//! timeouts/transport failures as structured errors rather than panics —
//! the coordinator treats a failed per-OSD call as "no status", not as a
//! reason to abort the whole fan-out.

mod error;
pub mod mock;

pub use error::OsdFacadeError;

use async_trait::async_trait;
use capability::Capability;
use policy::{AuthoritativeReplicaState, ReplicaStatus};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidateResponse {
    pub is_primary: bool,
    pub status: Option<ReplicaStatus>,
}

/// The raw, un-timed RPC surface a transport implements. `OsdClient`
/// wraps this with the per-call deadline so transports stay free of
/// timeout bookkeeping.
#[async_trait]
pub trait OsdTransport: Send + Sync {
    async fn invalidate(
        &self,
        osd: Uuid,
        cap: &Capability,
        file_id: &str,
    ) -> Result<InvalidateResponse, OsdFacadeError>;

    async fn read_probe(
        &self,
        osd: Uuid,
        cap: &Capability,
        file_id: &str,
        obj_no: u64,
        obj_version: u64,
        offset: u64,
        length: u64,
    ) -> Result<(), OsdFacadeError>;

    async fn execute_reset(
        &self,
        cap: &Capability,
        local_status: ReplicaStatus,
    ) -> Result<AuthoritativeReplicaState, OsdFacadeError>;
}

/// Applies a per-call deadline around a shared transport. Cheap to clone;
/// intended to be held as one instance shared across the coordinator.
#[derive(Clone)]
pub struct OsdClient {
    transport: Arc<dyn OsdTransport>,
    deadline: Duration,
}

impl OsdClient {
    pub fn new(transport: Arc<dyn OsdTransport>, deadline: Duration) -> Self {
        Self { transport, deadline }
    }

    pub async fn invalidate(
        &self,
        osd: Uuid,
        cap: &Capability,
        file_id: &str,
    ) -> Result<InvalidateResponse, OsdFacadeError> {
        self.with_deadline(self.transport.invalidate(osd, cap, file_id))
            .await
    }

    /// Triggers replication priming on a fresh replica. The spec reserves
    /// this for future wiring — the coordinator invokes it for new
    /// replicas under coordinated policies but callers MAY skip it.
    pub async fn read_probe(
        &self,
        osd: Uuid,
        cap: &Capability,
        file_id: &str,
        obj_no: u64,
        obj_version: u64,
        offset: u64,
        length: u64,
    ) -> Result<(), OsdFacadeError> {
        self.with_deadline(
            self.transport
                .read_probe(osd, cap, file_id, obj_no, obj_version, offset, length),
        )
        .await
    }

    /// Used by the on-OSD reconciliation path, not by the coordinator
    /// directly — kept here because it's part of the same RPC surface.
    pub async fn execute_reset(
        &self,
        cap: &Capability,
        local_status: ReplicaStatus,
    ) -> Result<AuthoritativeReplicaState, OsdFacadeError> {
        self.with_deadline(self.transport.execute_reset(cap, local_status))
            .await
    }

    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, OsdFacadeError>>,
    ) -> Result<T, OsdFacadeError> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(deadline_ms = self.deadline.as_millis() as u64, "OSD RPC timed out");
                Err(OsdFacadeError::Timeout(self.deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[tokio::test]
    async fn invalidate_returns_transport_response() {
        let transport = Arc::new(MockTransport::new());
        let osd = Uuid::new_v4();
        transport.set_invalidate_response(
            osd,
            Ok(InvalidateResponse {
                is_primary: true,
                status: None,
            }),
        );
        let client = OsdClient::new(transport, Duration::from_millis(500));
        let cap = test_capability();

        let response = client.invalidate(osd, &cap, "file-1").await.unwrap();
        assert!(response.is_primary);
    }

    #[tokio::test]
    async fn invalidate_surfaces_transport_error() {
        let transport = Arc::new(MockTransport::new());
        let osd = Uuid::new_v4();
        transport.set_invalidate_response(
            osd,
            Err(OsdFacadeError::Transport("connection reset".to_string())),
        );
        let client = OsdClient::new(transport, Duration::from_millis(500));
        let cap = test_capability();

        let result = client.invalidate(osd, &cap, "file-1").await;
        assert!(matches!(result, Err(OsdFacadeError::Transport(_))));
    }

    #[tokio::test]
    async fn invalidate_times_out_on_a_hanging_osd() {
        let transport = Arc::new(MockTransport::new());
        let osd = Uuid::new_v4();
        transport.set_invalidate_delay(osd, Duration::from_secs(60));
        let client = OsdClient::new(transport, Duration::from_millis(20));
        let cap = test_capability();

        let result = client.invalidate(osd, &cap, "file-1").await;
        assert!(matches!(result, Err(OsdFacadeError::Timeout(_))));
    }

    fn test_capability() -> Capability {
        capability::CapabilityIssuer::new(bytes::Bytes::from_static(b"secret"))
            .unwrap()
            .build("file-1", Duration::from_secs(60), "coordinator-1", 1)
            .unwrap()
    }
}
