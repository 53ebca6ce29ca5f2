//! XLocSet change coordinator: the serialized state machine that turns an
//! `AddReplicas`/`RemoveReplicas`/`ReplaceReplica` request into an
//! installed XLocSet (§4.E). One dedicated worker processes requests in
//! FIFO order; producers submit without ever blocking on protocol work.

mod config;
mod error;
mod request;
mod worker;

pub use config::CoordinatorConfig;
pub use error::CoordinatorError;
pub use request::{InstalledXLocSet, RequestHandle, RequestKind, SubmittedRequest};

use capability::CapabilityIssuer;
use metabridge::MetadataBridge;
use osd_facade::OsdClient;
use policy::XLocSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};

/// Handle producers submit requests through. Cheap to clone and share.
#[derive(Clone)]
pub struct XLocSetCoordinator {
    sender: mpsc::UnboundedSender<SubmittedRequest>,
    shutdown: Arc<Notify>,
    quit: Arc<AtomicBool>,
}

impl XLocSetCoordinator {
    /// Spawns the single worker task and returns a handle to it.
    pub fn spawn(
        config: CoordinatorConfig,
        issuer: Arc<CapabilityIssuer>,
        osd_client: OsdClient,
        metadata_bridge: MetadataBridge,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let quit = Arc::new(AtomicBool::new(false));

        let ctx = worker::WorkerContext {
            config,
            issuer,
            osd_client,
            metadata_bridge,
            shutdown: shutdown.clone(),
            quit: quit.clone(),
        };
        tokio::spawn(worker::run(receiver, ctx));

        Self {
            sender,
            shutdown,
            quit,
        }
    }

    /// Enqueues a request method (§6). Never blocks on protocol progress —
    /// at most it contends briefly on the unbounded channel's internal
    /// lock.
    pub fn submit(
        &self,
        file_id: impl Into<String>,
        cur_xloc_set: XLocSet,
        ext_xloc_set: XLocSet,
        kind: RequestKind,
    ) -> RequestHandle {
        let (reply, outcome) = oneshot::channel();
        let request = SubmittedRequest {
            file_id: file_id.into(),
            cur_xloc_set,
            ext_xloc_set,
            kind,
            reply,
        };

        if let Err(mpsc::error::SendError(request)) = self.sender.send(request) {
            let _ = request.reply.send(Err(CoordinatorError::Shutdown));
        }

        RequestHandle { outcome }
    }

    /// Sets the quit flag and interrupts the worker. Partial progress on
    /// the in-flight request is acceptable — no protocol state is
    /// persisted across restarts.
    pub fn shutdown(&self) {
        self.quit.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use metabridge::{run_processing_stage, InstallError, MetadataInstaller};
    use osd_facade::mock::MockTransport;
    use osd_facade::{InvalidateResponse, OsdFacadeError};
    use policy::{ReplicaStatus, XLoc};
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    struct RecordingInstaller {
        installs: AsyncMutex<Vec<(String, u64)>>,
        deny_next: AtomicU64,
    }

    impl RecordingInstaller {
        fn new() -> Self {
            Self {
                installs: AsyncMutex::new(Vec::new()),
                deny_next: AtomicU64::new(0),
            }
        }

        fn deny_next_install(&self) {
            self.deny_next.store(1, AtomicOrdering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl MetadataInstaller for RecordingInstaller {
        async fn install_xloc_set(
            &self,
            file_id: &str,
            ext: &XLocSet,
        ) -> Result<(), InstallError> {
            if self.deny_next.swap(0, AtomicOrdering::SeqCst) == 1 {
                return Err(InstallError::PermissionDenied);
            }
            self.installs
                .lock()
                .await
                .push((file_id.to_string(), ext.version));
            Ok(())
        }
    }

    fn xloc_for(osds: &[Uuid]) -> XLoc {
        XLoc::new(osds.to_vec(), policy::ReplicationFlags::FULL_REPLICA)
    }

    fn harness(
        config: CoordinatorConfig,
    ) -> (
        XLocSetCoordinator,
        Arc<MockTransport>,
        Arc<RecordingInstaller>,
    ) {
        let transport = Arc::new(MockTransport::new());
        let osd_client = OsdClient::new(transport.clone(), config.osd_rpc_timeout());
        let issuer = Arc::new(CapabilityIssuer::new(Bytes::from_static(b"test-secret")).unwrap());
        let (bridge, receiver) = MetadataBridge::new();
        let installer = Arc::new(RecordingInstaller::new());
        tokio::spawn(run_processing_stage(receiver, installer.clone()));

        let coordinator = XLocSetCoordinator::spawn(config, issuer, osd_client, bridge);
        (coordinator, transport, installer)
    }

    fn fast_lease_config() -> CoordinatorConfig {
        let mut cfg = CoordinatorConfig::new();
        cfg.lease_timeout_ms = config::Count(10);
        cfg.osd_rpc_timeout_ms = config::Count(20);
        cfg
    }

    // Scenario 1: RONLY add, 3 -> 5 replicas, all respond with empty
    // status and none primary.
    #[tokio::test]
    async fn scenario_ronly_add_three_to_five() {
        let [a, b, c, d, e] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, installer) = harness(fast_lease_config());

        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: None,
                }),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "RONLY", 7, false);
        let ext = XLocSet::new(vec![xloc_for(&[a, b, c, d, e])], "RONLY", 7, false);
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas {
                new_xlocs: vec![xloc_for(&[d, e])],
            },
        );

        let result = handle.wait().await.unwrap();
        assert_eq!(result.version, 8);
        assert_eq!(transport.read_probes_issued().len(), 0);
        assert_eq!(
            *installer.installs.lock().await,
            vec![("file-1".to_string(), 8)]
        );
    }

    // Scenario 2: WqRq add, 3 -> 5, all respond, all hold object 0 at
    // version 4. Expect one priming probe against E.
    #[tokio::test]
    async fn scenario_wqrq_add_three_to_five() {
        let [a, b, c, d, e] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, installer) = harness(fast_lease_config());

        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: Some(ReplicaStatus::new(osd).with_object(0, 4)),
                }),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "WqRq", 7, false);
        let ext = XLocSet::new(vec![xloc_for(&[a, b, c, d, e])], "WqRq", 7, false);
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas {
                new_xlocs: vec![xloc_for(&[d, e])],
            },
        );

        let result = handle.wait().await.unwrap();
        assert_eq!(result.version, 8);
        let probes = transport.read_probes_issued();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].0, e);
        assert_eq!(*installer.installs.lock().await, vec![("file-1".to_string(), 8)]);
    }

    // Scenario 3: WaR1 add, 3 -> 4, B silent (no response), A and C
    // respond current. Expect a lease-wait, then no priming.
    #[tokio::test]
    async fn scenario_war1_add_three_to_four_with_lease_wait() {
        let [a, b, c, d] = std::array::from_fn(|_| Uuid::new_v4());
        let config = fast_lease_config();
        let lease_timeout = config.lease_timeout();
        let (coordinator, transport, installer) = harness(config);

        for osd in [a, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: Some(ReplicaStatus::new(osd).with_object(0, 1)),
                }),
            );
        }
        // B never responds in this osd list order (A, B, C, D); leaving
        // it unset makes the mock answer with a default non-primary,
        // empty-status response rather than simulating silence, so make
        // B hang past the per-call deadline instead to truly omit it.
        transport.set_invalidate_delay(b, Duration::from_millis(200));

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "WaR1", 5, false);
        let ext = XLocSet::new(vec![xloc_for(&[a, b, c, d])], "WaR1", 5, false);

        let start = std::time::Instant::now();
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas {
                new_xlocs: vec![xloc_for(&[d])],
            },
        );
        let result = handle.wait().await.unwrap();
        assert!(start.elapsed() >= lease_timeout);
        assert_eq!(result.version, 6);
        assert_eq!(transport.read_probes_issued().len(), 0);
        assert_eq!(*installer.installs.lock().await, vec![("file-1".to_string(), 6)]);
    }

    // Scenario 4: unknown policy tag in the extended set raises UserError;
    // no installXLocSet call happens.
    #[tokio::test]
    async fn scenario_unknown_policy_tag_is_user_error() {
        let [a, b, c] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, installer) = harness(fast_lease_config());
        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: true,
                    status: None,
                }),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "NotARealPolicy", 1, false);
        let ext = XLocSet::new(vec![xloc_for(&[a, b, c])], "NotARealPolicy", 1, false);
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas { new_xlocs: vec![] },
        );

        let result = handle.wait().await;
        assert!(matches!(result, Err(CoordinatorError::UserError(_))));
        assert!(installer.installs.lock().await.is_empty());
    }

    // Scenario 5: metadata install returns NOT_ALLOWED -> PermissionDenied,
    // canonical XLocList unchanged, next submit proceeds normally.
    #[tokio::test]
    async fn scenario_install_not_allowed_then_recovers() {
        let [a, b, c, d] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, installer) = harness(fast_lease_config());
        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: None,
                }),
            );
        }
        installer.deny_next_install();

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "RONLY", 1, false);
        let ext = XLocSet::new(vec![xloc_for(&[a, b, c, d])], "RONLY", 1, false);
        let handle = coordinator.submit(
            "file-1",
            cur.clone(),
            ext.clone(),
            RequestKind::AddReplicas {
                new_xlocs: vec![xloc_for(&[d])],
            },
        );
        let result = handle.wait().await;
        assert_eq!(result, Err(CoordinatorError::PermissionDenied));
        assert!(installer.installs.lock().await.is_empty());

        // Next submit on the same (unchanged) XLocSet proceeds normally.
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas {
                new_xlocs: vec![xloc_for(&[d])],
            },
        );
        let result = handle.wait().await.unwrap();
        assert_eq!(result.version, 2);
    }

    // P6: the lease-wait sleep happens iff ¬primaryResponded ∧ responseCount < N.
    #[tokio::test]
    async fn p6_lease_wait_skipped_when_every_replica_responds() {
        let [a, b, c] = std::array::from_fn(|_| Uuid::new_v4());
        let config = fast_lease_config();
        let (coordinator, transport, _installer) = harness(config.clone());
        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: None,
                }),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "RONLY", 1, false);
        let ext = cur.clone();
        let start = std::time::Instant::now();
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas { new_xlocs: vec![] },
        );
        let _ = handle.wait().await;
        assert!(start.elapsed() < config.lease_timeout());
    }

    // P7: if any phase fails before INSTALL, installXLocSet is never
    // called.
    #[tokio::test]
    async fn p7_no_install_on_failure() {
        let [a, b, c] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, installer) = harness(fast_lease_config());
        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Err(OsdFacadeError::Transport("down".to_string())),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "WqRq", 1, false);
        let ext = cur.clone();
        let handle = coordinator.submit(
            "file-1",
            cur,
            ext,
            RequestKind::AddReplicas { new_xlocs: vec![] },
        );
        let result = handle.wait().await;
        assert!(matches!(result, Err(CoordinatorError::InsufficientQuorum(_))));
        assert!(installer.installs.lock().await.is_empty());
    }

    // P8: the installed version is strictly greater than the previous one.
    #[tokio::test]
    async fn p8_version_strictly_increases() {
        let [a, b, c] = std::array::from_fn(|_| Uuid::new_v4());
        let (coordinator, transport, _installer) = harness(fast_lease_config());
        for osd in [a, b, c] {
            transport.set_invalidate_response(
                osd,
                Ok(InvalidateResponse {
                    is_primary: true,
                    status: None,
                }),
            );
        }

        let cur = XLocSet::new(vec![xloc_for(&[a, b, c])], "RONLY", 41, false);
        let ext = cur.clone();
        let handle = coordinator.submit(
            "file-1",
            cur.clone(),
            ext,
            RequestKind::AddReplicas { new_xlocs: vec![] },
        );
        let result = handle.wait().await.unwrap();
        assert!(result.version > cur.version);
    }
}
