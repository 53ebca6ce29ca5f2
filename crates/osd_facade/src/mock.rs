//! An in-memory `OsdTransport` used by tests throughout this workspace —
//! not gated behind `#[cfg(test)]` so other crates' test suites can depend
//! on it too.

use crate::{InvalidateResponse, OsdFacadeError, OsdTransport};
use async_trait::async_trait;
use capability::Capability;
use policy::{AuthoritativeReplicaState, ReplicaStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct MockTransport {
    invalidate_responses: Mutex<HashMap<Uuid, Result<InvalidateResponse, OsdFacadeError>>>,
    invalidate_delays: Mutex<HashMap<Uuid, Duration>>,
    read_probes_issued: Mutex<Vec<(Uuid, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_invalidate_response(&self, osd: Uuid, response: Result<InvalidateResponse, OsdFacadeError>) {
        self.invalidate_responses.lock().unwrap().insert(osd, response);
    }

    pub fn set_invalidate_delay(&self, osd: Uuid, delay: Duration) {
        self.invalidate_delays.lock().unwrap().insert(osd, delay);
    }

    pub fn read_probes_issued(&self) -> Vec<(Uuid, String)> {
        self.read_probes_issued.lock().unwrap().clone()
    }
}

fn clone_response(
    response: &Result<InvalidateResponse, OsdFacadeError>,
) -> Result<InvalidateResponse, OsdFacadeError> {
    match response {
        Ok(r) => Ok(r.clone()),
        Err(e) => Err(OsdFacadeError::Transport(e.to_string())),
    }
}

#[async_trait]
impl OsdTransport for MockTransport {
    async fn invalidate(
        &self,
        osd: Uuid,
        _cap: &Capability,
        _file_id: &str,
    ) -> Result<InvalidateResponse, OsdFacadeError> {
        if let Some(delay) = self.invalidate_delays.lock().unwrap().get(&osd).copied() {
            tokio::time::sleep(delay).await;
        }
        self.invalidate_responses
            .lock()
            .unwrap()
            .get(&osd)
            .map(clone_response)
            .unwrap_or_else(|| {
                Ok(InvalidateResponse {
                    is_primary: false,
                    status: None,
                })
            })
    }

    async fn read_probe(
        &self,
        osd: Uuid,
        _cap: &Capability,
        file_id: &str,
        _obj_no: u64,
        _obj_version: u64,
        _offset: u64,
        _length: u64,
    ) -> Result<(), OsdFacadeError> {
        self.read_probes_issued
            .lock()
            .unwrap()
            .push((osd, file_id.to_string()));
        Ok(())
    }

    async fn execute_reset(
        &self,
        _cap: &Capability,
        local_status: ReplicaStatus,
    ) -> Result<AuthoritativeReplicaState, OsdFacadeError> {
        Ok(policy::calculate_authoritative_state(
            "file-1",
            &[local_status],
        ))
    }
}
