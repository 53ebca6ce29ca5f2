//! Capability builder: short-lived, HMAC-signed access tokens attached to
//! OSD RPCs. The coordinator only needs to issue and carry these; their
//! field layout beyond what's signed is opaque to it.

use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("invalid shared secret: {0}")]
    InvalidSecret(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotConfig {
    Disabled,
    Enabled { snapshot_ts: u64 },
}

/// An issued capability. `signature` is the HMAC-SHA256 over the other
/// fields, computed with the issuer's shared secret — the coordinator
/// carries it opaquely and never re-derives or inspects it itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub file_id: String,
    pub access_mode: AccessMode,
    pub validity_secs: u64,
    pub expires_at: u64,
    pub client_identity: String,
    pub epoch: u64,
    pub replicate_on_close: bool,
    pub snapshot_config: SnapshotConfig,
    pub signature: Bytes,
}

impl Capability {
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        let now_secs = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        now_secs >= self.expires_at
    }
}

fn signing_bytes(
    file_id: &str,
    access_mode: AccessMode,
    validity_secs: u64,
    expires_at: u64,
    client_identity: &str,
    epoch: u64,
    replicate_on_close: bool,
    snapshot_config: SnapshotConfig,
) -> Vec<u8> {
    let access_mode_tag = match access_mode {
        AccessMode::ReadWrite => "rw",
        AccessMode::ReadOnly => "ro",
    };
    let (snapshot_tag, snapshot_ts) = match snapshot_config {
        SnapshotConfig::Disabled => ("off", 0),
        SnapshotConfig::Enabled { snapshot_ts } => ("on", snapshot_ts),
    };
    format!(
        "{file_id}\0{access_mode_tag}\0{validity_secs}\0{expires_at}\0{client_identity}\0{epoch}\0{replicate_on_close}\0{snapshot_tag}\0{snapshot_ts}"
    )
    .into_bytes()
}

/// Issues capabilities using a configured HMAC shared secret.
pub struct CapabilityIssuer {
    shared_secret: Bytes,
}

impl CapabilityIssuer {
    pub fn new(shared_secret: Bytes) -> Result<Self, CapabilityError> {
        if shared_secret.is_empty() {
            return Err(CapabilityError::InvalidSecret(
                "shared secret must not be empty".to_string(),
            ));
        }
        Ok(Self { shared_secret })
    }

    /// Builds a capability per §4.D: read-write access, validity = the
    /// configured timeout, expiry = now + validity, client identity = the
    /// configured advertised address (or local hostname if unset),
    /// replicate-on-close = false, snapshots disabled.
    pub fn build(
        &self,
        file_id: impl Into<String>,
        validity: Duration,
        client_identity: impl Into<String>,
        epoch: u64,
    ) -> Result<Capability, CapabilityError> {
        let file_id = file_id.into();
        let client_identity = client_identity.into();
        let validity_secs = validity.as_secs();
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let expires_at = now_secs.saturating_add(validity_secs);

        let access_mode = AccessMode::ReadWrite;
        let replicate_on_close = false;
        let snapshot_config = SnapshotConfig::Disabled;

        let message = signing_bytes(
            &file_id,
            access_mode,
            validity_secs,
            expires_at,
            &client_identity,
            epoch,
            replicate_on_close,
            snapshot_config,
        );
        let signature = self.sign(&message)?;

        Ok(Capability {
            file_id,
            access_mode,
            validity_secs,
            expires_at,
            client_identity,
            epoch,
            replicate_on_close,
            snapshot_config,
            signature,
        })
    }

    pub fn verify(&self, cap: &Capability) -> Result<bool, CapabilityError> {
        let message = signing_bytes(
            &cap.file_id,
            cap.access_mode,
            cap.validity_secs,
            cap.expires_at,
            &cap.client_identity,
            cap.epoch,
            cap.replicate_on_close,
            cap.snapshot_config,
        );
        let expected = self.sign(&message)?;
        Ok(expected == cap.signature)
    }

    fn sign(&self, message: &[u8]) -> Result<Bytes, CapabilityError> {
        let mut mac = HmacSha256::new_from_slice(&self.shared_secret)
            .map_err(|e| CapabilityError::InvalidSecret(e.to_string()))?;
        mac.update(message);
        Ok(Bytes::from(mac.finalize().into_bytes().to_vec()))
    }
}
