//! Replica-update-policy algebra: pure functions over policy tags, kept
//! free of RPC and I/O so the quorum math can be tested on its own.

mod types;
pub use types::*;

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unknown replica-update-policy tag: {0}")]
    UnknownPolicyTag(String),
}

/// Which direction a quorum figure is being computed for. The formulas below
/// don't currently differ by direction for any supported policy, but callers
/// name the direction explicitly (mirrors the spec's `numRequiredAcks(op, ...)`
/// signature) so a future asymmetric policy can branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePolicyTag {
    /// write-all, read-1: primary writes to all remote replicas; a backup
    /// may not serve reads on its own.
    WaR1,
    /// write-all, read-any: same write fan-out as WaR1, but every replica
    /// is guaranteed current so any backup can serve reads.
    WaRa,
    /// write-quorum, read-quorum: majority overlap between writers and
    /// readers.
    WqRq,
    /// read-only replication: no synchronous acks required; replicas are
    /// filled lazily in the background.
    RONLY,
}

impl UpdatePolicyTag {
    pub fn parse(tag: &str) -> Result<Self, PolicyError> {
        match tag {
            "WaR1" => Ok(Self::WaR1),
            "WaRa" => Ok(Self::WaRa),
            "WqRq" => Ok(Self::WqRq),
            "RONLY" => Ok(Self::RONLY),
            other => Err(PolicyError::UnknownPolicyTag(other.to_string())),
        }
    }

    pub fn requires_lease(self) -> bool {
        !matches!(self, Self::RONLY)
    }

    pub fn backup_can_read(self) -> bool {
        matches!(self, Self::WaRa | Self::RONLY)
    }

    /// `replica_count` is the policy's notion of the replica set size at the
    /// time the figure is needed — see `decide` for which count that is in
    /// the DECIDE step.
    pub fn num_required_acks(self, _op: Operation, replica_count: u32) -> u32 {
        match self {
            Self::WaR1 | Self::WaRa => replica_count.saturating_sub(1),
            Self::WqRq => {
                // ceil((replica_count + 1) / 2) - 1
                ((replica_count + 2) / 2).saturating_sub(1)
            }
            Self::RONLY => 0,
        }
    }
}

/// A single replica's self-reported view of the objects it holds, keyed by
/// object number within the file.
#[derive(Debug, Clone, Default)]
pub struct ReplicaStatus {
    pub osd: Uuid,
    pub object_versions: HashMap<u64, u64>,
}

impl ReplicaStatus {
    pub fn new(osd: Uuid) -> Self {
        Self {
            osd,
            object_versions: HashMap::new(),
        }
    }

    pub fn with_object(mut self, object_number: u64, version: u64) -> Self {
        self.object_versions.insert(object_number, version);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeEntry {
    pub object_number: u64,
    pub max_version: u64,
    pub replicas: HashSet<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeReplicaState {
    pub file_id: String,
    pub entries: Vec<AuthoritativeEntry>,
}

impl AuthoritativeReplicaState {
    /// `minMajority` from §4.E step 2: the smallest "replicas holding the
    /// winning version" count across all known objects, or `n` (the full
    /// extended replica count) if the file has no objects yet.
    pub fn min_majority(&self, n: u32) -> u32 {
        self.entries
            .iter()
            .map(|e| e.replicas.len() as u32)
            .min()
            .unwrap_or(n)
    }
}

/// `CalculateAuthoritativeState`: for every object number reported by any
/// replica, picks the maximum version observed and the set of replicas
/// reporting it. Total, deterministic, side-effect-free.
pub fn calculate_authoritative_state(
    file_id: impl Into<String>,
    states: &[ReplicaStatus],
) -> AuthoritativeReplicaState {
    let mut winners: HashMap<u64, (u64, HashSet<Uuid>)> = HashMap::new();

    for status in states {
        for (&object_number, &version) in &status.object_versions {
            match winners.get_mut(&object_number) {
                None => {
                    winners.insert(object_number, (version, HashSet::from([status.osd])));
                }
                Some((max_version, replicas)) => {
                    if version > *max_version {
                        *max_version = version;
                        *replicas = HashSet::from([status.osd]);
                    } else if version == *max_version {
                        replicas.insert(status.osd);
                    }
                    // version < max_version: superseded, ignored.
                }
            }
        }
    }

    let mut entries: Vec<AuthoritativeEntry> = winners
        .into_iter()
        .map(|(object_number, (max_version, replicas))| AuthoritativeEntry {
            object_number,
            max_version,
            replicas,
        })
        .collect();
    entries.sort_by_key(|e| e.object_number);

    AuthoritativeReplicaState {
        file_id: file_id.into(),
        entries,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecideOutcome {
    pub min_majority: u32,
    pub required_read: u32,
    pub required_updates: u32,
}

/// DECIDE for the coordinated policies (WaR1 / WaRa / WqRq), per §4.E.
///
/// `current_replica_count` is the replica count of the XLocSet *before*
/// extension — the worked examples in §8 only balance against that count,
/// not the post-extension `N`, even though the quorum figures feed into a
/// decision about how many of the newly added replicas need priming.
pub fn decide(
    policy: UpdatePolicyTag,
    current_replica_count: u32,
    extended_replica_count: u32,
    auth_state: &AuthoritativeReplicaState,
) -> DecideOutcome {
    let n = extended_replica_count;
    let min_majority = auth_state.min_majority(n);
    let required_read = if policy.backup_can_read() {
        1
    } else {
        policy.num_required_acks(Operation::Read, current_replica_count) + 1
    };
    let required_updates =
        (n as i64) - (min_majority as i64) - (required_read as i64) + 1;
    DecideOutcome {
        min_majority,
        required_read,
        required_updates: required_updates.max(0) as u32,
    }
}
