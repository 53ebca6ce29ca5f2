//! XLoc / XLocSet data model (§3). Values, not behavior — the algebra in
//! the parent module operates on the policy tag carried here.

use crate::{PolicyError, UpdatePolicyTag};
use uuid::Uuid;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReplicationFlags: u32 {
        const FULL_REPLICA = 0b0001;
        const PARTIAL_REPLICA = 0b0010;
    }
}

/// One replica descriptor: the ordered OSDs serving a stripe, with the
/// first entry the head OSD for lease-based policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XLoc {
    pub osds: Vec<Uuid>,
    pub flags: ReplicationFlags,
}

impl XLoc {
    pub fn new(osds: Vec<Uuid>, flags: ReplicationFlags) -> Self {
        Self { osds, flags }
    }

    /// The head OSD for this stripe — the primary candidate under
    /// lease-based policies.
    pub fn head(&self) -> Option<Uuid> {
        self.osds.first().copied()
    }
}

/// The policy tag travels as a raw string, not a validated
/// `UpdatePolicyTag` — the canonical XLocList lives in the metadata
/// database and an entry can carry a tag nobody's ever validated. DECIDE
/// is the point that parses it and raises `UserError` on an unknown tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XLocSet {
    pub xlocs: Vec<XLoc>,
    pub policy_tag: String,
    pub version: u64,
    pub read_only: bool,
}

impl XLocSet {
    pub fn new(
        xlocs: Vec<XLoc>,
        policy_tag: impl Into<String>,
        version: u64,
        read_only: bool,
    ) -> Self {
        Self {
            xlocs,
            policy_tag: policy_tag.into(),
            version,
            read_only,
        }
    }

    pub fn policy(&self) -> Result<UpdatePolicyTag, PolicyError> {
        UpdatePolicyTag::parse(&self.policy_tag)
    }

    pub fn replica_count(&self) -> u32 {
        self.xlocs.len() as u32
    }

    /// The flat, ordered list of OSD UUIDs across every XLoc — the order
    /// the invalidate fan-out and DECIDE's tail-priming both rely on.
    pub fn osd_order(&self) -> Vec<Uuid> {
        self.xlocs.iter().flat_map(|x| x.osds.iter().copied()).collect()
    }

    pub fn bumped(&self, xlocs: Vec<XLoc>) -> Self {
        Self {
            xlocs,
            policy_tag: self.policy_tag.clone(),
            version: self.version + 1,
            read_only: self.read_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_is_first_osd() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let xloc = XLoc::new(vec![a, b], ReplicationFlags::FULL_REPLICA);
        assert_eq!(xloc.head(), Some(a));
    }

    #[test]
    fn bumped_strictly_increases_version() {
        let set = XLocSet::new(vec![], "WqRq", 7, false);
        let next = set.bumped(vec![]);
        assert_eq!(next.version, 8);
        assert!(next.version > set.version);
    }

    #[test]
    fn osd_order_flattens_across_xlocs() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let set = XLocSet::new(
            vec![
                XLoc::new(vec![a], ReplicationFlags::FULL_REPLICA),
                XLoc::new(vec![b, c], ReplicationFlags::FULL_REPLICA),
            ],
            "WqRq",
            1,
            false,
        );
        assert_eq!(set.osd_order(), vec![a, b, c]);
    }

    #[test]
    fn policy_parses_valid_tag_and_rejects_unknown() {
        let set = XLocSet::new(vec![], "WqRq", 1, false);
        assert_eq!(set.policy().unwrap(), UpdatePolicyTag::WqRq);

        let bogus = XLocSet::new(vec![], "NotARealPolicy", 1, false);
        assert!(bogus.policy().is_err());
    }
}
