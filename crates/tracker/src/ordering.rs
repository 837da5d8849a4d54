//! Candidate selection and ordering for one operation.
//!
//! Turns the raw membership snapshot into the ordered unsent queue:
//! local-datacenter replicas first, then the originating datacenter, then
//! everywhere else, with every healthy replica strictly ahead of every
//! down replica.

use crate::descriptor::ReplicaDescriptor;
use crate::TrackerParams;

/// Produce the ordered candidate queue for one operation.
///
/// `originating_dc` is the datacenter that first accepted the object being
/// operated on, when known.
///
/// Eligibility: when `cross_colo_enabled` is false, only local replicas are
/// candidates. When the originating datacenter is known and
/// `include_non_originating_dc_replicas` is false, replicas outside the
/// local and originating datacenters are dropped and the remaining ordered
/// list is truncated to `replicas_required_cap`. The cap has no effect when
/// the originating datacenter is unknown.
///
/// Order: healthy local, healthy originating, healthy other, then the same
/// three groups for down replicas. Snapshot order is preserved within each
/// group.
pub fn select_candidates(
    replicas: &[ReplicaDescriptor],
    params: &TrackerParams,
    originating_dc: Option<&str>,
) -> Vec<ReplicaDescriptor> {
    let mut local = Vec::new();
    let mut originating = Vec::new();
    let mut other = Vec::new();

    for replica in replicas {
        if replica.datacenter == params.local_datacenter {
            local.push(replica.clone());
        } else if !params.cross_colo_enabled {
            continue;
        } else if Some(replica.datacenter.as_str()) == originating_dc {
            originating.push(replica.clone());
        } else {
            other.push(replica.clone());
        }
    }

    let exclude_other =
        originating_dc.is_some() && !params.include_non_originating_dc_replicas;
    if exclude_other {
        other.clear();
    }

    let mut ordered = Vec::with_capacity(local.len() + originating.len() + other.len());
    for group in [&local, &originating, &other] {
        ordered.extend(group.iter().filter(|r| !r.down).cloned());
    }
    for group in [&local, &originating, &other] {
        ordered.extend(group.iter().filter(|r| r.down).cloned());
    }

    if exclude_other {
        ordered.truncate(params.replicas_required_cap);
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_common::ReplicaId;

    const LOCAL_DC: &str = "dc0";
    const ORIGINATING_DC: &str = "dc1";

    fn replica(dc: &str, name: &str) -> ReplicaDescriptor {
        ReplicaDescriptor::with_dummy_addr(ReplicaId::from_name(name.as_bytes()), dc)
    }

    /// Three replicas in each of dc0..dc3; dc0 is local.
    fn standard_pool() -> Vec<ReplicaDescriptor> {
        let mut pool = Vec::new();
        for dc in ["dc0", "dc1", "dc2", "dc3"] {
            for i in 0..3 {
                pool.push(replica(dc, &format!("{}-r{}", dc, i)));
            }
        }
        pool
    }

    fn params() -> TrackerParams {
        TrackerParams::new(LOCAL_DC)
    }

    fn datacenters(candidates: &[ReplicaDescriptor]) -> Vec<&str> {
        candidates.iter().map(|r| r.datacenter.as_str()).collect()
    }

    #[test]
    fn test_local_replicas_first() {
        let candidates = select_candidates(&standard_pool(), &params(), None);
        assert_eq!(candidates.len(), 12);
        assert_eq!(
            datacenters(&candidates[..3]),
            vec!["dc0", "dc0", "dc0"],
            "local replicas should lead the queue"
        );
    }

    #[test]
    fn test_cross_colo_disabled_restricts_to_local() {
        let mut params = params();
        params.cross_colo_enabled = false;
        let candidates = select_candidates(&standard_pool(), &params, None);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|r| r.datacenter == LOCAL_DC));
    }

    #[test]
    fn test_originating_dc_ranks_second() {
        let candidates =
            select_candidates(&standard_pool(), &params(), Some(ORIGINATING_DC));
        assert_eq!(candidates.len(), 12);
        assert_eq!(datacenters(&candidates[..3]), vec!["dc0", "dc0", "dc0"]);
        assert_eq!(datacenters(&candidates[3..6]), vec!["dc1", "dc1", "dc1"]);
    }

    #[test]
    fn test_originating_same_as_local() {
        let candidates = select_candidates(&standard_pool(), &params(), Some(LOCAL_DC));
        assert_eq!(candidates.len(), 12, "no replica should be dropped or doubled");
        assert_eq!(datacenters(&candidates[..3]), vec!["dc0", "dc0", "dc0"]);
    }

    #[test]
    fn test_exclusion_keeps_local_and_originating() {
        let mut params = params();
        params.include_non_originating_dc_replicas = false;
        let candidates =
            select_candidates(&standard_pool(), &params, Some(ORIGINATING_DC));
        assert_eq!(candidates.len(), 6);
        assert!(candidates
            .iter()
            .all(|r| r.datacenter == LOCAL_DC || r.datacenter == ORIGINATING_DC));
    }

    #[test]
    fn test_cap_truncates_exclusion_path() {
        let mut params = params();
        params.include_non_originating_dc_replicas = false;
        params.replicas_required_cap = 5;
        let candidates =
            select_candidates(&standard_pool(), &params, Some(ORIGINATING_DC));
        assert_eq!(candidates.len(), 5);
        // The tail of the originating group is what gets cut
        assert_eq!(datacenters(&candidates[..3]), vec!["dc0", "dc0", "dc0"]);
        assert_eq!(datacenters(&candidates[3..]), vec!["dc1", "dc1"]);
    }

    #[test]
    fn test_cap_inert_when_originating_unknown() {
        let mut params = params();
        params.include_non_originating_dc_replicas = false;
        params.replicas_required_cap = 6;
        let candidates = select_candidates(&standard_pool(), &params, None);
        assert_eq!(
            candidates.len(),
            12,
            "without an originating datacenter the cap must not apply"
        );
    }

    #[test]
    fn test_down_replicas_after_all_healthy() {
        let mut pool = standard_pool();
        // One local and one originating replica are down
        pool[0] = pool[0].clone().mark_down();
        pool[4] = pool[4].clone().mark_down();
        let down_ids = [pool[0].id, pool[4].id];

        let candidates = select_candidates(&pool, &params(), Some(ORIGINATING_DC));
        assert_eq!(candidates.len(), 12);
        assert!(
            candidates[..10].iter().all(|r| !r.down),
            "all healthy replicas must precede any down replica"
        );
        // Down replicas keep their locality order among themselves
        assert_eq!(candidates[10].id, down_ids[0]);
        assert_eq!(candidates[11].id, down_ids[1]);
    }

    #[test]
    fn test_stable_within_group() {
        let pool = standard_pool();
        let candidates = select_candidates(&pool, &params(), None);
        let local_names: Vec<ReplicaId> =
            candidates[..3].iter().map(|r| r.id).collect();
        let expected: Vec<ReplicaId> = pool[..3].iter().map(|r| r.id).collect();
        assert_eq!(local_names, expected, "snapshot order preserved among locals");
    }

    #[test]
    fn test_empty_snapshot() {
        let candidates = select_candidates(&[], &params(), None);
        assert!(candidates.is_empty());
    }
}
