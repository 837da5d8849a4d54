//! Descriptor of one replica candidate.

use fanout_common::ReplicaId;
use std::fmt;
use std::net::SocketAddr;

/// One replica of a partition, as known when the operation started.
///
/// The `down` flag is a liveness snapshot taken when the membership view
/// was read; it is not updated while the operation runs.
#[derive(Clone)]
pub struct ReplicaDescriptor {
    /// Stable identifier of this replica.
    pub id: ReplicaId,
    /// Network address of the hosting node.
    pub addr: SocketAddr,
    /// Datacenter of the hosting node.
    pub datacenter: String,
    /// Whether the membership view believes this replica is down.
    pub down: bool,
}

impl ReplicaDescriptor {
    /// Create a healthy descriptor.
    pub fn new(id: ReplicaId, addr: SocketAddr, datacenter: impl Into<String>) -> Self {
        Self {
            id,
            addr,
            datacenter: datacenter.into(),
            down: false,
        }
    }

    /// Create a descriptor with a placeholder address (useful for testing).
    pub fn with_dummy_addr(id: ReplicaId, datacenter: impl Into<String>) -> Self {
        Self::new(id, "127.0.0.1:0".parse().unwrap(), datacenter)
    }

    /// Mark this replica down in the snapshot.
    pub fn mark_down(mut self) -> Self {
        self.down = true;
        self
    }
}

// Identity is the id alone; address and liveness are view-dependent.
impl PartialEq for ReplicaDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReplicaDescriptor {}

impl std::hash::Hash for ReplicaDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ReplicaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReplicaDescriptor({} @ {} [{}]{})",
            self.id,
            self.addr,
            self.datacenter,
            if self.down { " down" } else { "" }
        )
    }
}

impl fmt::Display for ReplicaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.datacenter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_id_only() {
        let id = ReplicaId::from_name(b"node1.dc0:6667/part1");
        let a = ReplicaDescriptor::new(id, "10.0.0.1:6667".parse().unwrap(), "dc0");
        let b = ReplicaDescriptor::with_dummy_addr(id, "dc1").mark_down();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_mark_down() {
        let replica = ReplicaDescriptor::with_dummy_addr(ReplicaId::random(), "dc0");
        assert!(!replica.down);
        let replica = replica.mark_down();
        assert!(replica.down);
    }

    #[test]
    fn test_display_shows_datacenter() {
        let replica = ReplicaDescriptor::with_dummy_addr(ReplicaId::random(), "ewr1");
        let s = format!("{}", replica);
        assert!(s.ends_with("@ewr1"));
    }
}
