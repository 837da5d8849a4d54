//! fanout-common: shared types for the fanout client.
//!
//! Provides the 160-bit `ReplicaId` used to identify replicas across
//! the tracker and router crates.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Number of bytes in a replica identifier.
pub const ID_BYTES: usize = 20;

// ---------------------------------------------------------------------------
// ReplicaId
// ---------------------------------------------------------------------------

/// A 160-bit identifier for one replica of a partition.
///
/// Ids are stable across membership snapshots: deriving an id from the same
/// name always yields the same value, so snapshots taken at different times
/// agree on replica identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId([u8; ID_BYTES]);

impl ReplicaId {
    /// The all-zeros identifier.
    pub const ZERO: Self = Self([0u8; ID_BYTES]);

    /// Create a `ReplicaId` from raw bytes.
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Generate a random `ReplicaId`.
    pub fn random() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        rand::thread_rng().fill(&mut bytes);
        Self(bytes)
    }

    /// Derive a `ReplicaId` by SHA-1 hashing a stable name, typically the
    /// `host:port` of the hosting node plus the partition path.
    pub fn from_name(name: &[u8]) -> Self {
        let hash = Sha1::digest(name);
        let mut bytes = [0u8; ID_BYTES];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaId({})", self)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first 4 bytes as hex for readability
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
