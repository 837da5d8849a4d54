//! Abstraction over the replica request transport.
//!
//! The coordinator never moves bytes itself; a [`ReplicaTransport`]
//! implementation owns connections and serialization. Tests plug in mocks
//! and the chaos wrapper.

use fanout_common::ReplicaId;
use fanout_tracker::descriptor::ReplicaDescriptor;
use std::fmt;
use uuid::Uuid;

/// Kind of logical operation being fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Get,
    Put,
    Delete,
}

impl OperationKind {
    /// Metrics label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One replica-bound request.
///
/// Payload bytes are the transport's business; the coordinator only
/// identifies what is being asked of which object.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Operation instance this request belongs to.
    pub operation_id: Uuid,
    /// What the replica is being asked to do.
    pub kind: OperationKind,
    /// Object the operation addresses.
    pub blob_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to replica {0} timed out")]
    Timeout(ReplicaId),
    #[error("RPC failed: {0}")]
    RpcFailed(String),
}

/// Transport for replica requests.
///
/// Same pattern as the tracker seam: the domain crate owns the trait,
/// deployments supply the wire implementation.
#[async_trait::async_trait]
pub trait ReplicaTransport: Send + Sync + 'static {
    /// Dispatch one request and wait for the replica's ack.
    async fn send_request(
        &self,
        target: &ReplicaDescriptor,
        request: OperationRequest,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_labels() {
        assert_eq!(OperationKind::Get.as_str(), "get");
        assert_eq!(OperationKind::Put.as_str(), "put");
        assert_eq!(OperationKind::Delete.as_str(), "delete");
        assert_eq!(format!("{}", OperationKind::Delete), "delete");
    }
}
