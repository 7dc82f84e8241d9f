use serde::{Deserialize, Serialize};

/// Identifies a peer in the group. Peers are numbered densely from
/// zero by the host process at startup.
pub type NodeId = i32;

/// A Paxos proposal number, ordered lexicographically by `(ticks,
/// node_id)` so that any two peers' proposal numbers are totally
/// ordered and no two distinct peers ever produce the same one.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ProposalId {
    pub ticks: u64,
    pub node_id: NodeId,
}

impl ProposalId {
    pub fn new(ticks: u64, node_id: NodeId) -> Self {
        ProposalId { ticks, node_id }
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}@{}", self.ticks, self.node_id)
    }
}
