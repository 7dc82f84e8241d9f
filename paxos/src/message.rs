//! # Summary
//!
//! Wire message types exchanged between peers. Naming follows Paxos
//! Made Moderately Complex: `P1A`/`P1B` are the Prepare/Promise pair,
//! `P2A`/`P2B` are the Accept/Accepted pair.

use serde::{Deserialize, Serialize};

use crate::ballot::{NodeId, ProposalId};

/// A slot-command binding proposed under a given proposal number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PValue {
    pub slot: u64,
    pub proposal_id: ProposalId,
    pub command: String,
}

/// Prepare request: a proposer asking acceptors to promise not to
/// accept anything numbered below `proposal_id` for `slot`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct P1A {
    pub slot: u64,
    pub proposal_id: ProposalId,
}

/// Promise response. `accepted` carries the highest-numbered value the
/// acceptor had previously accepted for this slot, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct P1B {
    pub node_id: NodeId,
    pub slot: u64,
    pub proposal_id: ProposalId,
    pub accepted: Option<PValue>,
}

/// Accept request: a proposer asking acceptors to accept a value.
pub type P2A = PValue;

/// Accepted response, echoing the proposal number the acceptor accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct P2B {
    pub node_id: NodeId,
    pub slot: u64,
    pub proposal_id: ProposalId,
}

/// Union of every frame that crosses the wire between peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Prepare(P1A),
    Promise(P1B),
    Accept(P2A),
    Accepted(P2B),
}

/// The four Paxos message phases, used where callers need to talk
/// about a frame's kind without the payload (logging, metrics).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Promise,
    Accept,
    Accepted,
}

impl Frame {
    pub fn phase(&self) -> Phase {
        match self {
            Frame::Prepare(_) => Phase::Prepare,
            Frame::Promise(_) => Phase::Promise,
            Frame::Accept(_) => Phase::Accept,
            Frame::Accepted(_) => Phase::Accepted,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, crate::FrameError> {
        bincode::serialize(self).map_err(crate::FrameError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, crate::FrameError> {
        bincode::deserialize(bytes).map_err(crate::FrameError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let frame = Frame::Accept(P2A {
            slot: 3,
            proposal_id: ProposalId::new(7, 1),
            command: "VOTE:1:2:day".to_string(),
        });
        let bytes = frame.encode().unwrap();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, decoded);
    }
}
