//! # Summary
//!
//! The datagram envelope this adapter wraps around every consensus
//! frame, plus the handshake and discovery messages described for
//! this system's external interfaces. None of this carries any Paxos
//! invariant; it exists purely to get opaque bytes from one process's
//! socket into another's.

use paxos::NodeId;
use serde::{Deserialize, Serialize};

pub const HANDSHAKE_KEY: &str = "WEREWOLF_KEY";
pub const DISCOVERY_MAGIC: &str = "WEREWOLF_DISCOVERY";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Envelope {
    /// Sent by the connecting side. Rejected if the key mismatches,
    /// the name collides (case-insensitively, ignoring a trailing
    /// "(Me)" marker), the name equals the responder's own, or the
    /// responder is no longer in its Lobby phase.
    Hello { key: String, node_id: NodeId, name: String },
    Welcome { node_id: NodeId, name: String },
    Reject { reason: String },
    /// An opaque `paxos::Frame`, carried byte-for-byte.
    Consensus(Vec<u8>),
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, crate::TransportError> {
        bincode::serialize(self).map_err(crate::TransportError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, crate::TransportError> {
        bincode::deserialize(bytes).map_err(crate::TransportError::Decode)
    }
}

/// Case-insensitive name comparison ignoring a trailing local "(Me)"
/// marker some clients append for self-display.
pub fn names_collide(a: &str, b: &str) -> bool {
    fn normalize(name: &str) -> String {
        name.trim().trim_end_matches("(Me)").trim().to_lowercase()
    }
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_collide_ignores_case_and_me_suffix() {
        assert!(names_collide("Alice", "alice"));
        assert!(names_collide("Alice (Me)", "alice"));
        assert!(!names_collide("Alice", "Bob"));
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = Envelope::Hello { key: HANDSHAKE_KEY.to_string(), node_id: 7, name: "Alice".to_string() };
        let bytes = envelope.encode().unwrap();
        match Envelope::decode(&bytes).unwrap() {
            Envelope::Hello { key, node_id, name } => {
                assert_eq!(key, HANDSHAKE_KEY);
                assert_eq!(node_id, 7);
                assert_eq!(name, "Alice");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }
}
