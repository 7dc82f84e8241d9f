//! # Summary
//!
//! UDP-backed reference transport adapter. Out of scope as a
//! replicated concern: nothing here carries a Paxos invariant, it
//! only moves opaque bytes between processes and performs the lobby
//! handshake and discovery protocol used to form the peer set before
//! a game starts.

mod error;
mod protocol;
mod transport;

pub use error::TransportError;
pub use protocol::{names_collide, Envelope, DISCOVERY_MAGIC, HANDSHAKE_KEY};
pub use transport::{Event, Transport, PEER_TIMEOUT};
