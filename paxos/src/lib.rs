//! # Summary
//!
//! This crate implements a slot-indexed, single-decree-per-slot Paxos
//! engine and the replicated-log driver built on top of it. Every peer
//! runs the same [`Engine`] and [`Driver`] and agrees on the same
//! sequence of opaque string commands without ever touching a socket:
//! the host process feeds inbound bytes in through [`Driver::receive`]
//! and is handed back the bytes it must put on the wire and the
//! commands that have newly been decided.
//!
//! Library users implement a deterministic application on top of the
//! decided command sequence; this crate has no notion of what a
//! command means, only that the same sequence is agreed upon by every
//! peer.

mod ballot;
mod clock;
mod engine;
mod error;
mod message;
mod slot;

pub mod driver;

pub use ballot::{NodeId, ProposalId};
pub use clock::{Clock, MonotonicClock};
pub use driver::{Driver, DriverError};
pub use engine::{quorum_size, Decision, Engine, Outcome};
pub use error::FrameError;
pub use message::{Frame, Phase};
