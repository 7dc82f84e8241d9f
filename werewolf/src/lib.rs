//! # Summary
//!
//! A hidden-role social deduction game expressed as a pure state
//! machine over a sequence of decided commands. This crate never
//! touches the network or consensus layer directly: the host feeds in
//! commands from the replicated log (see the `paxos` crate) in the
//! order they were decided and reacts to the [`state::Intent`]s that
//! come back.

mod command;
mod error;
mod shuffle;
mod vote;

pub mod state;

pub use command::Command;
pub use error::GameError;
pub use state::{Game, Intent, Phase, Role, Winner};
pub use vote::{VoteKind, VoteSession};
