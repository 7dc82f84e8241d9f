//! # Summary
//!
//! The replicated-log driver wraps an [`Engine`] with the bookkeeping
//! needed to run it as a single growing log: which slot is next to be
//! opened, and — when this node is the one proposing — what value it
//! is trying to get decided there. Only one proposal is ever in
//! flight per driver, so decisions arrive in the same order on every
//! peer without needing to buffer out-of-order slots.
//!
//! When a slot this node is contesting decides on someone else's
//! value instead of its own, the driver immediately re-proposes its
//! pending command into the slot that opened up next. This repeats
//! until the pending command wins a slot or the driver is dropped.

use log::debug;
use thiserror::Error;

use crate::clock::{Clock, MonotonicClock};
use crate::engine::{Decision, Engine};
use crate::error::FrameError;

/// A command that has taken its place in the replicated log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    pub slot: u64,
    pub command: String,
}

/// The effects of feeding a frame, or a local submission, into a
/// [`Driver`]: bytes to broadcast to peers, and commands newly applied
/// to the log, in slot order.
#[derive(Debug, Default)]
pub struct DriverOutcome {
    pub outbound: Vec<Vec<u8>>,
    pub applied: Vec<Applied>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("a command is already pending on this driver")]
    ProposalInFlight,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

pub struct Driver<C: Clock = MonotonicClock> {
    engine: Engine<C>,
    next_open_slot: u64,
    pending: Option<String>,
}

impl Driver<MonotonicClock> {
    pub fn new(node_id: crate::NodeId, peer_count: usize) -> Self {
        Driver::with_engine(Engine::new(node_id, peer_count))
    }
}

impl<C: Clock> Driver<C> {
    pub fn with_engine(engine: Engine<C>) -> Self {
        Driver { engine, next_open_slot: 1, pending: None }
    }

    pub fn next_open_slot(&self) -> u64 {
        self.next_open_slot
    }

    pub fn peer_count(&self) -> usize {
        self.engine.peer_count()
    }

    pub fn set_peer_count(&mut self, peer_count: usize) {
        self.engine.set_peer_count(peer_count);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Proposes `command` into the next open slot. Only one command
    /// may be pending at a time; callers must wait for the
    /// corresponding [`Applied`] (surfaced either here or from a
    /// later [`Driver::receive`]) before submitting another.
    pub fn submit(&mut self, command: String) -> Result<DriverOutcome, DriverError> {
        if self.pending.is_some() {
            return Err(DriverError::ProposalInFlight);
        }
        self.pending = Some(command.clone());
        let outcome = self.engine.propose(self.next_open_slot, command)?;
        self.ingest(outcome.outbound, outcome.decisions)
    }

    /// Feeds an inbound frame into the underlying engine and drains
    /// every decision it causes, including the cascade of
    /// re-proposals that follow from this node's pending command
    /// being displaced.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<DriverOutcome, DriverError> {
        let outcome = self.engine.receive(bytes)?;
        self.ingest(outcome.outbound, outcome.decisions)
    }

    fn ingest(&mut self, outbound: Vec<Vec<u8>>, decisions: Vec<Decision>) -> Result<DriverOutcome, DriverError> {
        let mut result = DriverOutcome { outbound, applied: Vec::new() };
        let mut queue = decisions;
        while let Some(decision) = queue.pop() {
            result.applied.push(Applied { slot: decision.slot, command: decision.command.clone() });
            if decision.slot != self.next_open_slot {
                continue;
            }
            self.next_open_slot += 1;
            let displaced = match &self.pending {
                Some(pending) => *pending != decision.command,
                None => false,
            };
            if !displaced {
                self.pending = None;
                continue;
            }
            let pending = self.pending.take().expect("displaced implies pending is Some");
            debug!("slot {} went to a competitor; retrying pending command into slot {}", decision.slot, self.next_open_slot);
            let retry = self.engine.propose(self.next_open_slot, pending.clone())?;
            self.pending = Some(pending);
            result.outbound.extend(retry.outbound);
            queue.extend(retry.decisions);
        }
        result.applied.sort_by_key(|applied| applied.slot);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);
    impl Clock for Counter {
        fn tick(&mut self) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    fn driver(node_id: crate::NodeId, peer_count: usize) -> Driver<Counter> {
        Driver::with_engine(Engine::with_clock(node_id, peer_count, Counter(0)))
    }

    #[test]
    fn single_node_submit_applies_immediately() {
        let mut d = driver(0, 1);
        let outcome = d.submit("START_GAME".to_string()).unwrap();
        assert_eq!(outcome.applied, vec![Applied { slot: 1, command: "START_GAME".to_string() }]);
        assert_eq!(d.next_open_slot(), 2);
        assert!(!d.has_pending());
    }

    #[test]
    fn second_submit_while_pending_is_rejected() {
        let mut a = driver(0, 2);
        a.submit("first".to_string()).unwrap();
        assert!(matches!(a.submit("second".to_string()), Err(DriverError::ProposalInFlight)));
    }

    #[test]
    fn displaced_pending_command_is_retried_into_the_next_slot() {
        let mut nodes = vec![driver(0, 3), driver(1, 3), driver(2, 3)];
        let mut queue: Vec<(crate::NodeId, Vec<u8>)> = Vec::new();

        let outcome_a = nodes[0].submit("from-a".to_string()).unwrap();
        queue.extend(outcome_a.outbound.into_iter().map(|b| (0, b)));
        let outcome_c = nodes[2].submit("from-c".to_string()).unwrap();
        queue.extend(outcome_c.outbound.into_iter().map(|b| (2, b)));

        let mut applied: Vec<(crate::NodeId, Applied)> = Vec::new();
        while let Some((from, bytes)) = queue.pop() {
            for (id, node) in nodes.iter_mut().enumerate() {
                if id as crate::NodeId == from {
                    continue;
                }
                let outcome = node.receive(&bytes).unwrap();
                for a in outcome.applied {
                    applied.push((id as crate::NodeId, a));
                }
                queue.extend(outcome.outbound.into_iter().map(|b| (id as crate::NodeId, b)));
            }
        }

        // Every command eventually lands in some slot, and no driver
        // is left waiting once the dust settles.
        assert!(!nodes[0].has_pending());
        assert!(!nodes[2].has_pending());
        let commands: std::collections::HashSet<_> =
            applied.iter().map(|(_, a)| a.command.clone()).collect();
        assert!(commands.contains("from-a") || commands.contains("from-c"));
    }
}
