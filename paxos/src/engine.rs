//! # Summary
//!
//! The single-decree-per-slot Paxos state machine. An [`Engine`] holds
//! every slot's acceptor state, at most one in-flight proposer round
//! per slot, and per-slot learner bookkeeping. It never touches a
//! socket: [`Engine::propose`] and [`Engine::receive`] return an
//! [`Outcome`] describing the bytes to broadcast to peers and any
//! slots that have newly decided.
//!
//! Every frame this node originates — whether minted directly by
//! [`propose`](Engine::propose) or produced while handling an inbound
//! frame — is first dispatched to this node's own state before being
//! handed back for broadcast. This loopback discipline means a node
//! never waits on its own network round-trip to make progress.

use std::collections::HashMap;
use std::collections::HashSet;

use log::{debug, info, trace};

use crate::ballot::{NodeId, ProposalId};
use crate::clock::{Clock, MonotonicClock};
use crate::error::FrameError;
use crate::message::{Frame, P1A, P1B, P2A, P2B, PValue};
use crate::slot::{AcceptorState, ProposerPhase, ProposerState};

/// Smallest majority of a group of `peer_count` nodes (including
/// self). `quorum_size(1) == 1`, `quorum_size(2) == 2`,
/// `quorum_size(3) == 2`.
pub fn quorum_size(peer_count: usize) -> usize {
    peer_count / 2 + 1
}

/// A slot whose command has been decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub slot: u64,
    pub command: String,
}

/// The effects of feeding a frame into an [`Engine`]: bytes to
/// broadcast to every peer, and any slots that newly decided as a
/// result.
#[derive(Debug, Default)]
pub struct Outcome {
    pub outbound: Vec<Vec<u8>>,
    pub decisions: Vec<Decision>,
}

impl Outcome {
    fn merge(&mut self, other: Outcome) {
        self.outbound.extend(other.outbound);
        self.decisions.extend(other.decisions);
    }
}

#[derive(Clone, Debug, Default)]
struct Learner {
    proposal_id: ProposalId,
    accepted_by: HashSet<NodeId>,
}

pub struct Engine<C: Clock = MonotonicClock> {
    node_id: NodeId,
    peer_count: usize,
    clock: C,
    slots: HashMap<u64, AcceptorState>,
    proposals: HashMap<u64, ProposerState>,
    learners: HashMap<u64, Learner>,
}

impl Engine<MonotonicClock> {
    pub fn new(node_id: NodeId, peer_count: usize) -> Self {
        Engine::with_clock(node_id, peer_count, MonotonicClock::new())
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(node_id: NodeId, peer_count: usize, clock: C) -> Self {
        Engine {
            node_id,
            peer_count,
            clock,
            slots: HashMap::new(),
            proposals: HashMap::new(),
            learners: HashMap::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn is_decided(&self, slot: u64) -> bool {
        self.slots.get(&slot).map_or(false, |acc| acc.decided.is_some())
    }

    pub fn decided_command(&self, slot: u64) -> Option<&str> {
        self.slots.get(&slot).and_then(|acc| acc.decided.as_deref())
    }

    /// Total group size (connected peers plus self) used to compute
    /// quorum. Membership may churn between rounds; each round reads
    /// whatever this is set to at the moment a Promise or Accepted is
    /// tallied, so a stale count only risks stalling a round, never
    /// violating safety.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn set_peer_count(&mut self, peer_count: usize) {
        self.peer_count = peer_count;
    }

    /// Begins a fresh proposer round for `slot` carrying `value`,
    /// minting a proposal number higher than any this node has used
    /// before. Returns the bytes this node must broadcast to its
    /// peers and, in the degenerate one-node group case, the decision
    /// that can follow from a self-satisfied quorum. A no-op if the
    /// slot is already decided: the engine never overwrites a decided
    /// value.
    pub fn propose(&mut self, slot: u64, value: String) -> Result<Outcome, FrameError> {
        if self.is_decided(slot) {
            return Ok(Outcome::default());
        }
        let proposal_id = ProposalId::new(self.clock.tick(), self.node_id);
        debug!("node {} proposing {} for slot {}", self.node_id, proposal_id, slot);
        self.proposals.insert(slot, ProposerState::new(proposal_id, value));
        let frame = Frame::Prepare(P1A { slot, proposal_id });
        self.originate(frame)
    }

    /// Feeds an inbound frame received from a peer (or from this
    /// node's own loopback) into the engine.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Outcome, FrameError> {
        let frame = Frame::decode(bytes)?;
        let (new_frames, decisions) = self.dispatch(frame);
        let mut outcome = Outcome { outbound: Vec::new(), decisions };
        for frame in new_frames {
            outcome.merge(self.originate(frame)?);
        }
        Ok(outcome)
    }

    /// Hands a locally originated frame to this node's own state
    /// first, then queues it for broadcast to peers alongside
    /// whatever it caused this node to originate in turn.
    fn originate(&mut self, frame: Frame) -> Result<Outcome, FrameError> {
        let bytes = frame.encode()?;
        let (new_frames, decisions) = self.dispatch(frame);
        let mut outcome = Outcome { outbound: vec![bytes], decisions };
        for frame in new_frames {
            outcome.merge(self.originate(frame)?);
        }
        Ok(outcome)
    }

    fn dispatch(&mut self, frame: Frame) -> (Vec<Frame>, Vec<Decision>) {
        trace!("node {} dispatching {:?} frame", self.node_id, frame.phase());
        match frame {
            Frame::Prepare(p1a) => (self.on_prepare(p1a), Vec::new()),
            Frame::Promise(p1b) => (self.on_promise(p1b), Vec::new()),
            Frame::Accept(p2a) => (self.on_accept(p2a), Vec::new()),
            Frame::Accepted(p2b) => self.on_accepted(p2b),
        }
    }

    fn on_prepare(&mut self, p1a: P1A) -> Vec<Frame> {
        let acc = self.slots.entry(p1a.slot).or_default();
        if p1a.proposal_id <= acc.promised_id {
            return Vec::new();
        }
        acc.promised_id = p1a.proposal_id;
        vec![Frame::Promise(P1B {
            node_id: self.node_id,
            slot: p1a.slot,
            proposal_id: acc.promised_id,
            accepted: acc.accepted.clone(),
        })]
    }

    fn on_promise(&mut self, p1b: P1B) -> Vec<Frame> {
        let state = match self.proposals.get_mut(&p1b.slot) {
            Some(state) => state,
            None => return Vec::new(),
        };
        if state.phase != ProposerPhase::Prepare || p1b.proposal_id != state.proposal_id {
            return Vec::new();
        }
        if !state.promised_by.insert(p1b.node_id) {
            return Vec::new();
        }
        state.observe_accepted(p1b.accepted);
        if state.promised_by.len() < quorum_size(self.peer_count) {
            return Vec::new();
        }
        if state.phase2_value().is_empty() {
            // Every promise collected so far carried a null value, and
            // this proposer's own value is null too: there is nothing
            // safe to propose in Phase 2. Abort this round rather than
            // broadcast an Accept for the empty string.
            return Vec::new();
        }
        state.phase = ProposerPhase::Accept;
        let command = state.phase2_value().to_string();
        let proposal_id = state.proposal_id;
        vec![Frame::Accept(P2A { slot: p1b.slot, proposal_id, command })]
    }

    fn on_accept(&mut self, p2a: P2A) -> Vec<Frame> {
        let acc = self.slots.entry(p2a.slot).or_default();
        if p2a.proposal_id < acc.promised_id {
            return Vec::new();
        }
        acc.promised_id = p2a.proposal_id;
        acc.accepted = Some(PValue {
            slot: p2a.slot,
            proposal_id: p2a.proposal_id,
            command: p2a.command,
        });
        vec![Frame::Accepted(P2B {
            node_id: self.node_id,
            slot: p2a.slot,
            proposal_id: p2a.proposal_id,
        })]
    }

    fn on_accepted(&mut self, p2b: P2B) -> (Vec<Frame>, Vec<Decision>) {
        let learner = self.learners.entry(p2b.slot).or_default();
        if p2b.proposal_id > learner.proposal_id {
            learner.proposal_id = p2b.proposal_id;
            learner.accepted_by.clear();
        }
        if p2b.proposal_id == learner.proposal_id {
            learner.accepted_by.insert(p2b.node_id);
        }
        (Vec::new(), self.try_decide(p2b.slot).into_iter().collect())
    }

    /// Promotes a slot to decided once a quorum of `Accepted` replies
    /// agree on the same proposal number and this node has itself
    /// observed the matching accepted value. The two can race when a
    /// node's own `Accepted` arrives before the `Accept` that
    /// justified it.
    fn try_decide(&mut self, slot: u64) -> Option<Decision> {
        let already_decided = self.slots.get(&slot).map_or(false, |acc| acc.decided.is_some());
        if already_decided {
            return None;
        }
        let learner = self.learners.get(&slot)?;
        if learner.accepted_by.len() < quorum_size(self.peer_count) {
            return None;
        }
        let acc = self.slots.get_mut(&slot)?;
        let accepted = acc.accepted.as_ref()?;
        if accepted.proposal_id != learner.proposal_id {
            return None;
        }
        let command = accepted.command.clone();
        acc.decided = Some(command.clone());
        self.proposals.remove(&slot);
        info!("node {} sees slot {} decided: {:?}", self.node_id, slot, command);
        Some(Decision { slot, command })
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

    fn engine(node_id: NodeId, peer_count: usize) -> Engine<Counter> {
        Engine::with_clock(node_id, peer_count, Counter(0))
    }

    #[test]
    fn quorum_sizes_match_expected_majorities() {
        assert_eq!(quorum_size(1), 1);
        assert_eq!(quorum_size(2), 2);
        assert_eq!(quorum_size(3), 2);
        assert_eq!(quorum_size(4), 3);
        assert_eq!(quorum_size(5), 3);
    }

    #[test]
    fn single_node_group_decides_immediately_via_loopback() {
        let mut e = engine(0, 1);
        let outcome = e.propose(0, "hello".to_string()).unwrap();
        assert_eq!(outcome.decisions, vec![Decision { slot: 0, command: "hello".to_string() }]);
    }

    #[test]
    fn three_node_group_decides_after_quorum_of_replies() {
        let mut nodes = vec![engine(0, 3), engine(1, 3), engine(2, 3)];

        let mut queue: Vec<(NodeId, Vec<u8>)> = Vec::new();
        let outcome = nodes[0].propose(0, "alpha".to_string()).unwrap();
        queue.extend(outcome.outbound.into_iter().map(|bytes| (0, bytes)));
        let mut decided = outcome.decisions;

        // Broadcast every produced frame to every peer besides its
        // sender, draining until the network goes quiet.
        while let Some((from, bytes)) = queue.pop() {
            for (id, node) in nodes.iter_mut().enumerate() {
                if id as NodeId == from {
                    continue;
                }
                let outcome = node.receive(&bytes).unwrap();
                decided.extend(outcome.decisions);
                queue.extend(outcome.outbound.into_iter().map(|b| (id as NodeId, b)));
            }
        }

        let expected = Decision { slot: 0, command: "alpha".to_string() };
        assert!(!decided.is_empty());
        assert!(decided.iter().all(|d| *d == expected));
    }

    #[test]
    fn acceptor_adopts_highest_previously_accepted_value_not_any_nonempty_one() {
        let mut proposer = engine(0, 3);
        let proposal_id = ProposalId::new(1, 0);
        let p1b_low = P1B {
            node_id: 1,
            slot: 0,
            proposal_id,
            accepted: Some(PValue { slot: 0, proposal_id: ProposalId::new(1, 1), command: "stale".to_string() }),
        };
        let p1b_high = P1B {
            node_id: 2,
            slot: 0,
            proposal_id,
            accepted: Some(PValue { slot: 0, proposal_id: ProposalId::new(5, 1), command: "fresh".to_string() }),
        };
        proposer.proposals.insert(0, ProposerState::new(proposal_id, "mine".to_string()));
        proposer.on_promise(p1b_low.clone());
        let accept_frames = proposer.on_promise(p1b_high);
        match &accept_frames[0] {
            Frame::Accept(p2a) => assert_eq!(p2a.command, "fresh"),
            other => panic!("expected Accept frame, got {:?}", other),
        }
    }

    #[test]
    fn stale_prepare_is_silently_ignored() {
        let mut e = engine(0, 3);
        let high = P1A { slot: 0, proposal_id: ProposalId::new(10, 0) };
        assert_eq!(e.on_prepare(high).len(), 1);

        let low = P1A { slot: 0, proposal_id: ProposalId::new(5, 0) };
        assert!(e.on_prepare(low).is_empty());
        assert_eq!(e.slots.get(&0).unwrap().promised_id, ProposalId::new(10, 0));
    }

    #[test]
    fn phase_two_is_aborted_when_the_adopted_value_is_empty() {
        let mut e = engine(0, 1);
        let proposal_id = ProposalId::new(1, 0);
        e.proposals.insert(0, ProposerState::new(proposal_id, String::new()));
        let p1b = P1B { node_id: 1, slot: 0, proposal_id, accepted: None };
        assert!(e.on_promise(p1b).is_empty());
        assert_eq!(e.proposals.get(&0).unwrap().phase, ProposerPhase::Prepare);
    }

    #[test]
    fn duplicate_promise_from_same_node_counts_once() {
        let proposal_id = ProposalId::new(1, 0);
        let mut e = engine(0, 3);
        e.proposals.insert(0, ProposerState::new(proposal_id, "v".to_string()));
        let p1b = P1B { node_id: 1, slot: 0, proposal_id, accepted: None };
        assert!(e.on_promise(p1b.clone()).is_empty());
        assert!(e.on_promise(p1b).is_empty());
        assert_eq!(e.proposals.get(&0).unwrap().promised_by.len(), 1);
    }
}
