//! # Summary
//!
//! Per-slot state held by [`crate::Engine`]: the acceptor's promised
//! and accepted proposal, the decided value once known, and (when
//! this node is driving a proposal for the slot) the proposer's
//! in-flight round bookkeeping.

use std::collections::HashSet;

use crate::ballot::{NodeId, ProposalId};
use crate::message::PValue;

/// Acceptor-role state for a single slot. Every node keeps one of
/// these per slot it has ever heard about, regardless of whether it
/// is also proposing for that slot.
#[derive(Clone, Debug, Default)]
pub struct AcceptorState {
    /// Highest proposal number this node has promised or accepted.
    pub promised_id: ProposalId,
    /// Highest-numbered value this node has accepted, if any.
    pub accepted: Option<PValue>,
    /// The command this slot has converged on, once decided.
    pub decided: Option<String>,
}

/// Which phase a locally driven proposal round is in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProposerPhase {
    Prepare,
    Accept,
}

/// Proposer-role bookkeeping for a proposal this node originated for a
/// slot. Dropped once the round decides, is displaced, or is
/// abandoned in favor of a fresh round.
#[derive(Clone, Debug)]
pub struct ProposerState {
    pub proposal_id: ProposalId,
    pub value: String,
    pub phase: ProposerPhase,
    pub promised_by: HashSet<NodeId>,
    /// Highest proposal number seen among promises collected so far,
    /// together with the value it carried. Phase 2 must propose this
    /// value instead of its own once any promise carries a prior
    /// accepted value: adopting the wrong one (or any non-empty one
    /// indiscriminately) breaks Paxos safety.
    pub max_accepted: Option<PValue>,
    pub accepted_by: HashSet<NodeId>,
}

impl ProposerState {
    pub fn new(proposal_id: ProposalId, value: String) -> Self {
        ProposerState {
            proposal_id,
            value,
            phase: ProposerPhase::Prepare,
            promised_by: HashSet::new(),
            max_accepted: None,
            accepted_by: HashSet::new(),
        }
    }

    /// The value Phase 2 must carry: the proposer's own value unless a
    /// promise surfaced a previously accepted one, in which case that
    /// one must be re-proposed verbatim.
    pub fn phase2_value(&self) -> &str {
        self.max_accepted
            .as_ref()
            .map(|pvalue| pvalue.command.as_str())
            .unwrap_or(&self.value)
    }

    /// Fold in a promise's previously accepted value, keeping only the
    /// highest-numbered one seen across all promises collected so far.
    pub fn observe_accepted(&mut self, accepted: Option<PValue>) {
        if let Some(pvalue) = accepted {
            let supersedes = match &self.max_accepted {
                None => true,
                Some(current) => pvalue.proposal_id > current.proposal_id,
            };
            if supersedes {
                self.max_accepted = Some(pvalue);
            }
        }
    }
}
