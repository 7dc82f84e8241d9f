use std::collections::{BTreeSet, HashMap};

use paxos::NodeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VoteKind {
    WolfKill,
    VillagerLynch,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::WolfKill => "WolfKill",
            VoteKind::VillagerLynch => "VillagerLynch",
        }
    }
}

impl std::str::FromStr for VoteKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WolfKill" => Ok(VoteKind::WolfKill),
            "VillagerLynch" => Ok(VoteKind::VillagerLynch),
            _ => Err(()),
        }
    }
}

/// A single round of elimination voting: who may vote, and the
/// ballots cast so far.
#[derive(Clone, Debug)]
pub struct VoteSession {
    pub kind: VoteKind,
    pub eligible_voters: BTreeSet<NodeId>,
    pub ballots: HashMap<NodeId, NodeId>,
}

impl VoteSession {
    pub fn new(kind: VoteKind, eligible_voters: BTreeSet<NodeId>) -> Self {
        VoteSession { kind, eligible_voters, ballots: HashMap::new() }
    }

    pub fn is_ready_to_finalize(&self) -> bool {
        self.ballots.len() >= self.eligible_voters.len()
    }

    /// The unique strict-plurality target, or `None` if there is no
    /// ballot, or two or more players tie for the maximum.
    pub fn plurality_winner(&self) -> Option<NodeId> {
        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        for &target in self.ballots.values() {
            *counts.entry(target).or_insert(0) += 1;
        }
        let max = counts.values().copied().max()?;
        let mut winners = counts.into_iter().filter(|&(_, count)| count == max).map(|(id, _)| id);
        let winner = winners.next()?;
        match winners.next() {
            None => Some(winner),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(ballots: &[(NodeId, NodeId)], eligible: &[NodeId]) -> VoteSession {
        let mut session = VoteSession::new(VoteKind::VillagerLynch, eligible.iter().copied().collect());
        for &(voter, target) in ballots {
            session.ballots.insert(voter, target);
        }
        session
    }

    #[test]
    fn unique_plurality_wins() {
        let s = session(&[(1, 10), (2, 10), (3, 20)], &[1, 2, 3]);
        assert_eq!(s.plurality_winner(), Some(10));
    }

    #[test]
    fn tie_eliminates_nobody() {
        let s = session(&[(1, 10), (2, 20), (3, 30), (4, 10), (5, 20)], &[1, 2, 3, 4, 5]);
        assert_eq!(s.plurality_winner(), None);
    }

    #[test]
    fn no_ballots_eliminates_nobody() {
        let s = session(&[], &[1, 2, 3]);
        assert_eq!(s.plurality_winner(), None);
    }
}
