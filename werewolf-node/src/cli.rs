//! # Summary
//!
//! Operator-facing shorthand typed at the `werewolf-node` prompt,
//! translated into the replicated command grammar `werewolf::Command`
//! speaks. Mirrors the split this codebase already draws in
//! `chatroom`'s client between a human-friendly local `Command` enum
//! and the wire protocol it drives.

use paxos::NodeId;
use werewolf::VoteKind;

pub enum LocalCommand {
    Ready,
    Vote { target: NodeId },
    Reset,
    Help,
}

pub fn usage() {
    println!(
        "{}{}{}{}{}{}",
        "--------------------------------------------------------------\n",
        "ready              | r              -- signal lobby-ready\n",
        "vote <TARGET_ID>    | v <TARGET_ID>  -- cast a ballot in the active session\n",
        "reset              | x              -- return to Lobby (local only)\n",
        "help               | h              -- show this message\n",
        "--------------------------------------------------------------",
    );
}

impl std::str::FromStr for LocalCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, ' ');
        match parts.next() {
            Some("ready") | Some("r") => Ok(LocalCommand::Ready),
            Some("reset") | Some("x") => Ok(LocalCommand::Reset),
            Some("help") | Some("h") => Ok(LocalCommand::Help),
            Some("vote") | Some("v") => {
                let target = parts.next().ok_or(())?.trim().parse().map_err(|_| ())?;
                Ok(LocalCommand::Vote { target })
            }
            _ => Err(()),
        }
    }
}

/// The session kind the local player is expected to vote in right
/// now, if any.
pub fn active_kind(phase: werewolf::Phase) -> Option<VoteKind> {
    match phase {
        werewolf::Phase::Night => Some(VoteKind::WolfKill),
        werewolf::Phase::Day => Some(VoteKind::VillagerLynch),
        werewolf::Phase::Lobby | werewolf::Phase::GameOver => None,
    }
}
