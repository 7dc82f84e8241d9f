//! # Summary
//!
//! The alphabet of the replicated log. Commands are colon-delimited
//! ASCII strings; unknown prefixes are ignored by the caller rather
//! than treated as an error, since a future version of this game may
//! add prefixes an older peer doesn't recognize yet.

use paxos::NodeId;

use crate::vote::VoteKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    VoteStart(NodeId),
    StartGame,
    Vote { voter: NodeId, target: NodeId, kind: VoteKind },
}

impl Command {
    pub fn encode(&self) -> String {
        match self {
            Command::VoteStart(id) => format!("VOTE_START:{}", id),
            Command::StartGame => "START_GAME".to_string(),
            Command::Vote { voter, target, kind } => {
                format!("VOTE:{}:{}:{}", voter, target, kind.as_str())
            }
        }
    }
}

impl std::str::FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match parts.next() {
            Some("VOTE_START") => {
                let id = parts.next().ok_or(())?.parse().map_err(|_| ())?;
                if parts.next().is_some() {
                    return Err(());
                }
                Ok(Command::VoteStart(id))
            }
            Some("START_GAME") => {
                if parts.next().is_some() {
                    return Err(());
                }
                Ok(Command::StartGame)
            }
            Some("VOTE") => {
                let voter = parts.next().ok_or(())?.parse().map_err(|_| ())?;
                let target = parts.next().ok_or(())?.parse().map_err(|_| ())?;
                let kind = parts.next().ok_or(())?.parse().map_err(|_| ())?;
                if parts.next().is_some() {
                    return Err(());
                }
                Ok(Command::Vote { voter, target, kind })
            }
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_start() {
        assert_eq!("VOTE_START:101".parse(), Ok(Command::VoteStart(101)));
    }

    #[test]
    fn parses_start_game() {
        assert_eq!("START_GAME".parse(), Ok(Command::StartGame));
    }

    #[test]
    fn parses_vote() {
        assert_eq!(
            "VOTE:101:202:WolfKill".parse(),
            Ok(Command::Vote { voter: 101, target: 202, kind: VoteKind::WolfKill }),
        );
    }

    #[test]
    fn rejects_malformed_vote() {
        assert!("VOTE:abc:def".parse::<Command>().is_err());
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!("PING".parse::<Command>().is_err());
    }

    #[test]
    fn round_trips_through_encode_and_parse() {
        let command = Command::Vote { voter: 1, target: 2, kind: VoteKind::VillagerLynch };
        assert_eq!(command.encode().parse(), Ok(command));
    }
}
