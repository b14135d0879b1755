//! Vote: one ballot per replica.
//!
//! Each replica only ever writes its own ballot, bumping a generation counter
//! on every change. Merge keeps the highest generation per replica, so ballot
//! deltas are idempotent and commute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::ReplicaId;

/// One replica's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ballot {
    pub generation: u64,
    pub vote: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDelta {
    pub ballots: Vec<(ReplicaId, Ballot)>,
}

/// The materialized tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteValue {
    pub self_vote: bool,
    pub votes_for: u32,
    pub total_voters: u32,
}

impl VoteValue {
    pub fn majority(&self) -> bool {
        self.votes_for * 2 > self.total_voters
    }

    pub fn unanimous(&self) -> bool {
        self.total_voters > 0 && self.votes_for == self.total_voters
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    replica: ReplicaId,
    ballots: BTreeMap<ReplicaId, Ballot>,
    pending: bool,
}

impl Vote {
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            ballots: BTreeMap::new(),
            pending: false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    pub fn value(&self) -> VoteValue {
        let votes_for = self.ballots.values().filter(|b| b.vote).count();
        VoteValue {
            self_vote: self.ballots.get(&self.replica).is_some_and(|b| b.vote),
            votes_for: u32::try_from(votes_for).unwrap_or(u32::MAX),
            total_voters: u32::try_from(self.ballots.len()).unwrap_or(u32::MAX),
        }
    }

    /// Cast this replica's vote. The first call registers the replica as a
    /// voter, whatever the vote.
    pub fn vote(&mut self, vote: bool) {
        let generation = match self.ballots.get(&self.replica) {
            Some(ballot) if ballot.vote == vote => return,
            Some(ballot) => ballot.generation + 1,
            None => 1,
        };
        self.ballots.insert(self.replica, Ballot { generation, vote });
        self.pending = true;
    }

    /// Export this replica's own ballot.
    pub fn export_delta(&mut self, include_if_empty: bool) -> Option<VoteDelta> {
        if !self.pending && !include_if_empty {
            return None;
        }
        self.pending = false;
        Some(VoteDelta {
            ballots: self
                .ballots
                .get(&self.replica)
                .map(|ballot| vec![(self.replica, *ballot)])
                .unwrap_or_default(),
        })
    }

    pub fn apply_delta(&mut self, delta: &VoteDelta) {
        for (replica, ballot) in &delta.ballots {
            match self.ballots.get(replica) {
                Some(current) if current >= ballot => {}
                _ => {
                    self.ballots.insert(*replica, *ballot);
                }
            }
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value();
        write!(
            f,
            "Vote(self={}, for={}, voters={})",
            value.self_vote, value.votes_for, value.total_voters
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R1: ReplicaId = ReplicaId::from_bytes([1; 16]);
    const R2: ReplicaId = ReplicaId::from_bytes([2; 16]);
    const R3: ReplicaId = ReplicaId::from_bytes([3; 16]);

    #[test]
    fn test_tally_across_replicas() {
        let mut votes: Vec<Vote> = [R1, R2, R3].into_iter().map(Vote::new).collect();
        votes[0].vote(true);
        votes[1].vote(true);
        votes[2].vote(false);

        let deltas: Vec<VoteDelta> = votes
            .iter_mut()
            .map(|v| v.export_delta(false).unwrap())
            .collect();
        for vote in &mut votes {
            for delta in &deltas {
                vote.apply_delta(delta);
            }
        }

        for vote in &votes {
            let value = vote.value();
            assert_eq!(value.votes_for, 2);
            assert_eq!(value.total_voters, 3);
            assert!(value.majority());
            assert!(!value.unanimous());
        }
        assert!(votes[0].value().self_vote);
        assert!(!votes[2].value().self_vote);
    }

    #[test]
    fn test_stale_ballot_ignored() {
        let mut origin = Vote::new(R1);
        origin.vote(true);
        let first = origin.export_delta(false).unwrap();
        origin.vote(false);
        let second = origin.export_delta(false).unwrap();

        let mut observer = Vote::new(R2);
        observer.apply_delta(&second);
        observer.apply_delta(&first);
        assert_eq!(observer.value().votes_for, 0);
        assert_eq!(observer.value().total_voters, 1);
    }

    #[test]
    fn test_restored_voter_continues_generation() {
        let mut origin = Vote::new(R1);
        origin.vote(true);
        origin.export_delta(false);
        origin.vote(false);
        let latest = origin.export_delta(false).unwrap();

        let mut observer = Vote::new(R2);
        observer.apply_delta(&latest);

        let mut restored = Vote::new(R1);
        restored.apply_delta(&latest);
        restored.vote(true);
        let ballot = restored.export_delta(false).unwrap();
        assert_eq!(ballot.ballots[0].1.generation, 3);

        observer.apply_delta(&ballot);
        assert_eq!(observer.value().votes_for, 1);
    }

    #[test]
    fn test_same_vote_twice_is_noop() {
        let mut vote = Vote::new(R1);
        vote.vote(true);
        vote.export_delta(false);
        vote.vote(true);
        assert!(vote.export_delta(false).is_none());
        assert_eq!(vote.to_string(), "Vote(self=true, for=1, voters=1)");
    }
}
