//! League table computed from completed league matches.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::iter::FusedIterator;

use crate::id::TeamId;
use crate::matches::{Match, MatchType};
use crate::tournament::Team;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Points for a league win.
pub const POINTS_PER_WIN: u32 = 2;

#[derive(Clone, Debug, Default)]
pub struct Standings {
    entries: Vec<Entry>,
}

impl Standings {
    /// Computes the standings of `teams` from all completed league matches in `matches`.
    /// Playoff matches and matches without a result are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResult`] if a completed league match has a result that does
    /// not fit the match or involves a team missing from `teams`.
    pub fn from_matches(teams: &[Team], matches: &[Match]) -> Result<Self> {
        let mut entries: Vec<Entry> = teams.iter().map(Entry::new).collect();
        let index: HashMap<TeamId, usize> = teams
            .iter()
            .enumerate()
            .map(|(index, team)| (team.id, index))
            .collect();

        for m in matches
            .iter()
            .filter(|m| m.kind == MatchType::League && m.is_completed())
        {
            let (winner, loser) = m.winner_and_loser()?;
            let winner = *index.get(&winner).ok_or(Error::MalformedResult(m.id))?;
            let loser = *index.get(&loser).ok_or(Error::MalformedResult(m.id))?;

            entries[winner].played += 1;
            entries[winner].won += 1;
            entries[winner].points += POINTS_PER_WIN;

            entries[loser].played += 1;
            entries[loser].lost += 1;
        }

        entries.sort_by(Entry::cmp_rank);

        Ok(Self { entries })
    }

    /// Returns the entry at `position`, starting at 0 for the leader.
    #[inline]
    pub fn get(&self, position: usize) -> Option<&Entry> {
        self.entries.get(position)
    }

    /// Returns the position of `team`, starting at 0 for the leader.
    pub fn position(&self, team: TeamId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.team == team)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a Standings {
    type Item = &'a Entry;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    pub team: TeamId,
    pub name: String,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub points: u32,
}

impl Entry {
    fn new(team: &Team) -> Self {
        Self {
            team: team.id,
            name: team.name.clone(),
            played: 0,
            won: 0,
            lost: 0,
            points: 0,
        }
    }

    /// Points descending, wins descending, name ascending.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .points
            .cmp(&self.points)
            .then_with(|| other.won.cmp(&self.won))
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[derive(Clone, Debug)]
pub struct Iter<'a> {
    inner: &'a Standings,
    next: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.entries.get(self.next)?;
        self.next += 1;
        Some(entry)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.entries.len() - self.next
    }
}

impl<'a> FusedIterator for Iter<'a> {}
