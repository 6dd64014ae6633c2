use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::id::{MatchId, PlayerId, TeamId, TournamentId};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The stage of the tournament a match belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatchType {
    League,
    Qualifier,
    Eliminator,
    Final,
}

impl MatchType {
    /// Returns the points awarded for predicting the winner of a match of this type.
    #[inline]
    pub const fn base_points(self) -> i32 {
        match self {
            Self::League => 3,
            Self::Qualifier | Self::Eliminator => 5,
            Self::Final => 7,
        }
    }

    /// Returns the flat fee charged for predicting the wrong winner.
    #[inline]
    pub const fn penalty_fee(self) -> u32 {
        match self {
            Self::League => 2,
            Self::Qualifier | Self::Eliminator => 3,
            Self::Final => 5,
        }
    }

    #[inline]
    pub const fn is_playoff(self) -> bool {
        !matches!(self, Self::League)
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::League => 0,
            Self::Qualifier => 1,
            Self::Eliminator => 2,
            Self::Final => 3,
        }
    }

    pub const fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::League),
            1 => Some(Self::Qualifier),
            2 => Some(Self::Eliminator),
            3 => Some(Self::Final),
            _ => None,
        }
    }
}

impl Display for MatchType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::League => "league",
            Self::Qualifier => "qualifier",
            Self::Eliminator => "eliminator",
            Self::Final => "final",
        })
    }
}

impl FromStr for MatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "league" => Ok(Self::League),
            "qualifier" => Ok(Self::Qualifier),
            "eliminator" => Ok(Self::Eliminator),
            "final" => Ok(Self::Final),
            _ => Err(Error::InvalidPrediction("unknown match type")),
        }
    }
}

/// A team spot in a match. Playoff matches start out with [`Unassigned`] slots which are
/// filled by the bracket progression.
///
/// [`Unassigned`]: Self::Unassigned
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Slot {
    Assigned(TeamId),
    Unassigned,
}

impl Slot {
    /// Creates a new `Slot` from an [`Option`]. A `Some(team)` value translates into
    /// `Assigned(team)`, `None` translates into `Unassigned`.
    #[inline]
    pub fn new(team: Option<TeamId>) -> Self {
        match team {
            Some(team) => Self::Assigned(team),
            None => Self::Unassigned,
        }
    }

    /// Returns `true` if the `Slot` is [`Assigned`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use prediction_contest_core::{Slot, TeamId};
    /// assert!(Slot::Assigned(TeamId(1)).is_assigned());
    /// assert!(!Slot::Unassigned.is_assigned());
    /// ```
    ///
    /// [`Assigned`]: Self::Assigned
    #[inline]
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    #[inline]
    pub fn team(&self) -> Option<TeamId> {
        match self {
            Self::Assigned(team) => Some(*team),
            Self::Unassigned => None,
        }
    }
}

impl From<TeamId> for Slot {
    #[inline]
    fn from(team: TeamId) -> Self {
        Self::Assigned(team)
    }
}

/// The official result of a completed match.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Outcome {
    pub winner: TeamId,
    pub player_of_match: PlayerId,
    /// The team that batted in the first innings.
    pub batted_first: TeamId,
    pub first_innings_runs: u32,
    pub first_innings_wickets: u8,
    /// The match was played with reduced overs. Score and wicket picks never count.
    pub shortened: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", content = "outcome"))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatchStatus {
    Upcoming,
    Completed(Outcome),
    Cancelled,
}

impl MatchStatus {
    pub const fn to_u8(&self) -> u8 {
        match self {
            Self::Upcoming => 0,
            Self::Completed(_) => 1,
            Self::Cancelled => 2,
        }
    }
}

/// A single match of the tournament.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub tournament: TournamentId,
    /// The sequence number of the match. Gives a strict total order over all matches of a
    /// tournament.
    pub number: u32,
    pub kind: MatchType,
    pub teams: [Slot; 2],
    pub start: DateTime<Utc>,
    pub status: MatchStatus,
}

impl Match {
    #[inline]
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.status {
            MatchStatus::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self.status, MatchStatus::Completed(_))
    }

    #[inline]
    pub fn is_upcoming(&self) -> bool {
        matches!(self.status, MatchStatus::Upcoming)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, MatchStatus::Cancelled)
    }

    /// Returns `true` if `team` is assigned to either slot of this match.
    #[inline]
    pub fn contains(&self, team: TeamId) -> bool {
        self.teams.iter().any(|slot| *slot == Slot::Assigned(team))
    }

    /// Returns the position (0 or 1) of `team` in this match.
    pub fn position_of(&self, team: TeamId) -> Option<usize> {
        self.teams
            .iter()
            .position(|slot| *slot == Slot::Assigned(team))
    }

    /// Returns both assigned teams.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResult`] if any slot is still unassigned.
    pub fn assigned_teams(&self) -> Result<[TeamId; 2]> {
        match self.teams {
            [Slot::Assigned(a), Slot::Assigned(b)] => Ok([a, b]),
            _ => Err(Error::MalformedResult(self.id)),
        }
    }

    /// Returns the winner and loser of a completed match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCompleted`] if the match has no result and
    /// [`Error::MalformedResult`] if the result does not fit the match.
    pub fn winner_and_loser(&self) -> Result<(TeamId, TeamId)> {
        let outcome = self.outcome().ok_or(Error::NotCompleted(self.id))?;
        let [a, b] = self.assigned_teams()?;

        if outcome.winner == a {
            Ok((a, b))
        } else if outcome.winner == b {
            Ok((b, a))
        } else {
            Err(Error::MalformedResult(self.id))
        }
    }

    /// Checks that `outcome` is a valid result for this match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResult`] if the match has unassigned slots, the winner or
    /// the first batting team are not part of the match, or the wicket count exceeds 10.
    pub fn validate_outcome(&self, outcome: &Outcome) -> Result<()> {
        let teams = self.assigned_teams()?;

        if !teams.contains(&outcome.winner)
            || !teams.contains(&outcome.batted_first)
            || outcome.first_innings_wickets > 10
        {
            return Err(Error::MalformedResult(self.id));
        }

        Ok(())
    }
}

impl Index<usize> for Match {
    type Output = Slot;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.teams[index]
    }
}

impl IndexMut<usize> for Match {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.teams[index]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::{Match, MatchStatus, MatchType, Outcome, Slot};
    use crate::id::{MatchId, PlayerId, TeamId, TournamentId};
    use crate::Error;

    pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    pub fn fixture(id: u64, kind: MatchType, teams: [Option<u64>; 2], start: DateTime<Utc>) -> Match {
        Match {
            id: MatchId(id),
            tournament: TournamentId(1),
            number: id as u32,
            kind,
            teams: teams.map(|team| Slot::new(team.map(TeamId))),
            start,
            status: MatchStatus::Upcoming,
        }
    }

    pub fn outcome(winner: u64, batted_first: u64, runs: u32, wickets: u8) -> Outcome {
        Outcome {
            winner: TeamId(winner),
            player_of_match: PlayerId(100),
            batted_first: TeamId(batted_first),
            first_innings_runs: runs,
            first_innings_wickets: wickets,
            shortened: false,
        }
    }

    #[test]
    fn test_match_type_values() {
        assert!(MatchType::League.base_points() < MatchType::Qualifier.base_points());
        assert_eq!(
            MatchType::Qualifier.base_points(),
            MatchType::Eliminator.base_points()
        );
        assert!(MatchType::Eliminator.base_points() < MatchType::Final.base_points());

        assert_eq!(MatchType::League.penalty_fee(), 2);
        assert_eq!(MatchType::Eliminator.penalty_fee(), 3);
        assert_eq!(MatchType::Final.penalty_fee(), 5);

        for kind in [
            MatchType::League,
            MatchType::Qualifier,
            MatchType::Eliminator,
            MatchType::Final,
        ] {
            assert_eq!(MatchType::from_u8(kind.to_u8()), Some(kind));
            assert_eq!(kind.to_string().parse::<MatchType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_winner_and_loser() {
        let mut m = fixture(1, MatchType::League, [Some(1), Some(2)], utc(2025, 3, 1, 14, 0));
        assert!(matches!(m.winner_and_loser(), Err(Error::NotCompleted(_))));

        m.status = MatchStatus::Completed(outcome(2, 1, 150, 7));
        assert_eq!(m.winner_and_loser().unwrap(), (TeamId(2), TeamId(1)));

        m.status = MatchStatus::Completed(outcome(3, 1, 150, 7));
        assert!(matches!(m.winner_and_loser(), Err(Error::MalformedResult(_))));
    }

    #[test]
    fn test_validate_outcome() {
        let m = fixture(1, MatchType::League, [Some(1), Some(2)], utc(2025, 3, 1, 14, 0));
        assert!(m.validate_outcome(&outcome(1, 2, 150, 7)).is_ok());
        assert!(m.validate_outcome(&outcome(3, 2, 150, 7)).is_err());
        assert!(m.validate_outcome(&outcome(1, 3, 150, 7)).is_err());
        assert!(m.validate_outcome(&outcome(1, 2, 150, 11)).is_err());

        let m = fixture(2, MatchType::Final, [Some(1), None], utc(2025, 3, 1, 14, 0));
        assert!(m.validate_outcome(&outcome(1, 1, 150, 7)).is_err());
    }
}
