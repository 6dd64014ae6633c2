use chrono::{DateTime, Utc};

use crate::bonus::BonusBreakdown;
use crate::id::{PlayerId, TeamId, TournamentId, UserId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    /// The official end-of-tournament results. `None` until the tournament closed.
    pub results: Option<TournamentResults>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// End-of-tournament awards picked by an administrator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Awards {
    pub player_of_tournament: Option<PlayerId>,
    pub top_run_scorer: Option<PlayerId>,
    pub top_wicket_taker: Option<PlayerId>,
}

/// The official results of a closed tournament.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TournamentResults {
    /// The winner of the final.
    pub champion: TeamId,
    pub awards: Awards,
}

/// The running aggregates of a [`SeasonEntry`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Totals {
    pub points: i64,
    pub penalties: u64,
}

/// A user's participation in a tournament.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeasonEntry {
    pub user: UserId,
    pub tournament: TournamentId,
    /// The team the user backs for the whole season.
    pub season_team: TeamId,
    /// The user's end-of-tournament picks. The tournament winner is implied by
    /// `season_team`.
    pub picks: Awards,
    pub joined_at: DateTime<Utc>,
    pub totals: Totals,
    /// The tournament bonus applied to `totals`, if any.
    pub bonus: Option<BonusBreakdown>,
    /// The current leaderboard position, starting at 1. 0 if never ranked.
    pub rank: u32,
}

impl SeasonEntry {
    pub fn new(
        user: UserId,
        tournament: TournamentId,
        season_team: TeamId,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user,
            tournament,
            season_team,
            picks: Awards::default(),
            joined_at,
            totals: Totals::default(),
            bonus: None,
            rank: 0,
        }
    }

    #[inline]
    pub fn bonus_total(&self) -> i64 {
        self.bonus.map_or(0, |bonus| i64::from(bonus.total()))
    }
}
