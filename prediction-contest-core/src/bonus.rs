//! End-of-tournament bonus.
use chrono::{DateTime, Utc};

use crate::bracket::Playoff;
use crate::id::{PlayerId, TournamentId};
use crate::rescore;
use crate::store::Store;
use crate::tournament::{Awards, SeasonEntry, TournamentResults};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Points awarded per matched category.
pub const TOURNAMENT_BONUS: i32 = 5;

/// The bonus points of an entry per category.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BonusBreakdown {
    pub champion: i32,
    pub player_of_tournament: i32,
    pub top_run_scorer: i32,
    pub top_wicket_taker: i32,
}

impl BonusBreakdown {
    #[inline]
    pub fn total(&self) -> i32 {
        self.champion + self.player_of_tournament + self.top_run_scorer + self.top_wicket_taker
    }
}

fn award(pick: Option<PlayerId>, actual: Option<PlayerId>) -> i32 {
    match (pick, actual) {
        (Some(pick), Some(actual)) if pick == actual => TOURNAMENT_BONUS,
        _ => 0,
    }
}

/// Computes the bonus of `entry` against the official `results`.
pub fn tournament_bonus(entry: &SeasonEntry, results: &TournamentResults) -> BonusBreakdown {
    BonusBreakdown {
        champion: if entry.season_team == results.champion {
            TOURNAMENT_BONUS
        } else {
            0
        },
        player_of_tournament: award(
            entry.picks.player_of_tournament,
            results.awards.player_of_tournament,
        ),
        top_run_scorer: award(entry.picks.top_run_scorer, results.awards.top_run_scorer),
        top_wicket_taker: award(entry.picks.top_wicket_taker, results.awards.top_wicket_taker),
    }
}

/// Closes `tournament`: records the official results with the winner of the final as
/// champion, applies the bonus of every entry and refreshes totals and ranks.
///
/// Running it again replaces the previously applied bonuses.
///
/// # Errors
///
/// Returns [`Error::FinalNotCompleted`] if the final has no result yet.
pub async fn apply_tournament_bonuses<S>(
    store: &S,
    tournament: TournamentId,
    awards: Awards,
    now: DateTime<Utc>,
) -> Result<TournamentResults>
where
    S: Store,
{
    if store.tournament(tournament).await?.is_none() {
        return Err(Error::TournamentNotFound(tournament));
    }

    let matches = store.matches(tournament).await?;
    let final_ = Playoff::locate(&matches)
        .final_
        .filter(|m| m.is_completed())
        .ok_or(Error::FinalNotCompleted)?;
    let (champion, _) = final_.winner_and_loser()?;

    let results = TournamentResults { champion, awards };
    store.set_tournament_results(tournament, &results).await?;

    for entry in store.entries(tournament).await? {
        let bonus = tournament_bonus(&entry, &results);
        log::debug!("Bonus for user {}: {:?}", entry.user, bonus);

        store
            .set_entry_bonus(tournament, entry.user, Some(bonus))
            .await?;
    }

    rescore::refresh_leaderboard(store, tournament, now).await?;

    log::info!(
        "Applied tournament bonuses for tournament {} (champion {})",
        tournament,
        champion
    );

    Ok(results)
}
