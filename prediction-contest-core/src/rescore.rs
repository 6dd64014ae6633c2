//! Propagates match results into prediction scores, entry totals and ranks.
//!
//! Every stage reads its inputs from the [`Store`] and overwrites its outputs, so any
//! workflow can be re-run after a partial failure and converges to the same state.
//! Totals are never adjusted incrementally: they are always recomputed as the sum over the
//! stored score records plus the applied tournament bonus.
use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::bonus;
use crate::bracket::{self, Playoff};
use crate::id::{MatchId, TournamentId, UserId};
use crate::matches::{Match, MatchStatus, Outcome};
use crate::prediction::{Prediction, ScoreRecord};
use crate::scoring;
use crate::store::Store;
use crate::tournament::{SeasonEntry, Totals};
use crate::{Error, Result};

/// Summary of a rescore run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RescoreReport {
    /// Number of active predictions scored.
    pub scored: usize,
    /// Number of inactive predictions whose score was cleared.
    pub cleared: usize,
}

impl RescoreReport {
    fn merge(&mut self, other: Self) {
        self.scored += other.scored;
        self.cleared += other.cleared;
    }
}

/// Records `outcome` as the result of the match `id` and propagates it.
///
/// If the match already has a result the new outcome is treated as a correction and is
/// rejected if any later match already completed. Correcting the final of a closed
/// tournament re-applies the tournament bonus with the new champion.
///
/// # Errors
///
/// Returns [`Error::MalformedResult`] if `outcome` does not fit the match,
/// [`Error::Inconsistent`] if the correction is out of sequence, and
/// [`Error::EntryNotFound`] if an active prediction has no season entry. The stored result
/// is left untouched in any of these cases.
pub async fn record_result<S>(
    store: &S,
    id: MatchId,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Result<RescoreReport>
where
    S: Store,
{
    let m = store.get_match(id).await?.ok_or(Error::MatchNotFound(id))?;
    m.validate_outcome(&outcome)?;

    let is_correction = m.is_completed();
    if is_correction {
        let matches = store.matches(m.tournament).await?;
        sequence_guard(&m, &matches)?;

        log::info!("Correcting result of match {}", m.number);
    }

    let entries = entries_by_user(store, m.tournament).await?;
    let predictions = store.predictions_for_match(id).await?;
    check_entries(&predictions, &entries, now)?;

    store
        .set_match_status(id, &MatchStatus::Completed(outcome))
        .await?;

    let report = rescore_match(store, id, is_correction, now).await?;
    bracket::advance_bracket(store, m.tournament).await?;

    if is_correction {
        reapply_bonuses(store, &m, now).await?;
    }

    Ok(report)
}

/// Cancels the match `id`. Scores of the match stop counting towards the totals and the
/// bracket advances without it.
///
/// # Errors
///
/// Returns [`Error::Inconsistent`] if the match already has a result and a later match
/// already completed.
pub async fn cancel_match<S>(store: &S, id: MatchId, now: DateTime<Utc>) -> Result<()>
where
    S: Store,
{
    let m = store.get_match(id).await?.ok_or(Error::MatchNotFound(id))?;
    if m.is_cancelled() {
        return Ok(());
    }

    if m.is_completed() {
        let matches = store.matches(m.tournament).await?;
        sequence_guard(&m, &matches)?;
    }

    store.set_match_status(id, &MatchStatus::Cancelled).await?;

    refresh_leaderboard(store, m.tournament, now).await?;
    bracket::advance_bracket(store, m.tournament).await?;

    log::info!("Cancelled match {}", m.number);
    Ok(())
}

/// Rescores all predictions of the completed match `id` and refreshes totals and ranks of
/// the whole tournament.
///
/// # Errors
///
/// Returns [`Error::NotCompleted`] if the match has no result, [`Error::Inconsistent`] if
/// `is_correction` is set and a later match already completed, and
/// [`Error::EntryNotFound`] if an active prediction has no season entry. No record is
/// written in any of these cases.
pub async fn rescore_match<S>(
    store: &S,
    id: MatchId,
    is_correction: bool,
    now: DateTime<Utc>,
) -> Result<RescoreReport>
where
    S: Store,
{
    let m = store.get_match(id).await?.ok_or(Error::MatchNotFound(id))?;
    if !m.is_completed() {
        return Err(Error::NotCompleted(id));
    }

    if is_correction {
        let matches = store.matches(m.tournament).await?;
        sequence_guard(&m, &matches)?;
    }

    let entries = entries_by_user(store, m.tournament).await?;
    let report = score_predictions(store, &m, &entries, now).await?;
    refresh_leaderboard(store, m.tournament, now).await?;

    log::info!(
        "Rescored match {}: {} scored, {} cleared",
        m.number,
        report.scored,
        report.cleared
    );

    Ok(report)
}

/// Rescores every completed match of `tournament` in match order, then refreshes totals and
/// ranks once.
pub async fn recompute_tournament<S>(
    store: &S,
    tournament: TournamentId,
    now: DateTime<Utc>,
) -> Result<RescoreReport>
where
    S: Store,
{
    if store.tournament(tournament).await?.is_none() {
        return Err(Error::TournamentNotFound(tournament));
    }

    let entries = entries_by_user(store, tournament).await?;

    let mut report = RescoreReport::default();
    for m in store
        .matches(tournament)
        .await?
        .iter()
        .filter(|m| m.is_completed())
    {
        report.merge(score_predictions(store, m, &entries, now).await?);
    }

    refresh_leaderboard(store, tournament, now).await?;

    log::info!(
        "Recomputed tournament {}: {} scored, {} cleared",
        tournament,
        report.scored,
        report.cleared
    );

    Ok(report)
}

/// Recomputes the totals and ranks of all entries of `tournament`.
pub async fn refresh_leaderboard<S>(
    store: &S,
    tournament: TournamentId,
    now: DateTime<Utc>,
) -> Result<Vec<SeasonEntry>>
where
    S: Store,
{
    recompute_totals(store, tournament, now).await?;
    rank_entries(store, tournament).await
}

/// Rejects a correction of `m` if any match with a greater number already completed.
fn sequence_guard(m: &Match, matches: &[Match]) -> Result<()> {
    match matches
        .iter()
        .filter(|other| other.number > m.number && other.is_completed())
        .min_by_key(|other| other.number)
    {
        Some(later) => Err(Error::Inconsistent {
            number: m.number,
            later: later.number,
        }),
        None => Ok(()),
    }
}

async fn entries_by_user<S>(
    store: &S,
    tournament: TournamentId,
) -> Result<HashMap<UserId, SeasonEntry>>
where
    S: Store,
{
    Ok(store
        .entries(tournament)
        .await?
        .into_iter()
        .map(|entry| (entry.user, entry))
        .collect())
}

fn check_entries(
    predictions: &[Prediction],
    entries: &HashMap<UserId, SeasonEntry>,
    now: DateTime<Utc>,
) -> Result<()> {
    match predictions
        .iter()
        .find(|p| p.is_active(now) && !entries.contains_key(&p.user))
    {
        Some(orphan) => Err(Error::EntryNotFound(orphan.user)),
        None => Ok(()),
    }
}

/// Re-applies the tournament bonus if `m` is the final of a closed tournament.
async fn reapply_bonuses<S>(store: &S, m: &Match, now: DateTime<Utc>) -> Result<()>
where
    S: Store,
{
    let Some(results) = store
        .tournament(m.tournament)
        .await?
        .and_then(|tournament| tournament.results)
    else {
        return Ok(());
    };

    let matches = store.matches(m.tournament).await?;
    if Playoff::locate(&matches).final_.map(|f| f.id) != Some(m.id) {
        return Ok(());
    }

    log::info!(
        "Final of tournament {} corrected, re-applying bonuses",
        m.tournament
    );
    bonus::apply_tournament_bonuses(store, m.tournament, results.awards, now).await?;

    Ok(())
}

/// Scores the active predictions of the completed match `m` and clears the score of
/// inactive ones.
async fn score_predictions<S>(
    store: &S,
    m: &Match,
    entries: &HashMap<UserId, SeasonEntry>,
    now: DateTime<Utc>,
) -> Result<RescoreReport>
where
    S: Store,
{
    let predictions = store.predictions_for_match(m.id).await?;

    // Fail before the first write.
    check_entries(&predictions, entries, now)?;

    let mut report = RescoreReport::default();
    for prediction in &predictions {
        match entries.get(&prediction.user) {
            Some(entry) if prediction.is_active(now) => {
                let record = ScoreRecord {
                    score: scoring::score(prediction, m, entry.season_team)?,
                    penalty: scoring::penalty(prediction, m)?,
                    scored_at: now,
                };

                store
                    .set_prediction_score(prediction.key(), Some(&record))
                    .await?;
                report.scored += 1;
            }
            _ => {
                if prediction.score.is_some() {
                    store.set_prediction_score(prediction.key(), None).await?;
                    report.cleared += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Recomputes the totals of every entry of `tournament` from the stored score records and
/// the applied bonus.
pub async fn recompute_totals<S>(
    store: &S,
    tournament: TournamentId,
    now: DateTime<Utc>,
) -> Result<()>
where
    S: Store,
{
    let entries = store.entries(tournament).await?;
    let mut totals: HashMap<UserId, Totals> = entries
        .iter()
        .map(|entry| {
            let totals = Totals {
                points: entry.bonus_total(),
                penalties: 0,
            };

            (entry.user, totals)
        })
        .collect();

    for m in store
        .matches(tournament)
        .await?
        .iter()
        .filter(|m| m.is_completed())
    {
        for prediction in store.predictions_for_match(m.id).await? {
            if !prediction.is_active(now) {
                continue;
            }

            let Some(record) = &prediction.score else {
                continue;
            };

            match totals.get_mut(&prediction.user) {
                Some(totals) => {
                    totals.points += i64::from(record.points());
                    totals.penalties += u64::from(record.penalty);
                }
                None => log::warn!(
                    "Prediction {} has no season entry, skipping",
                    prediction.key()
                ),
            }
        }
    }

    for entry in &entries {
        let new = totals.get(&entry.user).copied().unwrap_or_default();
        if entry.totals != new {
            log::debug!(
                "Totals of user {}: {:?} -> {:?}",
                entry.user,
                entry.totals,
                new
            );

            store.set_entry_totals(tournament, entry.user, new).await?;
        }
    }

    Ok(())
}

/// Ranks all entries of `tournament` by points. Ties are broken by the earliest join, then
/// by user id.
pub async fn rank_entries<S>(store: &S, tournament: TournamentId) -> Result<Vec<SeasonEntry>>
where
    S: Store,
{
    let mut entries = store.entries(tournament).await?;
    entries.sort_by(cmp_leaderboard);

    for (index, entry) in entries.iter_mut().enumerate() {
        let rank = index as u32 + 1;
        if entry.rank != rank {
            store.set_entry_rank(tournament, entry.user, rank).await?;
            entry.rank = rank;
        }
    }

    Ok(entries)
}

fn cmp_leaderboard(a: &SeasonEntry, b: &SeasonEntry) -> Ordering {
    b.totals
        .points
        .cmp(&a.totals.points)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.user.cmp(&b.user))
}
