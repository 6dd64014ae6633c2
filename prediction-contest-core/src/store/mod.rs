//! Persistence seam of the engine.
//!
//! The engine never holds state of its own. Every workflow reads from and writes to a
//! [`Store`]. Writes are atomic per record only.
mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::bonus::BonusBreakdown;
use crate::id::{MatchId, PredictionKey, TeamId, TournamentId, UserId};
use crate::matches::{Match, MatchStatus};
use crate::prediction::{Prediction, ScoreRecord};
use crate::tournament::{SeasonEntry, Team, Totals, Tournament, TournamentResults};
use crate::Result;

/// Record storage used by all workflows.
///
/// Lookups of a single record return `Ok(None)` if the record does not exist. Workflows
/// check that a record exists before writing to it; implementations may either reject or
/// ignore writes to missing records.
#[allow(async_fn_in_trait)]
pub trait Store {
    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>>;

    async fn set_tournament_results(
        &self,
        id: TournamentId,
        results: &TournamentResults,
    ) -> Result<()>;

    async fn teams(&self, tournament: TournamentId) -> Result<Vec<Team>>;

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>>;

    /// Returns all matches of `tournament` ordered by match number.
    async fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>>;

    async fn set_match_status(&self, id: MatchId, status: &MatchStatus) -> Result<()>;

    /// Assigns `team` to the slot at `position` of the match `id`.
    async fn assign_team(&self, id: MatchId, position: usize, team: TeamId) -> Result<()>;

    async fn prediction(&self, key: PredictionKey) -> Result<Option<Prediction>>;

    async fn predictions_for_match(&self, id: MatchId) -> Result<Vec<Prediction>>;

    async fn predictions_for_user(
        &self,
        tournament: TournamentId,
        user: UserId,
    ) -> Result<Vec<Prediction>>;

    /// Returns all scheduled predictions whose activation instant is at or before `now`.
    async fn due_predictions(&self, now: DateTime<Utc>) -> Result<Vec<Prediction>>;

    /// Inserts `prediction`, replacing any prediction with the same key.
    async fn put_prediction(&self, prediction: &Prediction) -> Result<()>;

    async fn set_prediction_score(
        &self,
        key: PredictionKey,
        score: Option<&ScoreRecord>,
    ) -> Result<()>;

    /// Clears the scheduled activation instant of a prediction.
    async fn activate_prediction(&self, key: PredictionKey) -> Result<()>;

    async fn entry(&self, tournament: TournamentId, user: UserId) -> Result<Option<SeasonEntry>>;

    async fn entries(&self, tournament: TournamentId) -> Result<Vec<SeasonEntry>>;

    async fn set_entry_totals(
        &self,
        tournament: TournamentId,
        user: UserId,
        totals: Totals,
    ) -> Result<()>;

    async fn set_entry_bonus(
        &self,
        tournament: TournamentId,
        user: UserId,
        bonus: Option<BonusBreakdown>,
    ) -> Result<()>;

    async fn set_entry_rank(&self, tournament: TournamentId, user: UserId, rank: u32)
        -> Result<()>;
}
