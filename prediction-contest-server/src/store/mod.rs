mod tables;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use prediction_contest_core::bonus::BonusBreakdown;
use prediction_contest_core::store::Store as EngineStore;
use prediction_contest_core::Result as EngineResult;
use prediction_contest_core::{
    Match, MatchId, MatchStatus, MatchType, Prediction, PredictionKey, ScoreRecord, SeasonEntry,
    Slot, Team, TeamId, Totals, Tournament, TournamentId, TournamentResults, UserId,
};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;

use crate::Error;

pub use tables::migrate;

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

/// A MySQL database holding all contest records. All tables share `table_prefix`.
#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    #[inline]
    pub fn tournaments(&self) -> TournamentsClient<'_> {
        TournamentsClient { store: self }
    }

    #[inline]
    pub fn fixtures(&self) -> FixturesClient<'_> {
        FixturesClient { store: self }
    }

    #[inline]
    pub fn predictions(&self) -> PredictionsClient<'_> {
        PredictionsClient { store: self }
    }

    #[inline]
    pub fn season_entries(&self, id: TournamentId) -> EntriesClient<'_> {
        EntriesClient { store: self, id }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TournamentsClient<'a> {
    store: &'a Store,
}

impl<'a> TournamentsClient<'a> {
    pub async fn get(&self, id: TournamentId) -> Result<Option<Tournament>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT name, results FROM {}tournaments WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        let results: Option<Vec<u8>> = row.try_get("results")?;

        Ok(Some(Tournament {
            id,
            name: row.try_get("name")?,
            results: results
                .map(|results| serde_json::from_slice(&results))
                .transpose()?,
        }))
    }

    pub async fn set_results(
        &self,
        id: TournamentId,
        results: &TournamentResults,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}tournaments SET results = ? WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(serde_json::to_vec(results)?)
        .bind(id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    pub async fn teams(&self, id: TournamentId) -> Result<Vec<Team>, Error> {
        let sql = format!(
            "SELECT id, name FROM {}teams WHERE tournament_id = ?",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(id.0).fetch(&self.store.pool);

        let mut teams = Vec::new();
        while let Some(row) = rows.try_next().await? {
            teams.push(Team {
                id: TeamId(row.try_get("id")?),
                name: row.try_get("name")?,
            });
        }

        Ok(teams)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FixturesClient<'a> {
    store: &'a Store,
}

impl<'a> FixturesClient<'a> {
    pub async fn get(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, tournament_id, number, kind, team_a, team_b, start, status, outcome FROM {}matches WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(match_from_row(&row)?))
    }

    /// Returns all matches of the tournament ordered by match number.
    pub async fn list(&self, tournament: TournamentId) -> Result<Vec<Match>, Error> {
        let sql = format!(
            "SELECT id, tournament_id, number, kind, team_a, team_b, start, status, outcome FROM {}matches WHERE tournament_id = ? ORDER BY number",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(tournament.0).fetch(&self.store.pool);

        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(match_from_row(&row)?);
        }

        Ok(matches)
    }

    pub async fn set_status(&self, id: MatchId, status: &MatchStatus) -> Result<(), Error> {
        let outcome = match status {
            MatchStatus::Completed(outcome) => Some(serde_json::to_vec(outcome)?),
            _ => None,
        };

        sqlx::query(&format!(
            "UPDATE {}matches SET status = ?, outcome = ? WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(status.to_u8())
        .bind(outcome)
        .bind(id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    /// Assigns `team` to an unassigned slot. Assigned slots are never overwritten.
    pub async fn assign(&self, id: MatchId, position: usize, team: TeamId) -> Result<(), Error> {
        let column = match position {
            0 => "team_a",
            1 => "team_b",
            _ => return Err(Error::InvalidColumn("position")),
        };

        let res = sqlx::query(&format!(
            "UPDATE {prefix}matches SET {column} = ? WHERE id = ? AND {column} IS NULL",
            prefix = self.store.table_prefix,
            column = column,
        ))
        .bind(team.0)
        .bind(id.0)
        .execute(&self.store.pool)
        .await?;

        if res.rows_affected() == 0 {
            log::warn!("Slot {} of match {} is already assigned", position, id);
        }

        Ok(())
    }
}

fn match_from_row(row: &MySqlRow) -> Result<Match, Error> {
    let kind: u8 = row.try_get("kind")?;
    let status: u8 = row.try_get("status")?;
    let outcome: Option<Vec<u8>> = row.try_get("outcome")?;

    let status = match (status, outcome) {
        (0, _) => MatchStatus::Upcoming,
        (1, Some(outcome)) => MatchStatus::Completed(serde_json::from_slice(&outcome)?),
        (2, _) => MatchStatus::Cancelled,
        _ => return Err(Error::InvalidColumn("status")),
    };

    let team_a: Option<u64> = row.try_get("team_a")?;
    let team_b: Option<u64> = row.try_get("team_b")?;

    Ok(Match {
        id: MatchId(row.try_get("id")?),
        tournament: TournamentId(row.try_get("tournament_id")?),
        number: row.try_get("number")?,
        kind: MatchType::from_u8(kind).ok_or(Error::InvalidColumn("kind"))?,
        teams: [Slot::new(team_a.map(TeamId)), Slot::new(team_b.map(TeamId))],
        start: row.try_get("start")?,
        status,
    })
}

#[derive(Copy, Clone, Debug)]
pub struct PredictionsClient<'a> {
    store: &'a Store,
}

impl<'a> PredictionsClient<'a> {
    const COLUMNS: &'static str =
        "p.user_id, p.match_id, p.match_number, p.picks, p.submitted_at, p.scheduled_for, p.score";

    pub async fn get(&self, key: PredictionKey) -> Result<Option<Prediction>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT {} FROM {}predictions p WHERE p.user_id = ? AND p.match_id = ?",
                Self::COLUMNS,
                self.store.table_prefix
            ))
            .bind(key.user.0)
            .bind(key.match_id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(prediction_from_row(&row)?))
    }

    pub async fn list_for_match(&self, id: MatchId) -> Result<Vec<Prediction>, Error> {
        let sql = format!(
            "SELECT {} FROM {}predictions p WHERE p.match_id = ? ORDER BY p.user_id",
            Self::COLUMNS,
            self.store.table_prefix
        );

        self.fetch(sqlx::query(&sql).bind(id.0)).await
    }

    pub async fn list_for_user(
        &self,
        tournament: TournamentId,
        user: UserId,
    ) -> Result<Vec<Prediction>, Error> {
        let sql = format!(
            "SELECT {cols} FROM {prefix}predictions p JOIN {prefix}matches m ON m.id = p.match_id WHERE m.tournament_id = ? AND p.user_id = ? ORDER BY p.match_number",
            cols = Self::COLUMNS,
            prefix = self.store.table_prefix
        );

        self.fetch(sqlx::query(&sql).bind(tournament.0).bind(user.0))
            .await
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Prediction>, Error> {
        let sql = format!(
            "SELECT {} FROM {}predictions p WHERE p.scheduled_for IS NOT NULL AND p.scheduled_for <= ?",
            Self::COLUMNS,
            self.store.table_prefix
        );

        self.fetch(sqlx::query(&sql).bind(now)).await
    }

    async fn fetch<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    ) -> Result<Vec<Prediction>, Error> {
        let mut rows = query.fetch(&self.store.pool);

        let mut predictions = Vec::new();
        while let Some(row) = rows.try_next().await? {
            predictions.push(prediction_from_row(&row)?);
        }

        Ok(predictions)
    }

    /// Inserts `prediction` or replaces the stored prediction with the same key.
    pub async fn upsert(&self, prediction: &Prediction) -> Result<(), Error> {
        let score = prediction
            .score
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()?;

        sqlx::query(&format!(
            "INSERT INTO {}predictions (user_id, match_id, match_number, picks, submitted_at, scheduled_for, score) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE match_number = VALUES(match_number), picks = VALUES(picks), submitted_at = VALUES(submitted_at), scheduled_for = VALUES(scheduled_for), score = VALUES(score)",
            self.store.table_prefix
        ))
        .bind(prediction.user.0)
        .bind(prediction.match_id.0)
        .bind(prediction.match_number)
        .bind(serde_json::to_vec(&prediction.picks)?)
        .bind(prediction.submitted_at)
        .bind(prediction.scheduled_for)
        .bind(score)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    pub async fn set_score(
        &self,
        key: PredictionKey,
        score: Option<&ScoreRecord>,
    ) -> Result<(), Error> {
        let score = score.map(serde_json::to_vec).transpose()?;

        sqlx::query(&format!(
            "UPDATE {}predictions SET score = ? WHERE user_id = ? AND match_id = ?",
            self.store.table_prefix
        ))
        .bind(score)
        .bind(key.user.0)
        .bind(key.match_id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    pub async fn activate(&self, key: PredictionKey) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}predictions SET scheduled_for = NULL WHERE user_id = ? AND match_id = ?",
            self.store.table_prefix
        ))
        .bind(key.user.0)
        .bind(key.match_id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }
}

fn prediction_from_row(row: &MySqlRow) -> Result<Prediction, Error> {
    let picks: Vec<u8> = row.try_get("picks")?;
    let score: Option<Vec<u8>> = row.try_get("score")?;

    Ok(Prediction {
        user: UserId(row.try_get("user_id")?),
        match_id: MatchId(row.try_get("match_id")?),
        match_number: row.try_get("match_number")?,
        picks: serde_json::from_slice(&picks)?,
        submitted_at: row.try_get("submitted_at")?,
        scheduled_for: row.try_get("scheduled_for")?,
        score: score.map(|score| serde_json::from_slice(&score)).transpose()?,
    })
}

#[derive(Copy, Clone, Debug)]
pub struct EntriesClient<'a> {
    store: &'a Store,
    id: TournamentId,
}

impl<'a> EntriesClient<'a> {
    const COLUMNS: &'static str =
        "user_id, season_team, picks, joined_at, points, penalties, bonus, position";

    pub async fn get(&self, user: UserId) -> Result<Option<SeasonEntry>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT {} FROM {}entries WHERE tournament_id = ? AND user_id = ?",
                Self::COLUMNS,
                self.store.table_prefix
            ))
            .bind(self.id.0)
            .bind(user.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(self.entry_from_row(&row)?))
    }

    pub async fn list(&self) -> Result<Vec<SeasonEntry>, Error> {
        let sql = format!(
            "SELECT {} FROM {}entries WHERE tournament_id = ? ORDER BY user_id",
            Self::COLUMNS,
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(self.id.0).fetch(&self.store.pool);

        let mut entries = Vec::new();
        while let Some(row) = rows.try_next().await? {
            entries.push(self.entry_from_row(&row)?);
        }

        Ok(entries)
    }

    pub async fn set_totals(&self, user: UserId, totals: Totals) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}entries SET points = ?, penalties = ? WHERE tournament_id = ? AND user_id = ?",
            self.store.table_prefix
        ))
        .bind(totals.points)
        .bind(totals.penalties)
        .bind(self.id.0)
        .bind(user.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    pub async fn set_bonus(&self, user: UserId, bonus: Option<BonusBreakdown>) -> Result<(), Error> {
        let bonus = bonus.as_ref().map(serde_json::to_vec).transpose()?;

        sqlx::query(&format!(
            "UPDATE {}entries SET bonus = ? WHERE tournament_id = ? AND user_id = ?",
            self.store.table_prefix
        ))
        .bind(bonus)
        .bind(self.id.0)
        .bind(user.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    pub async fn set_rank(&self, user: UserId, rank: u32) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}entries SET position = ? WHERE tournament_id = ? AND user_id = ?",
            self.store.table_prefix
        ))
        .bind(rank)
        .bind(self.id.0)
        .bind(user.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }

    fn entry_from_row(&self, row: &MySqlRow) -> Result<SeasonEntry, Error> {
        let picks: Vec<u8> = row.try_get("picks")?;
        let bonus: Option<Vec<u8>> = row.try_get("bonus")?;

        Ok(SeasonEntry {
            user: UserId(row.try_get("user_id")?),
            tournament: self.id,
            season_team: TeamId(row.try_get("season_team")?),
            picks: serde_json::from_slice(&picks)?,
            joined_at: row.try_get("joined_at")?,
            totals: Totals {
                points: row.try_get("points")?,
                penalties: row.try_get("penalties")?,
            },
            bonus: bonus.map(|bonus| serde_json::from_slice(&bonus)).transpose()?,
            rank: row.try_get("position")?,
        })
    }
}

impl EngineStore for Store {
    async fn tournament(&self, id: TournamentId) -> EngineResult<Option<Tournament>> {
        Ok(self.tournaments().get(id).await?)
    }

    async fn set_tournament_results(
        &self,
        id: TournamentId,
        results: &TournamentResults,
    ) -> EngineResult<()> {
        Ok(self.tournaments().set_results(id, results).await?)
    }

    async fn teams(&self, tournament: TournamentId) -> EngineResult<Vec<Team>> {
        Ok(self.tournaments().teams(tournament).await?)
    }

    async fn get_match(&self, id: MatchId) -> EngineResult<Option<Match>> {
        Ok(self.fixtures().get(id).await?)
    }

    async fn matches(&self, tournament: TournamentId) -> EngineResult<Vec<Match>> {
        Ok(self.fixtures().list(tournament).await?)
    }

    async fn set_match_status(
        &self,
        id: MatchId,
        status: &MatchStatus,
    ) -> EngineResult<()> {
        Ok(self.fixtures().set_status(id, status).await?)
    }

    async fn assign_team(
        &self,
        id: MatchId,
        position: usize,
        team: TeamId,
    ) -> EngineResult<()> {
        Ok(self.fixtures().assign(id, position, team).await?)
    }

    async fn prediction(
        &self,
        key: PredictionKey,
    ) -> EngineResult<Option<Prediction>> {
        Ok(self.predictions().get(key).await?)
    }

    async fn predictions_for_match(
        &self,
        id: MatchId,
    ) -> EngineResult<Vec<Prediction>> {
        Ok(self.predictions().list_for_match(id).await?)
    }

    async fn predictions_for_user(
        &self,
        tournament: TournamentId,
        user: UserId,
    ) -> EngineResult<Vec<Prediction>> {
        Ok(self.predictions().list_for_user(tournament, user).await?)
    }

    async fn due_predictions(
        &self,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Prediction>> {
        Ok(self.predictions().list_due(now).await?)
    }

    async fn put_prediction(&self, prediction: &Prediction) -> EngineResult<()> {
        Ok(self.predictions().upsert(prediction).await?)
    }

    async fn set_prediction_score(
        &self,
        key: PredictionKey,
        score: Option<&ScoreRecord>,
    ) -> EngineResult<()> {
        Ok(self.predictions().set_score(key, score).await?)
    }

    async fn activate_prediction(&self, key: PredictionKey) -> EngineResult<()> {
        Ok(self.predictions().activate(key).await?)
    }

    async fn entry(
        &self,
        tournament: TournamentId,
        user: UserId,
    ) -> EngineResult<Option<SeasonEntry>> {
        Ok(self.season_entries(tournament).get(user).await?)
    }

    async fn entries(
        &self,
        tournament: TournamentId,
    ) -> EngineResult<Vec<SeasonEntry>> {
        Ok(self.season_entries(tournament).list().await?)
    }

    async fn set_entry_totals(
        &self,
        tournament: TournamentId,
        user: UserId,
        totals: Totals,
    ) -> EngineResult<()> {
        Ok(self.season_entries(tournament).set_totals(user, totals).await?)
    }

    async fn set_entry_bonus(
        &self,
        tournament: TournamentId,
        user: UserId,
        bonus: Option<BonusBreakdown>,
    ) -> EngineResult<()> {
        Ok(self.season_entries(tournament).set_bonus(user, bonus).await?)
    }

    async fn set_entry_rank(
        &self,
        tournament: TournamentId,
        user: UserId,
        rank: u32,
    ) -> EngineResult<()> {
        Ok(self.season_entries(tournament).set_rank(user, rank).await?)
    }
}
