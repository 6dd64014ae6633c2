use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::Store;
use crate::bonus::BonusBreakdown;
use crate::id::{MatchId, PredictionKey, TeamId, TournamentId, UserId};
use crate::matches::{Match, MatchStatus, Slot};
use crate::prediction::{Prediction, ScoreRecord};
use crate::tournament::{SeasonEntry, Team, Totals, Tournament, TournamentResults};
use crate::{Error, Result};

/// A [`Store`] keeping all records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tournaments: HashMap<TournamentId, Tournament>,
    teams: HashMap<TournamentId, Vec<Team>>,
    matches: HashMap<MatchId, Match>,
    predictions: BTreeMap<PredictionKey, Prediction>,
    entries: BTreeMap<(TournamentId, UserId), SeasonEntry>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tournament(&self, tournament: Tournament) {
        let mut inner = self.inner.write();
        inner.tournaments.insert(tournament.id, tournament);
    }

    pub fn insert_team(&self, tournament: TournamentId, team: Team) {
        let mut inner = self.inner.write();
        inner.teams.entry(tournament).or_default().push(team);
    }

    pub fn insert_match(&self, m: Match) {
        let mut inner = self.inner.write();
        inner.matches.insert(m.id, m);
    }

    pub fn insert_entry(&self, entry: SeasonEntry) {
        let mut inner = self.inner.write();
        inner.entries.insert((entry.tournament, entry.user), entry);
    }

    fn update_match<F>(&self, id: MatchId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Match) -> Result<()>,
    {
        let mut inner = self.inner.write();
        let m = inner.matches.get_mut(&id).ok_or(Error::MatchNotFound(id))?;
        f(m)
    }

    fn update_prediction<F>(&self, key: PredictionKey, f: F) -> Result<()>
    where
        F: FnOnce(&mut Prediction),
    {
        let mut inner = self.inner.write();
        let prediction = inner
            .predictions
            .get_mut(&key)
            .ok_or(Error::PredictionNotFound(key))?;
        f(prediction);
        Ok(())
    }

    fn update_entry<F>(&self, tournament: TournamentId, user: UserId, f: F) -> Result<()>
    where
        F: FnOnce(&mut SeasonEntry),
    {
        let mut inner = self.inner.write();
        let entry = inner
            .entries
            .get_mut(&(tournament, user))
            .ok_or(Error::EntryNotFound(user))?;
        f(entry);
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>> {
        Ok(self.inner.read().tournaments.get(&id).cloned())
    }

    async fn set_tournament_results(
        &self,
        id: TournamentId,
        results: &TournamentResults,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let tournament = inner
            .tournaments
            .get_mut(&id)
            .ok_or(Error::TournamentNotFound(id))?;
        tournament.results = Some(*results);
        Ok(())
    }

    async fn teams(&self, tournament: TournamentId) -> Result<Vec<Team>> {
        Ok(self
            .inner
            .read()
            .teams
            .get(&tournament)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.inner.read().matches.get(&id).cloned())
    }

    async fn matches(&self, tournament: TournamentId) -> Result<Vec<Match>> {
        let mut matches: Vec<Match> = self
            .inner
            .read()
            .matches
            .values()
            .filter(|m| m.tournament == tournament)
            .cloned()
            .collect();

        matches.sort_by_key(|m| m.number);
        Ok(matches)
    }

    async fn set_match_status(&self, id: MatchId, status: &MatchStatus) -> Result<()> {
        self.update_match(id, |m| {
            m.status = status.clone();
            Ok(())
        })
    }

    async fn assign_team(&self, id: MatchId, position: usize, team: TeamId) -> Result<()> {
        self.update_match(id, |m| {
            let slot = m.teams.get_mut(position).ok_or(Error::MalformedResult(id))?;
            *slot = Slot::Assigned(team);
            Ok(())
        })
    }

    async fn prediction(&self, key: PredictionKey) -> Result<Option<Prediction>> {
        Ok(self.inner.read().predictions.get(&key).cloned())
    }

    async fn predictions_for_match(&self, id: MatchId) -> Result<Vec<Prediction>> {
        Ok(self
            .inner
            .read()
            .predictions
            .values()
            .filter(|p| p.match_id == id)
            .cloned()
            .collect())
    }

    async fn predictions_for_user(
        &self,
        tournament: TournamentId,
        user: UserId,
    ) -> Result<Vec<Prediction>> {
        let inner = self.inner.read();

        let mut predictions: Vec<Prediction> = inner
            .predictions
            .values()
            .filter(|p| p.user == user)
            .filter(|p| {
                inner
                    .matches
                    .get(&p.match_id)
                    .map_or(false, |m| m.tournament == tournament)
            })
            .cloned()
            .collect();

        predictions.sort_by_key(|p| p.match_number);
        Ok(predictions)
    }

    async fn due_predictions(&self, now: DateTime<Utc>) -> Result<Vec<Prediction>> {
        Ok(self
            .inner
            .read()
            .predictions
            .values()
            .filter(|p| p.scheduled_for.map_or(false, |at| at <= now))
            .cloned()
            .collect())
    }

    async fn put_prediction(&self, prediction: &Prediction) -> Result<()> {
        let mut inner = self.inner.write();
        inner.predictions.insert(prediction.key(), prediction.clone());
        Ok(())
    }

    async fn set_prediction_score(
        &self,
        key: PredictionKey,
        score: Option<&ScoreRecord>,
    ) -> Result<()> {
        self.update_prediction(key, |p| p.score = score.cloned())
    }

    async fn activate_prediction(&self, key: PredictionKey) -> Result<()> {
        self.update_prediction(key, |p| p.scheduled_for = None)
    }

    async fn entry(&self, tournament: TournamentId, user: UserId) -> Result<Option<SeasonEntry>> {
        Ok(self.inner.read().entries.get(&(tournament, user)).cloned())
    }

    async fn entries(&self, tournament: TournamentId) -> Result<Vec<SeasonEntry>> {
        Ok(self
            .inner
            .read()
            .entries
            .values()
            .filter(|entry| entry.tournament == tournament)
            .cloned()
            .collect())
    }

    async fn set_entry_totals(
        &self,
        tournament: TournamentId,
        user: UserId,
        totals: Totals,
    ) -> Result<()> {
        self.update_entry(tournament, user, |entry| entry.totals = totals)
    }

    async fn set_entry_bonus(
        &self,
        tournament: TournamentId,
        user: UserId,
        bonus: Option<BonusBreakdown>,
    ) -> Result<()> {
        self.update_entry(tournament, user, |entry| entry.bonus = bonus)
    }

    async fn set_entry_rank(
        &self,
        tournament: TournamentId,
        user: UserId,
        rank: u32,
    ) -> Result<()> {
        self.update_entry(tournament, user, |entry| entry.rank = rank)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::id::{MatchId, PredictionKey, TeamId, TournamentId, UserId};
    use crate::matches::tests::{fixture, utc};
    use crate::matches::{MatchType, Slot};
    use crate::prediction::{Picks, Prediction};
    use crate::store::Store;
    use crate::Error;

    fn prediction(user: u64, m: u64) -> Prediction {
        Prediction {
            user: UserId(user),
            match_id: MatchId(m),
            match_number: m as u32,
            picks: Picks::new(TeamId(1)),
            submitted_at: utc(2025, 4, 1, 0, 0),
            scheduled_for: None,
            score: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_matches_ordered() {
        let store = MemoryStore::new();
        store.insert_match(fixture(3, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 3, 14, 0)));
        store.insert_match(fixture(1, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 1, 14, 0)));
        store.insert_match(fixture(2, MatchType::Final, [None, None], utc(2025, 4, 2, 14, 0)));

        let numbers: Vec<u32> = store
            .matches(TournamentId(1))
            .await
            .unwrap()
            .iter()
            .map(|m| m.number)
            .collect();
        assert_eq!(numbers, [1, 2, 3]);
        assert!(store.matches(TournamentId(2)).await.unwrap().is_empty());

        store.assign_team(MatchId(2), 1, TeamId(4)).await.unwrap();
        let m = store.get_match(MatchId(2)).await.unwrap().unwrap();
        assert_eq!(m.teams, [Slot::Unassigned, Slot::Assigned(TeamId(4))]);

        assert!(matches!(
            store.assign_team(MatchId(9), 0, TeamId(4)).await,
            Err(Error::MatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_predictions() {
        let store = MemoryStore::new();
        store.insert_match(fixture(1, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 1, 14, 0)));

        let mut p = prediction(7, 1);
        store.put_prediction(&p).await.unwrap();

        // Upsert by key.
        p.picks.winner = TeamId(2);
        p.scheduled_for = Some(utc(2025, 4, 1, 8, 0));
        store.put_prediction(&p).await.unwrap();
        assert_eq!(store.predictions_for_match(MatchId(1)).await.unwrap(), [p.clone()]);
        assert_eq!(
            store
                .predictions_for_user(TournamentId(1), UserId(7))
                .await
                .unwrap()
                .len(),
            1
        );

        assert!(store.due_predictions(utc(2025, 4, 1, 7, 59)).await.unwrap().is_empty());
        assert_eq!(store.due_predictions(utc(2025, 4, 1, 8, 0)).await.unwrap().len(), 1);

        let key = PredictionKey::new(UserId(7), MatchId(1));
        store.activate_prediction(key).await.unwrap();
        assert_eq!(store.prediction(key).await.unwrap().unwrap().scheduled_for, None);

        assert!(matches!(
            store
                .activate_prediction(PredictionKey::new(UserId(8), MatchId(1)))
                .await,
            Err(Error::PredictionNotFound(_))
        ));
    }
}
