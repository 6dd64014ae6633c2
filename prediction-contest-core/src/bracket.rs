//! Playoff bracket progression.
//!
//! The playoff consists of four matches located by type and match-number order:
//!
//! ```text
//! Rank 1 ─┐
//!         ├─ Qualifier 1 ─ winner ────────────────────────┐
//! Rank 2 ─┘        └────── loser ─┐                       ├─ Final
//!                                 ├─ Qualifier 2 ─ winner ┘
//! Rank 3 ─┐                       │
//!         ├─ Eliminator ── winner ┘
//! Rank 4 ─┘
//! ```
//!
//! Progression only ever fills [`Slot::Unassigned`] positions, so running it again after any
//! result entry is safe.
use crate::id::{MatchId, TeamId, TournamentId};
use crate::matches::{Match, MatchType, Slot};
use crate::standings::Standings;
use crate::store::Store;
use crate::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A team placed into a playoff match position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Assignment {
    pub match_id: MatchId,
    /// Position 0 or 1 within the match.
    pub position: usize,
    pub team: TeamId,
}

/// The four playoff matches of a tournament. Any of them may be missing.
#[derive(Copy, Clone, Debug, Default)]
pub struct Playoff<'a> {
    pub qualifier1: Option<&'a Match>,
    pub eliminator: Option<&'a Match>,
    pub qualifier2: Option<&'a Match>,
    pub final_: Option<&'a Match>,
}

impl<'a> Playoff<'a> {
    pub fn locate(matches: &'a [Match]) -> Self {
        let mut sorted: Vec<&Match> = matches.iter().collect();
        sorted.sort_by_key(|m| m.number);

        let mut qualifiers = sorted.iter().filter(|m| m.kind == MatchType::Qualifier);

        Self {
            qualifier1: qualifiers.next().copied(),
            qualifier2: qualifiers.next().copied(),
            eliminator: sorted
                .iter()
                .find(|m| m.kind == MatchType::Eliminator)
                .copied(),
            final_: sorted.iter().find(|m| m.kind == MatchType::Final).copied(),
        }
    }
}

/// Returns `true` if every league match is completed or cancelled and at least one league
/// match exists.
pub fn league_settled(matches: &[Match]) -> bool {
    let mut league = matches.iter().filter(|m| m.kind == MatchType::League).peekable();

    league.peek().is_some() && league.all(|m| m.is_completed() || m.is_cancelled())
}

/// Computes the pending slot assignments from the current state of `matches`. Missing
/// matches, missing results and too few ranked teams produce no assignment.
///
/// # Errors
///
/// Returns [`Error::MalformedResult`] if a completed playoff match has a result that does
/// not fit the match.
///
/// [`Error::MalformedResult`]: crate::Error::MalformedResult
pub fn plan(matches: &[Match], standings: &Standings) -> Result<Vec<Assignment>> {
    let playoff = Playoff::locate(matches);
    let mut plan = Vec::new();

    if league_settled(matches) {
        if let (Some(first), Some(second)) = (standings.get(0), standings.get(1)) {
            fill(&mut plan, playoff.qualifier1, 0, first.team);
            fill(&mut plan, playoff.qualifier1, 1, second.team);
        }

        if let (Some(third), Some(fourth)) = (standings.get(2), standings.get(3)) {
            fill(&mut plan, playoff.eliminator, 0, third.team);
            fill(&mut plan, playoff.eliminator, 1, fourth.team);
        }
    }

    if let Some(q1) = playoff.qualifier1.filter(|m| m.is_completed()) {
        let (winner, loser) = q1.winner_and_loser()?;
        fill(&mut plan, playoff.final_, 0, winner);
        fill(&mut plan, playoff.qualifier2, 0, loser);
    }

    if let Some(eliminator) = playoff.eliminator.filter(|m| m.is_completed()) {
        let (winner, _) = eliminator.winner_and_loser()?;
        fill(&mut plan, playoff.qualifier2, 1, winner);
    }

    if let Some(q2) = playoff.qualifier2.filter(|m| m.is_completed()) {
        let (winner, _) = q2.winner_and_loser()?;
        fill(&mut plan, playoff.final_, 1, winner);
    }

    Ok(plan)
}

fn fill(plan: &mut Vec<Assignment>, m: Option<&Match>, position: usize, team: TeamId) {
    if let Some(m) = m {
        if m[position] == Slot::Unassigned {
            plan.push(Assignment {
                match_id: m.id,
                position,
                team,
            });
        }
    }
}

/// Applies all pending slot assignments of `tournament` to `store`.
pub async fn advance_bracket<S>(store: &S, tournament: TournamentId) -> Result<Vec<Assignment>>
where
    S: Store,
{
    let matches = store.matches(tournament).await?;
    let teams = store.teams(tournament).await?;
    let standings = Standings::from_matches(&teams, &matches)?;

    let plan = plan(&matches, &standings)?;
    for assignment in &plan {
        log::info!(
            "Assigning team {} to position {} of match {}",
            assignment.team,
            assignment.position,
            assignment.match_id
        );

        store
            .assign_team(assignment.match_id, assignment.position, assignment.team)
            .await?;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::{advance_bracket, league_settled, plan, Assignment};
    use crate::id::{MatchId, TeamId, TournamentId};
    use crate::matches::tests::{fixture, outcome, utc};
    use crate::matches::{Match, MatchStatus, MatchType, Slot};
    use crate::standings::tests::teams;
    use crate::standings::Standings;
    use crate::store::{MemoryStore, Store};
    use crate::tournament::Tournament;

    // Four teams, two league matches each; the final ranking is 1, 2, 3, 4.
    fn season() -> Vec<Match> {
        let mut matches = vec![
            fixture(1, MatchType::League, [Some(1), Some(4)], utc(2025, 4, 1, 14, 0)),
            fixture(2, MatchType::League, [Some(2), Some(3)], utc(2025, 4, 2, 14, 0)),
            fixture(3, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 3, 14, 0)),
            fixture(4, MatchType::League, [Some(3), Some(4)], utc(2025, 4, 4, 14, 0)),
            fixture(5, MatchType::Qualifier, [None, None], utc(2025, 4, 6, 14, 0)),
            fixture(6, MatchType::Eliminator, [None, None], utc(2025, 4, 7, 14, 0)),
            fixture(7, MatchType::Qualifier, [None, None], utc(2025, 4, 8, 14, 0)),
            fixture(8, MatchType::Final, [None, None], utc(2025, 4, 10, 14, 0)),
        ];
        matches[0].status = MatchStatus::Completed(outcome(1, 1, 150, 5));
        matches[1].status = MatchStatus::Completed(outcome(2, 2, 150, 5));
        matches[2].status = MatchStatus::Completed(outcome(1, 1, 150, 5));
        matches[3].status = MatchStatus::Completed(outcome(3, 3, 150, 5));
        matches
    }

    fn standings(matches: &[Match]) -> Standings {
        Standings::from_matches(&teams(&["A", "B", "C", "D"]), matches).unwrap()
    }

    fn apply(matches: &mut [Match], plan: &[Assignment]) {
        for assignment in plan {
            let m = matches
                .iter_mut()
                .find(|m| m.id == assignment.match_id)
                .unwrap();
            m[assignment.position] = Slot::Assigned(assignment.team);
        }
    }

    #[test]
    fn test_league_settled() {
        let mut matches = season();
        assert!(league_settled(&matches));

        matches[3].status = MatchStatus::Upcoming;
        assert!(!league_settled(&matches));

        matches[3].status = MatchStatus::Cancelled;
        assert!(league_settled(&matches));

        assert!(!league_settled(&matches[4..]));
    }

    #[test]
    fn test_plan_progression() {
        let mut matches = season();

        let first = plan(&matches, &standings(&matches)).unwrap();
        assert_eq!(first.len(), 4);
        apply(&mut matches, &first);
        assert_eq!(matches[4].teams, [Slot::Assigned(TeamId(1)), Slot::Assigned(TeamId(2))]);
        assert_eq!(matches[5].teams, [Slot::Assigned(TeamId(3)), Slot::Assigned(TeamId(4))]);

        // Nothing left to do until a playoff result lands.
        assert!(plan(&matches, &standings(&matches)).unwrap().is_empty());

        // Qualifier 1: 2 beats 1.
        matches[4].status = MatchStatus::Completed(outcome(2, 1, 150, 5));
        let next = plan(&matches, &standings(&matches)).unwrap();
        assert_eq!(
            next,
            vec![
                Assignment {
                    match_id: MatchId(8),
                    position: 0,
                    team: TeamId(2),
                },
                Assignment {
                    match_id: MatchId(7),
                    position: 0,
                    team: TeamId(1),
                },
            ]
        );
        apply(&mut matches, &next);

        // Eliminator: 4 beats 3.
        matches[5].status = MatchStatus::Completed(outcome(4, 3, 150, 5));
        let next = plan(&matches, &standings(&matches)).unwrap();
        assert_eq!(
            next,
            vec![Assignment {
                match_id: MatchId(7),
                position: 1,
                team: TeamId(4),
            }]
        );
        apply(&mut matches, &next);

        // Qualifier 2: 4 beats 1.
        matches[6].status = MatchStatus::Completed(outcome(4, 1, 150, 5));
        let next = plan(&matches, &standings(&matches)).unwrap();
        apply(&mut matches, &next);
        assert_eq!(matches[7].teams, [Slot::Assigned(TeamId(2)), Slot::Assigned(TeamId(4))]);

        assert!(plan(&matches, &standings(&matches)).unwrap().is_empty());
    }

    #[test]
    fn test_plan_never_overwrites() {
        let mut matches = season();
        matches[4].teams = [Slot::Assigned(TeamId(9)), Slot::Unassigned];

        let plan = plan(&matches, &standings(&matches)).unwrap();
        assert!(plan
            .iter()
            .all(|a| !(a.match_id == MatchId(5) && a.position == 0)));
        assert!(plan.contains(&Assignment {
            match_id: MatchId(5),
            position: 1,
            team: TeamId(2),
        }));
    }

    #[test]
    fn test_plan_insufficient_data() {
        let mut matches = season();
        matches[3].status = MatchStatus::Upcoming;
        assert!(plan(&matches, &standings(&matches)).unwrap().is_empty());

        // Only two ranked teams: Qualifier 1 is seeded, the eliminator is not.
        let matches = season();
        let two = Standings::from_matches(&teams(&["A", "B"]), &matches[2..3]).unwrap();
        let plan = plan(&matches, &two).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|a| a.match_id == MatchId(5)));
    }

    #[tokio::test]
    async fn test_advance_bracket() {
        let store = MemoryStore::new();
        store.insert_tournament(Tournament {
            id: TournamentId(1),
            name: String::from("Premier League"),
            results: None,
        });
        for team in teams(&["A", "B", "C", "D"]) {
            store.insert_team(TournamentId(1), team);
        }
        for m in season() {
            store.insert_match(m);
        }

        let applied = advance_bracket(&store, TournamentId(1)).await.unwrap();
        assert_eq!(applied.len(), 4);

        let q1 = store.get_match(MatchId(5)).await.unwrap().unwrap();
        assert_eq!(q1.teams, [Slot::Assigned(TeamId(1)), Slot::Assigned(TeamId(2))]);

        assert!(advance_bracket(&store, TournamentId(1))
            .await
            .unwrap()
            .is_empty());
    }
}
