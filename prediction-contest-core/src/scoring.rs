//! Converts a prediction and an official match result into points and a penalty fee.
//!
//! Points are layered:
//! - the base points of the [`MatchType`] if the predicted winner won,
//! - +1 each for the player of the match, the first-innings score bucket and the
//! first-innings wickets, independently of the winner pick,
//! - a team adjustment of +1/-1 depending on how the user's season team fared.
//!
//! [`MatchType`]: crate::MatchType
use crate::id::TeamId;
use crate::matches::Match;
use crate::prediction::{Prediction, ScoreBucket};
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The points awarded for each criterion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Breakdown {
    pub base: i32,
    pub player_of_match: i32,
    pub score_bucket: i32,
    pub wickets: i32,
    pub team_adjustment: i32,
}

/// Which criteria of the prediction were correct.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Flags {
    pub winner: bool,
    pub player_of_match: bool,
    pub score_bucket: bool,
    pub wickets: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Score {
    pub breakdown: Breakdown,
    pub flags: Flags,
}

impl Score {
    /// Returns the sum of all criteria, including the team adjustment.
    #[inline]
    pub fn total(&self) -> i32 {
        let b = &self.breakdown;
        b.base + b.player_of_match + b.score_bucket + b.wickets + b.team_adjustment
    }
}

/// Scores `prediction` against the result of the completed match `m`. `season_team` is the
/// season team of the predicting user.
///
/// # Errors
///
/// Returns [`Error::NotCompleted`] if `m` has no result, [`Error::MalformedResult`] if the
/// result does not fit the match and [`Error::InvalidPrediction`] if the prediction belongs
/// to another match.
pub fn score(prediction: &Prediction, m: &Match, season_team: TeamId) -> Result<Score> {
    if prediction.match_id != m.id {
        return Err(Error::InvalidPrediction("prediction belongs to another match"));
    }

    let outcome = m.outcome().ok_or(Error::NotCompleted(m.id))?;
    let (winner, loser) = m.winner_and_loser()?;
    let batting = m
        .position_of(outcome.batted_first)
        .ok_or(Error::MalformedResult(m.id))?;

    let picks = &prediction.picks;
    let innings = &picks.innings[batting];

    let mut flags = Flags {
        winner: picks.winner == winner,
        player_of_match: picks.player_of_match == Some(outcome.player_of_match),
        score_bucket: false,
        wickets: false,
    };

    // Reduced-overs totals are not comparable with full innings.
    if !outcome.shortened {
        flags.score_bucket =
            innings.bucket == Some(ScoreBucket::from_runs(outcome.first_innings_runs));
        flags.wickets = innings.wickets == Some(outcome.first_innings_wickets);
    }

    let team_adjustment = if season_team == winner {
        i32::from(picks.winner == season_team)
    } else if season_team == loser {
        -1
    } else {
        0
    };

    let breakdown = Breakdown {
        base: if flags.winner { m.kind.base_points() } else { 0 },
        player_of_match: i32::from(flags.player_of_match),
        score_bucket: i32::from(flags.score_bucket),
        wickets: i32::from(flags.wickets),
        team_adjustment,
    };

    log::debug!(
        "Scored prediction {} on match {}: {:?}",
        prediction.key(),
        m.number,
        breakdown
    );

    Ok(Score { breakdown, flags })
}

/// Returns the penalty fee owed for `prediction` on the completed match `m`. The fee of the
/// [`MatchType`] is charged only if the predicted winner lost.
///
/// [`MatchType`]: crate::MatchType
pub fn penalty(prediction: &Prediction, m: &Match) -> Result<u32> {
    let (winner, _) = m.winner_and_loser()?;

    if prediction.picks.winner == winner {
        Ok(0)
    } else {
        Ok(m.kind.penalty_fee())
    }
}

#[cfg(test)]
mod tests {
    use super::{penalty, score};
    use crate::id::{MatchId, PlayerId, TeamId, UserId};
    use crate::matches::tests::{fixture, outcome, utc};
    use crate::matches::{Match, MatchStatus, MatchType};
    use crate::prediction::{InningsPick, Picks, Prediction, ScoreBucket};
    use crate::Error;

    fn completed(kind: MatchType, winner: u64, batted_first: u64, runs: u32, wickets: u8) -> Match {
        let mut m = fixture(1, kind, [Some(1), Some(2)], utc(2025, 4, 1, 14, 0));
        m.status = MatchStatus::Completed(outcome(winner, batted_first, runs, wickets));
        m
    }

    fn prediction(winner: u64) -> Prediction {
        Prediction {
            user: UserId(1),
            match_id: MatchId(1),
            match_number: 1,
            picks: Picks::new(TeamId(winner)),
            submitted_at: utc(2025, 4, 1, 0, 0),
            scheduled_for: None,
            score: None,
        }
    }

    #[test]
    fn test_score_full_house() {
        // Team 1 batted first, made 150/7 and won a league match.
        let m = completed(MatchType::League, 1, 1, 150, 7);

        let mut p = prediction(1);
        p.picks.player_of_match = Some(PlayerId(100));
        p.picks.innings[0] = InningsPick {
            bucket: Some(ScoreBucket::C),
            wickets: Some(7),
        };

        let s = score(&p, &m, TeamId(1)).unwrap();
        assert_eq!(s.breakdown.base, 3);
        assert_eq!(s.breakdown.player_of_match, 1);
        assert_eq!(s.breakdown.score_bucket, 1);
        assert_eq!(s.breakdown.wickets, 1);
        assert_eq!(s.breakdown.team_adjustment, 1);
        assert_eq!(s.total(), 7);
        assert_eq!(penalty(&p, &m).unwrap(), 0);
    }

    #[test]
    fn test_score_uses_innings_of_first_batting_team() {
        // Team 2 batted first.
        let m = completed(MatchType::League, 2, 2, 150, 7);

        let mut p = prediction(1);
        p.picks.innings[0] = InningsPick {
            bucket: Some(ScoreBucket::C),
            wickets: Some(7),
        };
        p.picks.innings[1] = InningsPick {
            bucket: Some(ScoreBucket::A),
            wickets: Some(3),
        };

        let s = score(&p, &m, TeamId(9)).unwrap();
        assert!(!s.flags.score_bucket);
        assert!(!s.flags.wickets);
        assert_eq!(s.total(), 0);

        p.picks.innings[1] = InningsPick {
            bucket: Some(ScoreBucket::C),
            wickets: Some(7),
        };
        let s = score(&p, &m, TeamId(9)).unwrap();
        assert_eq!(s.total(), 2);
    }

    #[test]
    fn test_score_wrong_winner() {
        // Playoff: wrong winner, correct player and wickets.
        let m = completed(MatchType::Qualifier, 2, 1, 180, 5);

        let mut p = prediction(1);
        p.picks.player_of_match = Some(PlayerId(100));
        p.picks.innings[0] = InningsPick {
            bucket: Some(ScoreBucket::B),
            wickets: Some(5),
        };

        let s = score(&p, &m, TeamId(9)).unwrap();
        assert!(!s.flags.winner);
        assert_eq!(s.breakdown.base, 0);
        assert_eq!(s.total(), 2);
        assert_eq!(penalty(&p, &m).unwrap(), 3);
    }

    #[test]
    fn test_score_shortened_match() {
        let mut m = completed(MatchType::League, 1, 1, 150, 7);
        if let MatchStatus::Completed(outcome) = &mut m.status {
            outcome.shortened = true;
        }

        let mut p = prediction(1);
        p.picks.innings[0] = InningsPick {
            bucket: Some(ScoreBucket::C),
            wickets: Some(7),
        };

        let s = score(&p, &m, TeamId(9)).unwrap();
        assert!(!s.flags.score_bucket);
        assert!(!s.flags.wickets);
        assert_eq!(s.total(), 3);
    }

    #[test]
    fn test_team_adjustment() {
        let m = completed(MatchType::League, 1, 1, 100, 10);

        // Season team won and was predicted.
        assert_eq!(
            score(&prediction(1), &m, TeamId(1)).unwrap().breakdown.team_adjustment,
            1
        );
        // Season team won but was not predicted.
        assert_eq!(
            score(&prediction(2), &m, TeamId(1)).unwrap().breakdown.team_adjustment,
            0
        );
        // Season team lost, regardless of the pick.
        assert_eq!(
            score(&prediction(2), &m, TeamId(2)).unwrap().breakdown.team_adjustment,
            -1
        );
        assert_eq!(
            score(&prediction(1), &m, TeamId(2)).unwrap().breakdown.team_adjustment,
            -1
        );
        // Season team did not play.
        assert_eq!(
            score(&prediction(1), &m, TeamId(3)).unwrap().breakdown.team_adjustment,
            0
        );
    }

    #[test]
    fn test_score_requires_result() {
        let m = fixture(1, MatchType::Final, [Some(1), Some(2)], utc(2025, 5, 1, 14, 0));
        assert!(matches!(
            score(&prediction(1), &m, TeamId(1)),
            Err(Error::NotCompleted(_))
        ));
        assert!(penalty(&prediction(1), &m).is_err());

        let m = completed(MatchType::Final, 3, 1, 100, 1);
        assert!(matches!(
            score(&prediction(1), &m, TeamId(1)),
            Err(Error::MalformedResult(_))
        ));
    }

    #[test]
    fn test_penalty_fees() {
        for (kind, fee) in [
            (MatchType::League, 2),
            (MatchType::Eliminator, 3),
            (MatchType::Final, 5),
        ] {
            let m = completed(kind, 2, 1, 100, 1);
            assert_eq!(penalty(&prediction(1), &m).unwrap(), fee);
            assert_eq!(penalty(&prediction(2), &m).unwrap(), 0);
        }
    }
}
