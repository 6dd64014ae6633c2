use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::id::{MatchId, PlayerId, PredictionKey, TeamId, UserId};
use crate::scoring::Score;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The highest wicket count a first innings can end with.
pub const MAX_WICKETS: u8 = 10;

/// One of six ordered bands partitioning first-innings run totals.
///
/// The upper boundary of every band belongs to that (lower) band.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScoreBucket {
    /// Up to 130 runs.
    A,
    /// 131 to 145 runs.
    B,
    /// 146 to 160 runs.
    C,
    /// 161 to 175 runs.
    D,
    /// 176 to 190 runs.
    E,
    /// 191 runs or more.
    F,
}

impl ScoreBucket {
    /// Upper (inclusive) run boundaries of the bands `A` through `E`.
    const UPPER_BOUNDS: [(u32, Self); 5] = [
        (130, Self::A),
        (145, Self::B),
        (160, Self::C),
        (175, Self::D),
        (190, Self::E),
    ];

    /// Classifies a first-innings run total.
    pub fn from_runs(runs: u32) -> Self {
        Self::UPPER_BOUNDS
            .iter()
            .find(|(bound, _)| runs <= *bound)
            .map(|(_, bucket)| *bucket)
            .unwrap_or(Self::F)
    }
}

impl Display for ScoreBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        })
    }
}

impl FromStr for ScoreBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            "D" | "d" => Ok(Self::D),
            "E" | "e" => Ok(Self::E),
            "F" | "f" => Ok(Self::F),
            _ => Err(Error::InvalidPrediction("unknown score bucket")),
        }
    }
}

/// The first-innings pick for one of the two possible batting orders.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InningsPick {
    pub bucket: Option<ScoreBucket>,
    pub wickets: Option<u8>,
}

/// The choices a predictor makes for a single match.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Picks {
    pub winner: TeamId,
    pub player_of_match: Option<PlayerId>,
    /// Index 0 applies if the first team of the match bats first, index 1 if the second
    /// team does. Only one of them is live once the match completed.
    pub innings: [InningsPick; 2],
}

impl Picks {
    pub fn new(winner: TeamId) -> Self {
        Self {
            winner,
            player_of_match: None,
            innings: [InningsPick::default(); 2],
        }
    }

    /// Checks the picks for values no result could ever match.
    pub fn validate(&self) -> Result<()> {
        for pick in &self.innings {
            if pick.wickets.map_or(false, |wickets| wickets > MAX_WICKETS) {
                return Err(Error::InvalidPrediction("wickets must be between 0 and 10"));
            }
        }

        Ok(())
    }
}

/// The stored scoring outcome of a prediction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoreRecord {
    pub score: Score,
    pub penalty: u32,
    pub scored_at: DateTime<Utc>,
}

impl ScoreRecord {
    #[inline]
    pub fn points(&self) -> i32 {
        self.score.total()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Prediction {
    pub user: UserId,
    pub match_id: MatchId,
    pub match_number: u32,
    pub picks: Picks,
    pub submitted_at: DateTime<Utc>,
    /// A deferred prediction stays inert until this instant has passed.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub score: Option<ScoreRecord>,
}

impl Prediction {
    #[inline]
    pub fn key(&self) -> PredictionKey {
        PredictionKey::new(self.user, self.match_id)
    }

    /// Returns `true` if the prediction takes part in scoring and cutoff enforcement at
    /// `now`.
    #[inline]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |at| at <= now)
    }

    #[inline]
    pub fn points(&self) -> i32 {
        self.score.as_ref().map_or(0, ScoreRecord::points)
    }

    #[inline]
    pub fn penalty(&self) -> u32 {
        self.score.as_ref().map_or(0, |record| record.penalty)
    }
}

#[cfg(test)]
mod tests {
    use super::{InningsPick, Picks, ScoreBucket};
    use crate::id::TeamId;

    #[test]
    fn test_score_bucket_boundaries() {
        assert_eq!(ScoreBucket::from_runs(0), ScoreBucket::A);
        assert_eq!(ScoreBucket::from_runs(129), ScoreBucket::A);
        assert_eq!(ScoreBucket::from_runs(130), ScoreBucket::A);
        assert_eq!(ScoreBucket::from_runs(131), ScoreBucket::B);
        assert_eq!(ScoreBucket::from_runs(145), ScoreBucket::B);
        assert_eq!(ScoreBucket::from_runs(146), ScoreBucket::C);
        assert_eq!(ScoreBucket::from_runs(160), ScoreBucket::C);
        assert_eq!(ScoreBucket::from_runs(161), ScoreBucket::D);
        assert_eq!(ScoreBucket::from_runs(175), ScoreBucket::D);
        assert_eq!(ScoreBucket::from_runs(176), ScoreBucket::E);
        assert_eq!(ScoreBucket::from_runs(190), ScoreBucket::E);
        assert_eq!(ScoreBucket::from_runs(191), ScoreBucket::F);
        assert_eq!(ScoreBucket::from_runs(320), ScoreBucket::F);
    }

    #[test]
    fn test_score_bucket_monotonic() {
        let mut last = ScoreBucket::A;
        for runs in 0..400 {
            let bucket = ScoreBucket::from_runs(runs);
            assert!(bucket >= last);
            last = bucket;
        }
    }

    #[test]
    fn test_score_bucket_parse() {
        assert_eq!("C".parse::<ScoreBucket>().unwrap(), ScoreBucket::C);
        assert_eq!("f".parse::<ScoreBucket>().unwrap(), ScoreBucket::F);
        assert!("G".parse::<ScoreBucket>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_score_bucket_serde() {
        use serde_test::{assert_tokens, Token};

        assert_tokens(
            &ScoreBucket::D,
            &[Token::UnitVariant {
                name: "ScoreBucket",
                variant: "D",
            }],
        );
    }

    #[test]
    fn test_picks_validate() {
        let mut picks = Picks::new(TeamId(1));
        assert!(picks.validate().is_ok());

        picks.innings[1] = InningsPick {
            bucket: Some(ScoreBucket::B),
            wickets: Some(10),
        };
        assert!(picks.validate().is_ok());

        picks.innings[0].wickets = Some(11);
        assert!(picks.validate().is_err());
    }
}
