//! # prediction-contest-core
//!
//! The prediction lifecycle and scoring engine of a season-long cricket prediction contest.
//! Users predict the outcome of every match of a multi-stage tournament (league, playoff,
//! final) and collect points and penalty fees depending on how accurate they were.
//!
//! Important items:
//! - [`cutoff::resolve`]: Decides whether a prediction for a match may still be edited.
//! - [`scoring::score`]: Turns a prediction and an official result into points.
//! - [`rescore::record_result`]: Records a result and propagates it into scores, totals,
//! ranks and the playoff bracket.
//! - [`bracket::plan`]: Computes which teams advance into which playoff slots.
//! - [`submit::submit_prediction`]: Validates and stores a prediction.
//! - [`Store`]: The persistence seam all workflows run against. [`MemoryStore`] keeps
//! everything in memory.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to all record types.
//!
pub mod bonus;
pub mod bracket;
pub mod cutoff;
pub mod rescore;
pub mod scoring;
pub mod standings;
pub mod store;
pub mod submit;

mod id;
mod matches;
mod prediction;
mod tournament;

pub use bonus::BonusBreakdown;
pub use cutoff::{CutoffDecision, CutoffRules, LockReason};
pub use id::{MatchId, ParseKeyError, PlayerId, PredictionKey, TeamId, TournamentId, UserId};
pub use matches::{Match, MatchStatus, MatchType, Outcome, Slot};
pub use prediction::{InningsPick, Picks, Prediction, ScoreBucket, ScoreRecord, MAX_WICKETS};
pub use scoring::{Breakdown, Flags, Score};
pub use standings::Standings;
pub use store::{MemoryStore, Store};
pub use tournament::{Awards, SeasonEntry, Team, Totals, Tournament, TournamentResults};

use thiserror::Error;

use std::result;

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tournament {0} not found")]
    TournamentNotFound(TournamentId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("prediction {0} not found")]
    PredictionNotFound(PredictionKey),
    #[error("user {0} has no season entry")]
    EntryNotFound(UserId),
    #[error("predictions are closed: {0}")]
    OutOfWindow(LockReason),
    #[error("predictions for this match day are not open yet")]
    NotOpen,
    #[error("the match has already started")]
    MatchStarted,
    #[error("the final has not been completed")]
    FinalNotCompleted,
    #[error("match {0} has not been completed")]
    NotCompleted(MatchId),
    #[error("cannot correct match {number}: match {later} already completed")]
    Inconsistent { number: u32, later: u32 },
    #[error("cannot determine the deadline of the match")]
    UnknownDeadline,
    #[error("invalid prediction: {0}")]
    InvalidPrediction(&'static str),
    #[error("the result of match {0} does not fit the match")]
    MalformedResult(MatchId),
    #[error(transparent)]
    Store(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps a persistence error.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
