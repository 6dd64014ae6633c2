//! Prediction submission and activation of scheduled predictions.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::cutoff::{self, CutoffRules};
use crate::id::{MatchId, UserId};
use crate::prediction::{Picks, Prediction};
use crate::rescore;
use crate::store::Store;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A prediction as entered by a user.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Submission {
    pub user: UserId,
    pub match_id: MatchId,
    pub picks: Picks,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// The prediction is active right away. Only possible while the match is open.
    #[default]
    Immediate,
    /// The prediction stays inert until the match day's cutoff comes around.
    Scheduled,
}

/// Stores `submission`, replacing any earlier prediction of the same user for the same
/// match.
///
/// # Errors
///
/// - [`Error::MatchNotFound`] or [`Error::EntryNotFound`] if the match or the user's season
/// entry do not exist.
/// - [`Error::InvalidPrediction`] if the picks can never match a result.
/// - [`Error::OutOfWindow`] if an immediate prediction is submitted while the match is
/// locked for editing.
/// - [`Error::NotOpen`] if the match day does not accept immediate predictions yet.
/// - [`Error::MatchStarted`] if a scheduled prediction is submitted after the match
/// started.
pub async fn submit_prediction<S>(
    store: &S,
    rules: &CutoffRules,
    now: DateTime<Utc>,
    submission: Submission,
    mode: Mode,
) -> Result<Prediction>
where
    S: Store,
{
    let m = store
        .get_match(submission.match_id)
        .await?
        .ok_or(Error::MatchNotFound(submission.match_id))?;

    if store.entry(m.tournament, submission.user).await?.is_none() {
        return Err(Error::EntryNotFound(submission.user));
    }

    if m.is_cancelled() {
        return Err(Error::InvalidPrediction("the match was cancelled"));
    }

    submission.picks.validate()?;
    let teams = m
        .assigned_teams()
        .map_err(|_| Error::InvalidPrediction("the teams of the match are not known yet"))?;
    if !teams.contains(&submission.picks.winner) {
        return Err(Error::InvalidPrediction(
            "the predicted winner does not play in the match",
        ));
    }

    let calendar = store.matches(m.tournament).await?;
    let decision = cutoff::resolve(rules, now, &calendar, &m)?;

    let scheduled_for = match mode {
        Mode::Immediate => {
            if let Some(reason) = decision.reason {
                return Err(Error::OutOfWindow(reason));
            }

            if !decision.open {
                return Err(Error::NotOpen);
            }

            None
        }
        Mode::Scheduled => {
            // Scheduling stays possible after both cutoffs passed.
            if !m.is_upcoming() || m.start <= now {
                return Err(Error::MatchStarted);
            }

            Some(decision.activation_at)
        }
    };

    let prediction = Prediction {
        user: submission.user,
        match_id: m.id,
        match_number: m.number,
        picks: submission.picks,
        submitted_at: now,
        scheduled_for,
        score: None,
    };

    store.put_prediction(&prediction).await?;

    log::info!(
        "Stored prediction {} ({:?}, deadline {})",
        prediction.key(),
        mode,
        decision.deadline
    );

    Ok(prediction)
}

/// Activates every scheduled prediction that is due at `now`. Matches that already
/// completed are rescored so late activations count. Returns the number of activated
/// predictions.
pub async fn activate_due<S>(store: &S, now: DateTime<Utc>) -> Result<usize>
where
    S: Store,
{
    let due = store.due_predictions(now).await?;
    let mut touched = BTreeSet::new();

    for prediction in &due {
        store.activate_prediction(prediction.key()).await?;
        log::debug!("Activated prediction {}", prediction.key());

        touched.insert(prediction.match_id);
    }

    for id in touched {
        match store.get_match(id).await? {
            Some(m) if m.is_completed() => {
                rescore::rescore_match(store, id, false, now).await?;
            }
            _ => (),
        }
    }

    if !due.is_empty() {
        log::info!("Activated {} scheduled predictions", due.len());
    }

    Ok(due.len())
}
