//! Decides whether a prediction for a match may still be submitted or edited.
//!
//! Two boundaries exist:
//! 1. The per-day boundary: predictions for all matches of a match day close
//! [`lead_time`] before the first match of that day starts, and unconditionally once it
//! started.
//! 2. The administrative daily cutoff: predictions for the next upcoming match day close at
//! [`daily_cutoff_time`] (in [`daily_cutoff_offset`]) on the preceding calendar day.
//!
//! The earlier of the applicable boundaries is binding.
//!
//! [`lead_time`]: CutoffRules::lead_time
//! [`daily_cutoff_time`]: CutoffRules::daily_cutoff_time
//! [`daily_cutoff_offset`]: CutoffRules::daily_cutoff_offset
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::id::MatchId;
use crate::matches::Match;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nepal Standard Time, UTC+05:45.
const MATCH_DAY_OFFSET_SECS: i32 = 5 * 3600 + 45 * 60;
/// Central Standard Time, UTC-06:00.
const DAILY_CUTOFF_OFFSET_SECS: i32 = -6 * 3600;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CutoffRules {
    /// The timezone partitioning match start instants into match days.
    pub match_day_offset: FixedOffset,
    /// How long before the first match of a day predictions for that day close.
    pub lead_time: Duration,
    /// The timezone of the administrative daily cutoff.
    pub daily_cutoff_offset: FixedOffset,
    pub daily_cutoff_time: NaiveTime,
    /// A match day opens once its first match starts within this window.
    pub opening_window: Duration,
    pub reminder_lead: Duration,
}

impl CutoffRules {
    /// Returns the match day `instant` falls on.
    #[inline]
    pub fn match_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.match_day_offset).date_naive()
    }

    /// Returns the administrative cutoff applying to the match day `day`. It falls on the
    /// calendar day before `day`.
    pub fn daily_cutoff(&self, day: NaiveDate) -> Result<DateTime<Utc>> {
        let previous = day.pred_opt().ok_or(Error::UnknownDeadline)?;

        self.daily_cutoff_offset
            .from_local_datetime(&previous.and_time(self.daily_cutoff_time))
            .single()
            .map(|cutoff| cutoff.with_timezone(&Utc))
            .ok_or(Error::UnknownDeadline)
    }
}

impl Default for CutoffRules {
    fn default() -> Self {
        Self {
            match_day_offset: FixedOffset::east_opt(MATCH_DAY_OFFSET_SECS)
                .unwrap_or_else(|| Utc.fix()),
            lead_time: Duration::hours(6),
            daily_cutoff_offset: FixedOffset::east_opt(DAILY_CUTOFF_OFFSET_SECS)
                .unwrap_or_else(|| Utc.fix()),
            daily_cutoff_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
            opening_window: Duration::hours(24),
            reminder_lead: Duration::hours(2),
        }
    }
}

/// The reason a match is locked for editing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LockReason {
    /// The first match of the day has started or completed.
    FirstMatchStarted,
    /// The administrative cutoff on the preceding day has passed.
    DailyCutoff,
    /// The per-day boundary before the first match has passed.
    LeadTime,
}

impl Display for LockReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstMatchStarted => "the first match of the day has started",
            Self::DailyCutoff => "the daily cutoff has passed",
            Self::LeadTime => "the match day closed before its first match",
        })
    }
}

/// The outcome of [`resolve`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CutoffDecision {
    pub locked: bool,
    /// The binding deadline.
    pub deadline: DateTime<Utc>,
    /// Why the match is locked. Always `Some` if `locked` is `true`.
    pub reason: Option<LockReason>,
    /// The instant a prediction scheduled now would become active.
    pub activation_at: DateTime<Utc>,
    pub first_of_day: MatchId,
    /// The administrative cutoff, if it applies to the match.
    pub daily_cutoff: Option<DateTime<Utc>>,
    /// Whether the match day accepts immediate predictions yet.
    pub open: bool,
}

impl CutoffDecision {
    /// Returns `true` if the match is still editable and the deadline is at most `lead`
    /// away.
    #[inline]
    pub fn closing_soon(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        !self.locked && self.deadline - now <= lead
    }

    /// Returns the time left until the deadline, or `None` if the match is locked.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.locked {
            None
        } else {
            Some(self.deadline - now)
        }
    }
}

/// Resolves the cutoff for the match `m` at `now`. `calendar` contains all matches of the
/// tournament.
///
/// # Errors
///
/// Returns [`Error::UnknownDeadline`] if no non-cancelled match of `calendar` falls on the
/// match day of `m`.
pub fn resolve(
    rules: &CutoffRules,
    now: DateTime<Utc>,
    calendar: &[Match],
    m: &Match,
) -> Result<CutoffDecision> {
    let day = rules.match_day(m.start);
    let first = first_of_day(rules, calendar, day).ok_or(Error::UnknownDeadline)?;

    let per_day = first.start - rules.lead_time;
    let daily_cutoff = if next_match_day(rules, now, calendar) == Some(day) {
        Some(rules.daily_cutoff(day)?)
    } else {
        None
    };

    let (deadline, binding) = match daily_cutoff {
        Some(cutoff) if cutoff < per_day => (cutoff, LockReason::DailyCutoff),
        _ => (per_day, LockReason::LeadTime),
    };

    let reason = if !first.is_upcoming() || first.start <= now {
        Some(LockReason::FirstMatchStarted)
    } else if now >= deadline {
        Some(binding)
    } else {
        None
    };

    let activation_at = per_day.min(rules.daily_cutoff(day)?);
    let activation_at = if activation_at > now {
        activation_at
    } else {
        now + Duration::seconds(1)
    };

    let open = first.start - now <= rules.opening_window
        || calendar
            .iter()
            .filter(|c| !c.is_cancelled() && rules.match_day(c.start) < day)
            .all(Match::is_completed);

    log::debug!(
        "Cutoff for match {} (day {}): deadline {}, reason {:?}",
        m.number,
        day,
        deadline,
        reason
    );

    Ok(CutoffDecision {
        locked: reason.is_some(),
        deadline,
        reason,
        activation_at,
        first_of_day: first.id,
        daily_cutoff,
        open,
    })
}

/// Returns the earliest non-cancelled match on `day`. Ties are broken by match number.
pub fn first_of_day<'a>(rules: &CutoffRules, calendar: &'a [Match], day: NaiveDate) -> Option<&'a Match> {
    calendar
        .iter()
        .filter(|m| !m.is_cancelled() && rules.match_day(m.start) == day)
        .min_by_key(|m| (m.start, m.number))
}

/// Returns the match day of the earliest upcoming match starting after `now`.
pub fn next_match_day(rules: &CutoffRules, now: DateTime<Utc>, calendar: &[Match]) -> Option<NaiveDate> {
    calendar
        .iter()
        .filter(|m| m.is_upcoming() && m.start > now)
        .min_by_key(|m| (m.start, m.number))
        .map(|m| rules.match_day(m.start))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::{first_of_day, resolve, CutoffRules, LockReason};
    use crate::id::MatchId;
    use crate::matches::tests::{fixture, outcome, utc};
    use crate::matches::{Match, MatchStatus, MatchType};
    use crate::Error;

    // Match days in +05:45. 14:00 UTC is 19:45 local, 10:00 UTC is 15:45 local.
    fn calendar() -> Vec<Match> {
        vec![
            fixture(1, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 1, 14, 0)),
            fixture(2, MatchType::League, [Some(3), Some(4)], utc(2025, 4, 2, 10, 0)),
            fixture(3, MatchType::League, [Some(1), Some(3)], utc(2025, 4, 2, 14, 0)),
            fixture(4, MatchType::League, [Some(2), Some(4)], utc(2025, 4, 4, 14, 0)),
        ]
    }

    #[test]
    fn test_match_day() {
        let rules = CutoffRules::default();
        // 20:00 UTC is already the next day in +05:45.
        assert_eq!(
            rules.match_day(utc(2025, 4, 1, 20, 0)),
            utc(2025, 4, 2, 0, 0).date_naive()
        );
        assert_eq!(
            rules.match_day(utc(2025, 4, 1, 18, 14)),
            utc(2025, 4, 1, 0, 0).date_naive()
        );
    }

    #[test]
    fn test_daily_cutoff() {
        let rules = CutoffRules::default();
        // 19:00 at -06:00 on April 1st.
        assert_eq!(
            rules.daily_cutoff(utc(2025, 4, 2, 0, 0).date_naive()).unwrap(),
            utc(2025, 4, 2, 1, 0)
        );
    }

    #[test]
    fn test_first_of_day() {
        let rules = CutoffRules::default();
        let mut matches = calendar();
        let day = utc(2025, 4, 2, 0, 0).date_naive();

        assert_eq!(first_of_day(&rules, &matches, day).unwrap().id, MatchId(2));

        matches[1].status = MatchStatus::Cancelled;
        assert_eq!(first_of_day(&rules, &matches, day).unwrap().id, MatchId(3));
    }

    #[test]
    fn test_resolve_lead_time() {
        let rules = CutoffRules::default();
        let matches = calendar();

        // Match 1 is still upcoming, the daily cutoff does not apply to April 2nd.
        let decision = resolve(&rules, utc(2025, 4, 1, 8, 0), &matches, &matches[2]).unwrap();
        assert!(!decision.locked);
        assert_eq!(decision.first_of_day, MatchId(2));
        assert_eq!(decision.deadline, utc(2025, 4, 2, 4, 0));
        assert_eq!(decision.daily_cutoff, None);
        assert_eq!(decision.activation_at, utc(2025, 4, 2, 1, 0));
    }

    #[test]
    fn test_resolve_daily_cutoff() {
        let rules = CutoffRules::default();
        let mut matches = calendar();
        matches[0].status = MatchStatus::Completed(outcome(1, 1, 160, 4));

        let decision = resolve(&rules, utc(2025, 4, 2, 0, 59), &matches, &matches[2]).unwrap();
        assert!(!decision.locked);
        assert_eq!(decision.deadline, utc(2025, 4, 2, 1, 0));
        assert_eq!(decision.daily_cutoff, Some(utc(2025, 4, 2, 1, 0)));
        assert!(decision.closing_soon(utc(2025, 4, 2, 0, 59), rules.reminder_lead));
        assert_eq!(decision.remaining(utc(2025, 4, 2, 0, 59)), Some(Duration::minutes(1)));

        let decision = resolve(&rules, utc(2025, 4, 2, 1, 0), &matches, &matches[2]).unwrap();
        assert!(decision.locked);
        assert_eq!(decision.reason, Some(LockReason::DailyCutoff));
        assert!(!decision.closing_soon(utc(2025, 4, 2, 1, 0), rules.reminder_lead));
    }

    #[test]
    fn test_resolve_first_match_started() {
        let rules = CutoffRules::default();
        let mut matches = calendar();
        matches[1].status = MatchStatus::Completed(outcome(3, 3, 160, 4));

        // The clock alone would not lock match 3 yet.
        let decision = resolve(&rules, utc(2025, 4, 1, 8, 0), &matches, &matches[2]).unwrap();
        assert!(decision.locked);
        assert_eq!(decision.reason, Some(LockReason::FirstMatchStarted));

        let matches = calendar();
        let decision = resolve(&rules, utc(2025, 4, 2, 10, 0), &matches, &matches[2]).unwrap();
        assert_eq!(decision.reason, Some(LockReason::FirstMatchStarted));
    }

    #[test]
    fn test_resolve_lock_is_monotonic() {
        let rules = CutoffRules::default();
        let matches = calendar();

        for target in &matches {
            let mut locked = false;
            let mut now = utc(2025, 3, 30, 0, 0);
            while now < utc(2025, 4, 5, 0, 0) {
                let decision = resolve(&rules, now, &matches, target).unwrap();
                assert!(!locked || decision.locked);
                assert_eq!(decision.locked, decision.reason.is_some());
                locked = decision.locked;
                now = now + Duration::minutes(30);
            }
            assert!(locked);
        }
    }

    #[test]
    fn test_resolve_opening() {
        let rules = CutoffRules::default();
        let mut matches = calendar();

        // April 4th is more than a day away and match 3 is still upcoming.
        let decision = resolve(&rules, utc(2025, 4, 2, 8, 0), &matches, &matches[3]).unwrap();
        assert!(!decision.open);

        for m in &mut matches[..3] {
            m.status = MatchStatus::Completed(outcome(1, 1, 120, 10));
        }
        let decision = resolve(&rules, utc(2025, 4, 2, 8, 0), &matches, &matches[3]).unwrap();
        assert!(decision.open);

        let matches = calendar();
        let decision = resolve(&rules, utc(2025, 4, 3, 15, 0), &matches, &matches[3]).unwrap();
        assert!(decision.open);
    }

    #[test]
    fn test_resolve_activation_after_now() {
        let rules = CutoffRules::default();
        let matches = calendar();

        let now = utc(2025, 4, 2, 2, 0);
        let decision = resolve(&rules, now, &matches, &matches[2]).unwrap();
        assert!(decision.activation_at > now);
    }

    #[test]
    fn test_resolve_unknown_deadline() {
        let rules = CutoffRules::default();
        let m = fixture(9, MatchType::League, [Some(1), Some(2)], utc(2025, 4, 9, 14, 0));

        assert!(matches!(
            resolve(&rules, utc(2025, 4, 1, 0, 0), &[], &m),
            Err(Error::UnknownDeadline)
        ));
        assert!(matches!(
            resolve(&rules, utc(2025, 4, 1, 0, 0), &calendar(), &m),
            Err(Error::UnknownDeadline)
        ));
    }
}
