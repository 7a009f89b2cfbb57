//! Windowed totals and day streaks over a session log snapshot.
//!
//! Everything here is pure: the result depends only on the sessions passed
//! in and the reference `now`. Calendar boundaries are taken in the time
//! zone of `now`, so the same snapshot can be evaluated for any user's
//! local day. The week starts on Sunday, and the week window runs from
//! Sunday midnight through the end of today, so a session stamped later
//! today than `now` still counts toward the week as it does toward today.
//!
//! The streak is anchored at today. It counts consecutive days ending at
//! today that each hold at least one session, so a day with no session yet
//! yields zero even after a long run of previous days.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use focus_proto::session::FocusSession;

/// Aggregates derived from a session log. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub total_sessions: usize,
    pub total_minutes: u64,
    /// Total minutes in hours, rounded to one decimal.
    pub total_hours: f64,
    pub today_sessions: usize,
    pub today_minutes: u64,
    pub week_sessions: usize,
    pub week_minutes: u64,
    /// Consecutive days with a session, counted back from today.
    pub streak: u32,
}

/// Computes stats with calendar days taken in `now`'s time zone.
#[must_use]
pub fn compute<Tz: TimeZone>(sessions: &[FocusSession], now: &DateTime<Tz>) -> DerivedStats {
    let zone = now.timezone();
    let today = now.date_naive();
    let week_start = start_of_week(today);

    let mut stats = DerivedStats::default();
    let mut active_days = HashSet::new();

    for session in sessions {
        let day = session.completed_at.with_timezone(&zone).date_naive();
        let minutes = u64::from(session.minutes);

        stats.total_sessions += 1;
        stats.total_minutes += minutes;
        if day == today {
            stats.today_sessions += 1;
            stats.today_minutes += minutes;
        }
        if (week_start..=today).contains(&day) {
            stats.week_sessions += 1;
            stats.week_minutes += minutes;
        }
        active_days.insert(day);
    }

    stats.total_hours = round_hours(stats.total_minutes);
    stats.streak = streak_ending_at(today, &active_days);
    stats
}

/// Computes stats in the system's local time zone.
#[must_use]
pub fn compute_local(sessions: &[FocusSession], now: DateTime<Utc>) -> DerivedStats {
    compute(sessions, &now.with_timezone(&Local))
}

/// The most recent Sunday on or before `day`.
#[must_use]
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let back = u64::from(day.weekday().num_days_from_sunday());
    day.checked_sub_days(Days::new(back)).unwrap_or(day)
}

fn streak_ending_at(today: NaiveDate, active_days: &HashSet<NaiveDate>) -> u32 {
    let mut streak = 0;
    let mut day = today;
    while active_days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

#[allow(clippy::cast_precision_loss)]
fn round_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}
