//! Integration tests for derived focus statistics.
//!
//! Reference date: Wednesday 2026-10-14. The week containing it starts on
//! Sunday 2026-10-11.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use focus::stats::{self, DerivedStats};
use focus::tasks::LocalBackend;
use focus_proto::session::{FocusSession, SessionId};
use focus_proto::task::OwnerId;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn utc(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
}

fn session(at: DateTime<Utc>, minutes: u32) -> FocusSession {
    FocusSession {
        id: SessionId::generate(),
        task: Some("deep work".into()),
        minutes,
        completed_at: at,
        owner_id: OwnerId::new("alice"),
    }
}

fn now() -> DateTime<Utc> {
    utc(14, 18)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn two_today_one_yesterday() {
    let sessions = [
        session(utc(14, 9), 25),
        session(utc(14, 11), 50),
        session(utc(13, 16), 25),
    ];
    let stats = stats::compute(&sessions, &now());

    assert_eq!(
        stats,
        DerivedStats {
            total_sessions: 3,
            total_minutes: 100,
            total_hours: 1.7,
            today_sessions: 2,
            today_minutes: 75,
            week_sessions: 3,
            week_minutes: 100,
            streak: 2,
        }
    );
}

#[test]
fn nothing_today_breaks_streak() {
    let sessions = [session(utc(13, 9), 25), session(utc(12, 9), 25)];
    let stats = stats::compute(&sessions, &now());

    assert_eq!(stats.today_sessions, 0);
    assert_eq!(stats.today_minutes, 0);
    assert_eq!(stats.streak, 0);
    assert_eq!(stats.week_sessions, 2);
}

#[test]
fn empty_log_is_all_zero() {
    assert_eq!(stats::compute(&[], &now()), DerivedStats::default());
}

#[test]
fn gap_stops_streak() {
    let sessions = [
        session(utc(14, 9), 25),
        session(utc(13, 9), 25),
        session(utc(11, 9), 25),
        session(utc(10, 9), 25),
    ];
    assert_eq!(stats::compute(&sessions, &now()).streak, 2);
}

#[test]
fn week_starts_on_sunday() {
    let sessions = [
        // Saturday of the previous week.
        session(utc(10, 12), 40),
        // Sunday, first day of this week.
        session(utc(11, 12), 20),
    ];
    let stats = stats::compute(&sessions, &now());

    assert_eq!(stats.week_sessions, 1);
    assert_eq!(stats.week_minutes, 20);
    assert_eq!(stats.total_minutes, 60);
    assert_eq!(stats.total_hours, 1.0);
}

#[test]
fn future_sessions_count_only_in_totals() {
    let sessions = [session(utc(16, 9), 30)];
    let stats = stats::compute(&sessions, &now());

    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.week_sessions, 0);
    assert_eq!(stats.today_sessions, 0);
}

#[test]
fn later_today_counts_toward_today_and_week() {
    // now() is 18:00; a clock-skewed session at 21:00 is still today.
    let sessions = [session(utc(14, 21), 30)];
    let stats = stats::compute(&sessions, &now());

    assert_eq!(stats.today_sessions, 1);
    assert_eq!(stats.week_sessions, 1);
    assert_eq!(stats.week_minutes, 30);
}

#[test]
fn day_boundaries_follow_the_reference_zone() {
    // 2026-10-14 02:00 UTC is still 2026-10-13 in UTC-05:00.
    let sessions = [session(utc(14, 2), 25)];
    let eastern = FixedOffset::west_opt(5 * 3600).unwrap();

    let in_utc = stats::compute(&sessions, &now());
    let in_eastern = stats::compute(&sessions, &now().with_timezone(&eastern));

    assert_eq!(in_utc.today_sessions, 1);
    assert_eq!(in_utc.streak, 1);
    assert_eq!(in_eastern.today_sessions, 0);
    assert_eq!(in_eastern.streak, 0);
}

#[test]
fn hours_round_to_one_decimal() {
    let sessions = [session(utc(14, 9), 25)];
    // 25 / 60 = 0.4166...
    assert_eq!(stats::compute(&sessions, &now()).total_hours, 0.4);
}

#[test]
fn local_backend_stats_reflect_recorded_sessions() {
    let backend = LocalBackend::in_memory();
    backend.record_session(Some("write"), 25).unwrap();
    backend.record_session(None, 50).unwrap();

    let stats = backend.stats();
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_minutes, 75);
    assert_eq!(stats.today_sessions, 2);
    assert_eq!(stats.streak, 1);
}
