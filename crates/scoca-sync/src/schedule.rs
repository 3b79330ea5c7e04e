//! Opinion posting schedule.
//!
//! The court posts published opinions on Mondays and Thursdays at 10:00
//! local time. Nothing new can appear between two postings, so the next
//! posting time bounds how long a fetched docket stays current, and an
//! ingest inside that window can skip CourtListener entirely.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};

const POSTING_DAYS: [Weekday; 2] = [Weekday::Mon, Weekday::Thu];

fn posting_time() -> NaiveTime {
    NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default()
}

/// The first posting time strictly after `now`.
pub fn next_posting_date(now: NaiveDateTime) -> NaiveDateTime {
    // A posting day is never more than four days away, so a week covers it.
    (0..=7)
        .map(|days| (now.date() + Duration::days(days)).and_time(posting_time()))
        .find(|candidate| *candidate > now && POSTING_DAYS.contains(&candidate.weekday()))
        .unwrap_or(now)
}

/// Whether a docket walk finished at `last_fetch` can still be trusted at
/// `now`: true until the first posting after that walk.
pub fn fetch_is_current(last_fetch: NaiveDateTime, now: NaiveDateTime) -> bool {
    now >= last_fetch && now < next_posting_date(last_fetch)
}
