//! NYSE trading calendar.
//!
//! Sessions are computed from exchange rules rather than fetched: weekends,
//! full-day holidays with weekend observance, a short list of unscheduled
//! closures, and 13:00 early closes. The schedule is rebuilt on every call.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closures outside the holiday rules (storms, national days of mourning).
const SPECIAL_CLOSURES: [(i32, u32, u32); 4] =
    [(2012, 10, 29), (2012, 10, 30), (2018, 12, 5), (2025, 1, 9)];

/// A regular trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub date: NaiveDate,
    pub market_open: DateTime<Utc>,
    pub market_close: DateTime<Utc>,
    pub early_close: bool,
}

/// Source of trading dates and their session times.
pub trait TradingCalendar {
    /// Exchange name, for log lines.
    fn name(&self) -> &str;

    /// Sessions for every trading date in `start..=end`, keyed by date.
    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, Session>;

    fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.schedule(date, date).contains_key(&date)
    }
}

/// New York Stock Exchange calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NyseCalendar;

impl NyseCalendar {
    pub fn new() -> Self {
        Self
    }

    /// Full-day market holidays (observed dates) falling in `year`.
    pub fn holidays(year: i32) -> Vec<NaiveDate> {
        let mut days = Vec::with_capacity(11);

        // New Year's Day: Sunday moves to Monday, Saturday is not observed.
        if let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) {
            match jan1.weekday() {
                Weekday::Sat => {}
                Weekday::Sun => days.push(jan1 + Duration::days(1)),
                _ => days.push(jan1),
            }
        }

        if year >= 1998 {
            days.extend(nth_weekday(year, 1, Weekday::Mon, 3));
        }
        days.extend(nth_weekday(year, 2, Weekday::Mon, 3));
        days.extend(easter_sunday(year).map(|d| d - Duration::days(2)));
        days.extend(last_weekday(year, 5, Weekday::Mon));
        if year >= 2022 {
            days.extend(observed(year, 6, 19));
        }
        days.extend(observed(year, 7, 4));
        days.extend(nth_weekday(year, 9, Weekday::Mon, 1));
        days.extend(thanksgiving(year));
        days.extend(observed(year, 12, 25));

        days.extend(
            SPECIAL_CLOSURES
                .iter()
                .filter(|(y, _, _)| *y == year)
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        );

        days.sort();
        days
    }

    /// True when the session ends at 13:00 New York time.
    pub fn is_early_close(date: NaiveDate) -> bool {
        let weekday = date.weekday();
        let mon_to_thu = weekday.num_days_from_monday() <= Weekday::Thu.num_days_from_monday();

        match (date.month(), date.day()) {
            (7, 3) | (12, 24) => mon_to_thu,
            _ => thanksgiving(date.year()).map(|t| t + Duration::days(1)) == Some(date),
        }
    }

    fn session(date: NaiveDate) -> Option<Session> {
        let early_close = Self::is_early_close(date);
        let close_hour = if early_close { 13 } else { 16 };

        Some(Session {
            date,
            market_open: new_york_instant(date, NaiveTime::from_hms_opt(9, 30, 0)?)?,
            market_close: new_york_instant(date, NaiveTime::from_hms_opt(close_hour, 0, 0)?)?,
            early_close,
        })
    }
}

impl TradingCalendar for NyseCalendar {
    fn name(&self) -> &str {
        "NYSE"
    }

    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, Session> {
        let mut sessions = BTreeMap::new();
        if start > end {
            return sessions;
        }

        let holidays: Vec<NaiveDate> = (start.year()..=end.year())
            .flat_map(Self::holidays)
            .collect();

        for date in start.iter_days().take_while(|d| *d <= end) {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            if holidays.contains(&date) {
                continue;
            }
            if let Some(session) = Self::session(date) {
                sessions.insert(date, session);
            }
        }

        sessions
    }
}

fn new_york_instant(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    New_York
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fixed-date holiday: Saturday is observed on Friday, Sunday on Monday.
fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    })
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(i64::from(back)))
}

fn thanksgiving(year: i32) -> Option<NaiveDate> {
    nth_weekday(year, 11, Weekday::Thu, 4)
}

/// Gregorian Easter Sunday (anonymous algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
