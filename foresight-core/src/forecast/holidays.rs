//! US holiday calendar construction for forecast models.
//!
//! Builds the holiday effect windows a seasonal model conditions on:
//! federal holidays with their observed dates, Good Fridays (markets
//! close although the day is not a federal holiday), and one-off market
//! shock windows.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// A holiday or market event with an effect window around it.
///
/// `lower_window` extends the effect `lower_window` days before the
/// date (non-positive), `upper_window` days after (non-negative).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub date: NaiveDate,
    pub lower_window: i32,
    pub upper_window: i32,
}

impl Holiday {
    fn observed(name: &str, date: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            date,
            lower_window: 0,
            upper_window: 1,
        }
    }
}

/// A one-off market event window, e.g. a crash or circuit-breaker period.
pub fn market_shock(name: &str, date: NaiveDate, lower_window: i32, upper_window: i32) -> Holiday {
    Holiday {
        name: name.to_string(),
        date,
        lower_window,
        upper_window,
    }
}

/// US federal holidays for the given years, shifted to their observed
/// dates (Saturday observed Friday, Sunday observed Monday). Juneteenth
/// appears from 2021 onward.
pub fn us_federal_holidays(years: RangeInclusive<i32>) -> Vec<Holiday> {
    let mut holidays = Vec::new();

    for year in years {
        holidays.push(Holiday::observed(
            "New Year's Day",
            nearest_workday(ymd(year, 1, 1)),
        ));
        holidays.push(Holiday::observed(
            "Martin Luther King Jr. Day",
            nth_weekday_of_month(year, 1, Weekday::Mon, 3),
        ));
        holidays.push(Holiday::observed(
            "Presidents Day",
            nth_weekday_of_month(year, 2, Weekday::Mon, 3),
        ));
        holidays.push(Holiday::observed(
            "Memorial Day",
            last_weekday_of_month(year, 5, Weekday::Mon),
        ));
        if year >= 2021 {
            holidays.push(Holiday::observed(
                "Juneteenth",
                nearest_workday(ymd(year, 6, 19)),
            ));
        }
        holidays.push(Holiday::observed(
            "Independence Day",
            nearest_workday(ymd(year, 7, 4)),
        ));
        holidays.push(Holiday::observed(
            "Labor Day",
            nth_weekday_of_month(year, 9, Weekday::Mon, 1),
        ));
        holidays.push(Holiday::observed(
            "Columbus Day",
            nth_weekday_of_month(year, 10, Weekday::Mon, 2),
        ));
        holidays.push(Holiday::observed(
            "Veterans Day",
            nearest_workday(ymd(year, 11, 11)),
        ));
        holidays.push(Holiday::observed(
            "Thanksgiving",
            nth_weekday_of_month(year, 11, Weekday::Thu, 4),
        ));
        holidays.push(Holiday::observed(
            "Christmas Day",
            nearest_workday(ymd(year, 12, 25)),
        ));
    }

    holidays
}

/// Good Fridays for the given years. NYSE closes although the day is
/// not a federal holiday.
pub fn good_fridays(years: RangeInclusive<i32>) -> Vec<Holiday> {
    years
        .map(|year| Holiday::observed("Good Friday", easter_sunday(year) - chrono::Duration::days(2)))
        .collect()
}

/// Easter Sunday via the anonymous Gregorian computus (Meeus/Jones/Butcher).
pub fn easter_sunday(year: i32) -> NaiveDate {
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

    ymd(year, month as u32, day as u32)
}

/// The default calendar: federal holidays 2018-2024, Good Fridays
/// 2017-2023, and the COVID crash window around 2020-03-15.
pub fn default_calendar() -> Vec<Holiday> {
    let mut calendar = us_federal_holidays(2018..=2024);
    calendar.extend(good_fridays(2017..=2023));
    calendar.push(market_shock("COVID-19 crash", ymd(2020, 3, 15), -15, 15));
    calendar
}

// ─── Date helpers ───────────────────────────────────────────────────

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Shift a fixed-date holiday to its observed weekday.
fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - chrono::Duration::days(1),
        Weekday::Sun => date + chrono::Duration::days(1),
        _ => date,
    }
}

/// The n-th given weekday of a month (n starting at 1).
fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = ymd(year, month, 1);
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    first + chrono::Duration::days((offset + 7 * (n - 1)) as i64)
}

/// The last given weekday of a month.
fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month = if month == 12 {
        ymd(year + 1, 1, 1)
    } else {
        ymd(year, month + 1, 1)
    };
    let mut date = next_month - chrono::Duration::days(1);
    while date.weekday() != weekday {
        date -= chrono::Duration::days(1);
    }
    date
}
