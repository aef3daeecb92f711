use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};

use crate::core::domain::sheets::WEEK_PREFIX;

/// Milliseconds from midnight to the last represented instant of a day.
const END_OF_DAY_MS: i64 = 86_399_999;

/// Text form of the `week_ending` tag, e.g. `2024-03-17 23:59:59.999`.
pub const WEEK_ENDING_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Returns the last millisecond of the Sunday on or after `ts`.
///
/// A timestamp that falls on a Sunday belongs to the week ending that same
/// Sunday. Time of day never moves a timestamp to another week.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use veloverify::time::week_ending_sunday;
///
/// let wednesday = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// let end = week_ending_sunday(wednesday);
/// assert_eq!(end.to_string(), "2024-03-17 23:59:59.999");
/// ```
pub fn week_ending_sunday(ts: NaiveDateTime) -> NaiveDateTime {
    let date = ts.date();
    let days_until_sunday = (7 - date.weekday().num_days_from_sunday()) % 7;
    let sunday = date + Duration::days(i64::from(days_until_sunday));
    sunday.and_time(NaiveTime::MIN) + Duration::milliseconds(END_OF_DAY_MS)
}

pub fn format_week_ending(week_end: &NaiveDateTime) -> String {
    week_end.format(WEEK_ENDING_FORMAT).to_string()
}

/// Sheet name of the cohort ending at `week_end`, e.g. `Week_Ending_2024-03-17`.
pub fn cohort_name(week_end: &NaiveDateTime) -> String {
    format!("{}{}", WEEK_PREFIX, week_end.format("%Y-%m-%d"))
}
