
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};


/// This is the standard way of converting a date to a string in keytally. The same form is used
/// for history keys in the persisted state and for display.
pub fn date_to_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}
