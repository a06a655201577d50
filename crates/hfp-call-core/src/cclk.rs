//! Phone clock (`+CCLK`) parsing
//!
//! Phones answer the time query with `yy/MM/dd,hh:mm:ss`, some with a space
//! after the comma, some with a trailing timezone (`+32`) or quotes.

use chrono::{NaiveDate, NaiveDateTime};

fn two_digits(s: &str) -> Option<u32> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a raw `+CCLK` time string
pub fn parse_cclk(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_matches('"');
    let (date, time) = raw.split_once(',')?;

    let mut date_parts = date.trim().split('/');
    let year = two_digits(date_parts.next()?)?;
    let month = two_digits(date_parts.next()?)?;
    let day = two_digits(date_parts.next()?)?;
    if date_parts.next().is_some() {
        return None;
    }

    let time = time.trim_start();
    let time = time.get(..8)?;
    let mut time_parts = time.split(':');
    let hour = two_digits(time_parts.next()?)?;
    let minute = two_digits(time_parts.next()?)?;
    let second = two_digits(time_parts.next()?)?;

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)?.and_hms_opt(hour, minute, second)
}
