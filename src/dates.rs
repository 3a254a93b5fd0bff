//! Date handling for the "Date Posted" column.
//!
//! Postings arrive with heterogeneous dates: ISO timestamps from Greenhouse
//! and Adzuna, epoch milliseconds from Lever, relative ages (`2d`, `1w`) and
//! month-day strings (`Oct 17`) from GitHub listings. Everything is rendered
//! as `MM/DD/YYYY`; anything unparseable is passed through unchanged, and an
//! empty value becomes `N/A`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Display format used in the README table.
pub const DISPLAY_FORMAT: &str = "%m/%d/%Y";

/// Placeholder for postings without a usable date.
pub const NOT_AVAILABLE: &str = "N/A";

static RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*(mo|[dDwWhHmM])\b").unwrap());

/// Render a raw date value as `MM/DD/YYYY` relative to `now`.
///
/// Accepted inputs, in priority order:
/// - already formatted `MM/DD/YYYY` (returned unchanged)
/// - ISO date or timestamp (`2025-10-17`, `2025-10-17T12:00:00Z`)
/// - epoch milliseconds (`1760700000000`)
/// - relative age: `Nd`, `Nw`, `Nh`, `Nm`/`Nmo` (months approximated as 30 days)
/// - month-day (`Oct 17`, `October 17`, `10/17`) in the year of `now`
pub fn format_date_posted(raw: &str, now: NaiveDateTime) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return NOT_AVAILABLE.to_string();
    }

    if NaiveDate::parse_from_str(raw, DISPLAY_FORMAT).is_ok() {
        return raw.to_string();
    }

    if let Some(date) = parse_iso_prefix(raw) {
        return date.format(DISPLAY_FORMAT).to_string();
    }

    if let Some(date) = parse_epoch_millis(raw) {
        return date.format(DISPLAY_FORMAT).to_string();
    }

    if let Some(date) = parse_relative(raw, now) {
        return date.format(DISPLAY_FORMAT).to_string();
    }

    if let Some(date) = parse_month_day(raw, now) {
        return date.format(DISPLAY_FORMAT).to_string();
    }

    raw.to_string()
}

/// Parse the `YYYY-MM-DD` prefix of an ISO date or timestamp.
fn parse_iso_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Lever reports `createdAt` as milliseconds since the Unix epoch.
fn parse_epoch_millis(raw: &str) -> Option<NaiveDate> {
    if raw.len() < 10 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = raw.parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

fn parse_relative(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = RELATIVE.captures(raw)?;
    let n: i64 = caps[1].parse().ok()?;
    let delta = match caps[2].to_lowercase().as_str() {
        "d" => Duration::try_days(n)?,
        "w" => Duration::try_weeks(n)?,
        "h" => Duration::try_hours(n)?,
        "m" | "mo" => Duration::try_days(n.checked_mul(30)?)?,
        _ => return None,
    };
    now.checked_sub_signed(delta)
}

fn parse_month_day(raw: &str, now: NaiveDateTime) -> Option<NaiveDate> {
    let year = now.year();
    ["%b %d %Y", "%B %d %Y", "%m/%d %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&format!("{raw} {year}"), fmt).ok())
}

/// Sort key for a rendered date: parseable `MM/DD/YYYY` values order
/// naturally, everything else (including `N/A`) sinks to 1900-01-01.
pub fn sort_key(display: &str) -> NaiveDate {
    NaiveDate::parse_from_str(display.trim(), DISPLAY_FORMAT)
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN))
}
