//! Literal & Time Resolution
//!
//! Turns literal text from a query into values:
//!
//! - string literals with backslash escapes
//! - absolute date-times (RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DD`)
//! - relative times (`now`, `<n> <unit> ago`) against an explicit `now`
//!
//! Months are a calendar decrement: `1 month ago` on March 31st lands on the
//! last day of February. Every other unit is a fixed duration.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::query::ast::{TimeExpr, TimeUnit};

/// Errors raised while resolving literals
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    /// `\x` where `x` is not a recognised escape character
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    /// Backslash as the last character of a literal
    #[error("string literal ends with a dangling backslash")]
    DanglingEscape,

    /// Text that is not a supported date-time format
    #[error("invalid date-time '{0}'")]
    InvalidDateTime(String),

    /// Relative time that falls outside the representable range
    #[error("'{amount} {unit} ago' is out of range")]
    OutOfRange { amount: u32, unit: TimeUnit },
}

/// Resolve backslash escapes in the body of a quoted string.
///
/// Recognised: `\\ \b \n \t \r \f \' \"`.
pub fn unescape(raw: &str) -> Result<String, LiteralError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let escaped = match chars.next() {
            Some('\\') => '\\',
            Some('b') => '\u{8}',
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some('\'') => '\'',
            Some('"') => '"',
            Some(other) => return Err(LiteralError::InvalidEscape(other)),
            None => return Err(LiteralError::DanglingEscape),
        };
        out.push(escaped);
    }

    Ok(out)
}

/// Parse an absolute date-time. Text without an offset is taken as UTC.
pub fn parse_absolute(text: &str) -> Result<DateTime<Utc>, LiteralError> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| LiteralError::InvalidDateTime(text.to_string()))
}

/// Resolve a time expression relative to `now`
pub fn resolve_time(expr: &TimeExpr, now: DateTime<Utc>) -> Result<DateTime<Utc>, LiteralError> {
    match *expr {
        TimeExpr::Now => Ok(now),
        TimeExpr::Absolute(dt) => Ok(dt),
        TimeExpr::Ago { amount, unit } => {
            let out_of_range = || LiteralError::OutOfRange { amount, unit };
            match unit {
                TimeUnit::Month => now
                    .checked_sub_months(Months::new(amount))
                    .ok_or_else(out_of_range),
                _ => now
                    .checked_sub_signed(fixed_duration(amount, unit))
                    .ok_or_else(out_of_range),
            }
        }
    }
}

fn fixed_duration(amount: u32, unit: TimeUnit) -> Duration {
    let amount = i64::from(amount);
    match unit {
        TimeUnit::Second => Duration::seconds(amount),
        TimeUnit::Minute => Duration::minutes(amount),
        TimeUnit::Hour => Duration::hours(amount),
        TimeUnit::Day => Duration::days(amount),
        TimeUnit::Week => Duration::weeks(amount),
        // Handled by the calendar path in resolve_time
        TimeUnit::Month => Duration::zero(),
    }
}
