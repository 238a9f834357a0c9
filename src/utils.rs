use std::str::FromStr;

use rand::{Rng, distributions::Alphanumeric};

use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_money(amount: f64) -> String {
  format!("{amount:.2}")
}

/// Uniform string over `[A-Za-z0-9]`.
pub fn random_alnum(len: usize) -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(len)
    .map(char::from)
    .collect()
}

/// Zero-pads `number` to at least `width` digits.
pub fn pad_number(number: i64, width: usize) -> String {
  format!("{number:0width$}")
}

/// Lenient form-field parsing: surrounding whitespace is ignored and
/// anything unparseable falls back to `default`.
pub fn parse_or<T: FromStr>(raw: &str, default: T) -> T {
  raw.trim().parse().unwrap_or(default)
}

pub fn to_millis(date: DateTime) -> i64 {
  date.and_utc().timestamp_millis()
}

pub fn from_millis(millis: i64) -> Option<DateTime> {
  chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Parses the timestamp shapes a Postgres REST layer emits: RFC 3339 with an
/// offset, or a bare `timestamp` without one.
pub fn parse_timestamp(raw: &str) -> Option<DateTime> {
  if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
    return Some(dt.naive_utc());
  }
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
}

pub fn now() -> DateTime {
  Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn random_alnum_alphabet() {
    let key = random_alnum(16);
    assert_eq!(key.len(), 16);
    assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
  }

  #[test]
  fn pad_number_widths() {
    assert_eq!(pad_number(7, 3), "007");
    assert_eq!(pad_number(7, 0), "7");
    assert_eq!(pad_number(1234, 2), "1234");
  }

  #[test]
  fn parse_or_is_lenient() {
    assert_eq!(parse_or(" 12 ", 0), 12);
    assert_eq!(parse_or("abc", 1), 1);
    assert_eq!(parse_or("", 0.0), 0.0);
    assert_eq!(parse_or("10.5", 0.0), 10.5);
  }

  #[test]
  fn timestamps() {
    let a = parse_timestamp("2026-03-01T10:00:00+00:00").unwrap();
    let b = parse_timestamp("2026-03-01T10:00:00.250").unwrap();
    let c = parse_timestamp("2026-03-01T12:00:00+02:00").unwrap();
    assert_eq!(a, c);
    assert_eq!((b - a).num_milliseconds(), 250);
    assert!(parse_timestamp("yesterday").is_none());

    assert_eq!(from_millis(to_millis(a)), Some(a));
  }

  #[test]
  fn money() {
    assert_eq!(format_money(50.0), "50.00");
    assert_eq!(format_money(2.5), "2.50");
  }
}
