//! Search Criteria
//!
//! A search always targets one owner and may narrow the result with any
//! combination of inclusive date bounds, a type, and inclusive amount
//! bounds. Unset filters match everything.
//!
//! Dates are free-form on entries, so date bounds compare *date keys*: the
//! ISO `YYYY-MM-DD` form of a well-formed calendar date. An entry whose
//! date has no key can never satisfy a date bound.

use crate::ledger::entry::EntryType;
use rust_decimal::Decimal;
use time::{Date, Month};

/// Filters for a search request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    pub username: String,
    /// Inclusive lower date key
    pub start_date: Option<String>,
    /// Inclusive upper date key
    pub end_date: Option<String>,
    pub entry_type: Option<EntryType>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl SearchCriteria {
    /// Criteria matching every entry of `username`.
    pub fn for_user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Sets the lower date bound from a raw field. Fields without a date key
    /// leave the bound unset.
    pub fn starting(mut self, raw: &str) -> Self {
        self.start_date = date_key(raw);
        self
    }

    /// Sets the upper date bound from a raw field.
    pub fn ending(mut self, raw: &str) -> Self {
        self.end_date = date_key(raw);
        self
    }

    /// Sets the type filter. A blank field leaves it unset; anything else is
    /// normalized like an entry's type.
    pub fn of_type(mut self, raw: &str) -> Self {
        self.entry_type = if raw.trim().is_empty() {
            None
        } else {
            Some(EntryType::normalize(raw))
        };
        self
    }

    pub fn amount_between(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// True when a date bound is present.
    pub fn is_date_bounded(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}

/// Returns the ISO date key for a well-formed date, or `None`.
///
/// Accepts `YYYY-MM-DD` and `YYYY/MM/DD` with one- or two-digit month and
/// day, and only real calendar dates (`2023-02-30` has no key).
pub fn date_key(raw: &str) -> Option<String> {
    let s = raw.trim();
    let separator = if s.contains('-') { '-' } else { '/' };

    let mut parts = s.split(separator);
    let (year, month, day) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d), None) => (y, m, d),
        _ => return None,
    };

    if year.len() != 4 || !(1..=2).contains(&month.len()) || !(1..=2).contains(&day.len()) {
        return None;
    }
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(year) || !all_digits(month) || !all_digits(day) {
        return None;
    }

    let year: i32 = year.parse().ok()?;
    let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
    let day: u8 = day.parse().ok()?;
    let date = Date::from_calendar_date(year, month, day).ok()?;

    Some(format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    ))
}
