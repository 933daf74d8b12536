//! Ledger Entries
//!
//! An [`Entry`] is one income or expense record owned by a username.
//! Entries carry an `id` only once the store has assigned one.
//!
//! ## Wire Format
//!
//! ```text
//! id,username,amount,type,date,subject,note
//! ```
//!
//! An unassigned id renders as `null`. Amounts keep their exact decimal
//! digits and always show a fractional part (`50` renders as `50.0`).

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Whether an entry adds to or draws from the balance.
///
/// Construction always goes through [`EntryType::normalize`], so anything
/// that is not recognisably `income` becomes `Expense`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryType {
    Income,
    #[default]
    Expense,
}

impl EntryType {
    /// Normalizes a raw type field. Matching ignores case and surrounding
    /// whitespace; blank or unrecognized values become `Expense`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim() {
            s if s.eq_ignore_ascii_case("income") => EntryType::Income,
            _ => EntryType::Expense,
        }
    }

    /// The canonical lowercase name, as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Assigned by the store; `None` until persisted
    pub id: Option<i64>,
    /// Owner of the entry
    pub username: String,
    /// Signed amount
    pub amount: Decimal,
    /// Normalized type
    pub entry_type: EntryType,
    /// Free-form date, usually `YYYY-MM-DD`
    pub date: String,
    pub subject: String,
    pub note: String,
}

impl Entry {
    /// Creates an entry that has not been persisted yet.
    pub fn new(
        username: impl Into<String>,
        amount: Decimal,
        entry_type: EntryType,
        date: impl Into<String>,
        subject: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            amount,
            entry_type,
            date: date.into(),
            subject: subject.into(),
            note: note.into(),
        }
    }

    /// Returns this entry with the store-assigned id attached.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{},", id)?,
            None => f.write_str("null,")?,
        }
        write!(
            f,
            "{},{},{},{},{},{}",
            self.username,
            format_amount(&self.amount),
            self.entry_type,
            self.date,
            self.subject,
            self.note
        )
    }
}

/// Parses a client-supplied amount.
///
/// Accepts plain (`-12.50`) and scientific (`1e3`) notation after trimming.
/// Returns `None` for anything else, including the empty string and digit
/// separators (`1_000`).
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() || s.contains('_') {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Renders an amount for the wire, forcing at least one fractional digit.
pub fn format_amount(amount: &Decimal) -> String {
    if amount.scale() == 0 {
        format!("{}.0", amount)
    } else {
        amount.to_string()
    }
}
