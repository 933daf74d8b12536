//! Ledger Domain Types
//!
//! The records a client stores and the filters it searches them with.
//!
//! - `entry`: [`Entry`] and the normalized [`EntryType`]
//! - `search`: [`SearchCriteria`] and date-key normalization

pub mod entry;
pub mod search;

pub use entry::{format_amount, parse_amount, Entry, EntryType};
pub use search::{date_key, SearchCriteria};
