//! Ledger Protocol Data Types
//!
//! This module defines the typed requests produced by the parser and the
//! replies written back to clients.
//!
//! ## Protocol Format
//!
//! Requests are single comma-separated lines. The first field names the
//! user, the second the action, the rest are action arguments:
//!
//! ```text
//! alice,add,50.0,2023-10-27,expense,Lunch,Sandwich
//! alice,list
//! ```
//!
//! Replies are single `~`-separated lines:
//!
//! ```text
//! action~success~message~entries
//! ```
//!
//! - `success` is `1`, `0`, or `null`
//! - `message` is `null` when absent, with any `~` escaped as `\~`
//! - `entries` is `null` when absent or empty, otherwise entries joined by `|`

use crate::ledger::{Entry, SearchCriteria};
use std::fmt;

/// Separator between request fields
pub const REQUEST_SEPARATOR: char = ',';

/// Separator between reply fields
pub const REPLY_SEPARATOR: char = '~';

/// Separator between entries in a reply
pub const ENTRY_SEPARATOR: char = '|';

/// Literal used for absent reply fields
pub const NULL: &str = "null";

/// Action name used when a request cannot be attributed to an action
pub const UNKNOWN_ACTION: &str = "unknown";

/// The closed set of actions a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Register,
    Login,
    Search,
    List,
    Clear,
    Delete,
}

impl Action {
    /// Every action, in protocol documentation order.
    pub const ALL: [Action; 7] = [
        Action::Add,
        Action::Register,
        Action::Login,
        Action::Search,
        Action::List,
        Action::Clear,
        Action::Delete,
    ];

    /// Looks up an action by its exact wire keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == keyword)
    }

    /// The wire keyword for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Register => "register",
            Action::Login => "login",
            Action::Search => "search",
            Action::List => "list",
            Action::Clear => "clear",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated client request.
///
/// Each value is built by the parser and consumed by exactly one storage
/// call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Record a new entry (its `id` is unset)
    Add(Entry),
    Register { username: String, password: String },
    Login { username: String, password: String },
    Search(SearchCriteria),
    List { username: String },
    Clear { username: String },
    Delete { username: String, entry_id: i64 },
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Request::Add(_) => Action::Add,
            Request::Register { .. } => Action::Register,
            Request::Login { .. } => Action::Login,
            Request::Search(_) => Action::Search,
            Request::List { .. } => Action::List,
            Request::Clear { .. } => Action::Clear,
            Request::Delete { .. } => Action::Delete,
        }
    }

    /// The user the request acts for.
    pub fn username(&self) -> &str {
        match self {
            Request::Add(entry) => &entry.username,
            Request::Search(criteria) => &criteria.username,
            Request::Register { username, .. }
            | Request::Login { username, .. }
            | Request::List { username }
            | Request::Clear { username }
            | Request::Delete { username, .. } => username,
        }
    }
}

/// The outcome of one request, ready to be encoded as a reply line.
///
/// Exactly one of `message` and `entries` carries the payload, depending
/// on the action. `success` is `None` only for replies that carry no
/// verdict; the dispatcher itself always sets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub action: &'static str,
    pub success: Option<bool>,
    pub message: Option<String>,
    pub entries: Option<Vec<Entry>>,
}

impl Reply {
    /// A bare success: `action~1~null~null`.
    pub fn success(action: Action) -> Self {
        Self {
            action: action.as_str(),
            success: Some(true),
            message: None,
            entries: None,
        }
    }

    /// A failure with an explanatory message.
    pub fn failure(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            success: Some(false),
            message: Some(message.into()),
            entries: None,
        }
    }

    /// A verdict with a message attached.
    pub fn with_message(action: Action, success: bool, message: impl Into<String>) -> Self {
        Self {
            action: action.as_str(),
            success: Some(success),
            message: Some(message.into()),
            entries: None,
        }
    }

    /// A successful data-returning reply.
    pub fn entries(action: Action, entries: Vec<Entry>) -> Self {
        Self {
            action: action.as_str(),
            success: Some(true),
            message: None,
            entries: Some(entries),
        }
    }

    /// Returns true if the reply reports success.
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// Serializes the reply into its wire line, without the trailing newline.
    pub fn serialize(&self) -> String {
        let mut buf = String::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut String) {
        use std::fmt::Write;

        buf.push_str(self.action);
        buf.push(REPLY_SEPARATOR);

        buf.push_str(match self.success {
            Some(true) => "1",
            Some(false) => "0",
            None => NULL,
        });
        buf.push(REPLY_SEPARATOR);

        match &self.message {
            Some(message) => buf.push_str(&escape_message(message)),
            None => buf.push_str(NULL),
        }
        buf.push(REPLY_SEPARATOR);

        match &self.entries {
            Some(entries) if !entries.is_empty() => {
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        buf.push(ENTRY_SEPARATOR);
                    }
                    // Writing to a String cannot fail
                    let _ = write!(buf, "{}", entry);
                }
            }
            _ => buf.push_str(NULL),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Escapes the reply separator inside a message.
fn escape_message(message: &str) -> String {
    message.replace(REPLY_SEPARATOR, "\\~")
}
