//! Request Line Parser
//!
//! Turns one raw request line into a typed [`Request`].
//!
//! ## How the Parser Works
//!
//! 1. Blank input is rejected as an empty request.
//! 2. The line is split on `,` keeping trailing empty fields, so
//!    `alice,search,,,income,,` has seven fields.
//! 3. Field 0 is the username and field 1 the action, both trimmed.
//! 4. The remaining fields are interpreted per action.
//!
//! Parsing never touches storage. Every rejection is a [`ParseError`]
//! whose display text is the message sent back to the client.

use crate::ledger::{parse_amount, Entry, EntryType, SearchCriteria};
use crate::protocol::types::{Action, Request, REQUEST_SEPARATOR, UNKNOWN_ACTION};
use thiserror::Error;

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line is empty or only whitespace
    #[error("empty request")]
    EmptyRequest,

    /// The line has no action field
    #[error("malformed request")]
    Malformed,

    /// The action keyword is not recognised
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The username field is blank
    #[error("missing username")]
    MissingUsername(Action),

    /// Fewer fields than the action requires
    #[error("insufficient arguments")]
    InsufficientArguments(Action),

    /// The add amount is not a number
    #[error("invalid amount")]
    InvalidAmount,

    /// Delete without an id field
    #[error("missing record id")]
    MissingRecordId,

    /// The delete id is not an integer
    #[error("invalid record id")]
    InvalidRecordId,
}

impl ParseError {
    /// The action name reported alongside this error.
    pub fn action(&self) -> &'static str {
        match self {
            ParseError::EmptyRequest | ParseError::Malformed | ParseError::UnknownAction(_) => {
                UNKNOWN_ACTION
            }
            ParseError::MissingUsername(action) | ParseError::InsufficientArguments(action) => {
                action.as_str()
            }
            ParseError::InvalidAmount => Action::Add.as_str(),
            ParseError::MissingRecordId | ParseError::InvalidRecordId => Action::Delete.as_str(),
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Minimum field counts, including username and action.
const ADD_MIN_FIELDS: usize = 4;
const CREDENTIAL_MIN_FIELDS: usize = 3;
const DELETE_MIN_FIELDS: usize = 3;

/// Number of fields after amount and date that selects the typed add shape.
const TYPED_ADD_TAIL: usize = 3;

/// Optional arguments of an `add` request that follow the amount and date.
///
/// Two shapes are accepted:
///
/// ```text
/// amount,date,type,subject,note      (typed)
/// amount,date[,subject[,note]]       (untyped, type defaults to expense)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct AddFields<'a> {
    entry_type: Option<&'a str>,
    subject: &'a str,
    note: &'a str,
}

impl<'a> AddFields<'a> {
    fn from_tail(tail: &[&'a str]) -> Self {
        if tail.len() >= TYPED_ADD_TAIL {
            Self {
                entry_type: Some(tail[0]),
                subject: tail[1],
                note: tail[2],
            }
        } else {
            Self {
                entry_type: None,
                subject: tail.first().copied().unwrap_or_default(),
                note: tail.get(1).copied().unwrap_or_default(),
            }
        }
    }

    fn entry_type(&self) -> EntryType {
        self.entry_type.map(EntryType::normalize).unwrap_or_default()
    }
}

/// Parses a raw request line.
///
/// # Example
///
/// ```
/// use ledgerline::protocol::{parse_request, Request};
///
/// let request = parse_request("alice,list").unwrap();
/// assert_eq!(request, Request::List { username: "alice".to_string() });
/// ```
pub fn parse_request(line: &str) -> ParseResult<Request> {
    if line.trim().is_empty() {
        return Err(ParseError::EmptyRequest);
    }

    let fields: Vec<&str> = line.split(REQUEST_SEPARATOR).collect();
    if fields.len() < 2 {
        return Err(ParseError::Malformed);
    }

    let username = fields[0].trim();
    let keyword = fields[1].trim();

    let action = Action::from_keyword(keyword)
        .ok_or_else(|| ParseError::UnknownAction(keyword.to_string()))?;

    if username.is_empty() {
        return Err(ParseError::MissingUsername(action));
    }

    match action {
        Action::Add => parse_add(username, &fields),
        Action::Register => {
            let password = credential(action, &fields)?;
            Ok(Request::Register {
                username: username.to_string(),
                password,
            })
        }
        Action::Login => {
            let password = credential(action, &fields)?;
            Ok(Request::Login {
                username: username.to_string(),
                password,
            })
        }
        Action::Search => Ok(parse_search(username, &fields)),
        Action::List => Ok(Request::List {
            username: username.to_string(),
        }),
        Action::Clear => Ok(Request::Clear {
            username: username.to_string(),
        }),
        Action::Delete => parse_delete(username, &fields),
    }
}

/// `username,add,amount,date[,...]`
fn parse_add(username: &str, fields: &[&str]) -> ParseResult<Request> {
    if fields.len() < ADD_MIN_FIELDS {
        return Err(ParseError::InsufficientArguments(Action::Add));
    }

    let amount = parse_amount(fields[2]).ok_or(ParseError::InvalidAmount)?;
    let date = fields[3];
    let extra = AddFields::from_tail(&fields[ADD_MIN_FIELDS..]);

    Ok(Request::Add(Entry::new(
        username,
        amount,
        extra.entry_type(),
        date,
        extra.subject,
        extra.note,
    )))
}

/// Password field shared by register and login. Submitted as-is.
fn credential(action: Action, fields: &[&str]) -> ParseResult<String> {
    if fields.len() < CREDENTIAL_MIN_FIELDS {
        return Err(ParseError::InsufficientArguments(action));
    }
    Ok(fields[2].to_string())
}

/// `username,search[,start[,end[,type[,min[,max]]]]]`
///
/// Every filter is optional and a field that does not parse is unset.
fn parse_search(username: &str, fields: &[&str]) -> Request {
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    Request::Search(
        SearchCriteria::for_user(username)
            .starting(field(2))
            .ending(field(3))
            .of_type(field(4))
            .amount_between(parse_amount(field(5)), parse_amount(field(6))),
    )
}

/// `username,delete,id`
fn parse_delete(username: &str, fields: &[&str]) -> ParseResult<Request> {
    if fields.len() < DELETE_MIN_FIELDS {
        return Err(ParseError::MissingRecordId);
    }

    let entry_id = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidRecordId)?;

    Ok(Request::Delete {
        username: username.to_string(),
        entry_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_empty_request() {
        assert_eq!(parse_request(""), Err(ParseError::EmptyRequest));
        assert_eq!(parse_request("   "), Err(ParseError::EmptyRequest));
        assert_eq!(ParseError::EmptyRequest.action(), "unknown");
    }

    #[test]
    fn test_malformed_request() {
        assert_eq!(parse_request("user"), Err(ParseError::Malformed));
    }

    #[test]
    fn test_unknown_action() {
        let err = parse_request("user,unknownAction,param").unwrap_err();
        assert_eq!(err, ParseError::UnknownAction("unknownAction".to_string()));
        assert_eq!(err.to_string(), "unknown action: unknownAction");
        assert_eq!(err.action(), "unknown");
    }

    #[test]
    fn test_username_and_action_trimmed() {
        let request = parse_request(" user ,  login  ,pass").unwrap();
        assert_eq!(
            request,
            Request::Login {
                username: "user".to_string(),
                password: "pass".to_string()
            }
        );
    }

    #[test]
    fn test_blank_username() {
        assert_eq!(
            parse_request(" ,list"),
            Err(ParseError::MissingUsername(Action::List))
        );
    }

    #[test]
    fn test_add_typed_shape() {
        let request = parse_request("alice,add,50.0,2023-10-27,income,Salary,October").unwrap();
        let Request::Add(entry) = request else {
            panic!("expected add request");
        };
        assert_eq!(entry.id, None);
        assert_eq!(entry.username, "alice");
        assert_eq!(entry.amount, dec("50.0"));
        assert_eq!(entry.entry_type, EntryType::Income);
        assert_eq!(entry.date, "2023-10-27");
        assert_eq!(entry.subject, "Salary");
        assert_eq!(entry.note, "October");
    }

    #[test]
    fn test_add_untyped_shapes() {
        let Request::Add(entry) = parse_request("alice,add,12,2023-10-27,Coffee,Flat white").unwrap()
        else {
            panic!("expected add request");
        };
        assert_eq!(entry.entry_type, EntryType::Expense);
        assert_eq!(entry.subject, "Coffee");
        assert_eq!(entry.note, "Flat white");

        let Request::Add(entry) = parse_request("alice,add,12,2023-10-27,Coffee").unwrap() else {
            panic!("expected add request");
        };
        assert_eq!(entry.subject, "Coffee");
        assert_eq!(entry.note, "");

        let Request::Add(entry) = parse_request("alice,add,12,2023-10-27").unwrap() else {
            panic!("expected add request");
        };
        assert_eq!(entry.subject, "");
        assert_eq!(entry.note, "");
    }

    #[test]
    fn test_add_unrecognized_type_is_expense() {
        let Request::Add(entry) = parse_request("alice,add,5,2023-10-27,gift,,").unwrap() else {
            panic!("expected add request");
        };
        assert_eq!(entry.entry_type, EntryType::Expense);
    }

    #[test]
    fn test_add_insufficient_arguments() {
        let err = parse_request("user,add,100").unwrap_err();
        assert_eq!(err, ParseError::InsufficientArguments(Action::Add));
        assert_eq!(err.to_string(), "insufficient arguments");
        assert_eq!(err.action(), "add");
    }

    #[test]
    fn test_add_invalid_amount() {
        let err = parse_request("user,add,not_a_number,2023-01-01").unwrap_err();
        assert_eq!(err, ParseError::InvalidAmount);
        assert_eq!(err.action(), "add");

        assert_eq!(
            parse_request("alice,add,1_000,2023-01-01"),
            Err(ParseError::InvalidAmount)
        );
    }

    #[test]
    fn test_credentials_required() {
        assert_eq!(
            parse_request("user,register"),
            Err(ParseError::InsufficientArguments(Action::Register))
        );
        assert_eq!(
            parse_request("user,login"),
            Err(ParseError::InsufficientArguments(Action::Login))
        );
    }

    #[test]
    fn test_password_kept_verbatim() {
        let request = parse_request("user,register, secret ").unwrap();
        assert_eq!(
            request,
            Request::Register {
                username: "user".to_string(),
                password: " secret ".to_string()
            }
        );
    }

    #[test]
    fn test_search_all_filters() {
        let request = parse_request("user,search,2023-01-01,2023-12-31,expense,0,1000").unwrap();
        let Request::Search(criteria) = request else {
            panic!("expected search request");
        };
        assert_eq!(criteria.username, "user");
        assert_eq!(criteria.start_date.as_deref(), Some("2023-01-01"));
        assert_eq!(criteria.end_date.as_deref(), Some("2023-12-31"));
        assert_eq!(criteria.entry_type, Some(EntryType::Expense));
        assert_eq!(criteria.min_amount, Some(dec("0")));
        assert_eq!(criteria.max_amount, Some(dec("1000")));
    }

    #[test]
    fn test_search_without_filters() {
        let request = parse_request("user,search").unwrap();
        assert_eq!(request, Request::Search(SearchCriteria::for_user("user")));
    }

    #[test]
    fn test_search_unparsable_filters_are_unset() {
        let Request::Search(criteria) = parse_request("user,search,,,income,abc,").unwrap() else {
            panic!("expected search request");
        };
        assert_eq!(criteria.start_date, None);
        assert_eq!(criteria.end_date, None);
        assert_eq!(criteria.entry_type, Some(EntryType::Income));
        assert_eq!(criteria.min_amount, None);
        assert_eq!(criteria.max_amount, None);
    }

    #[test]
    fn test_list_and_clear() {
        assert_eq!(
            parse_request("user,list"),
            Ok(Request::List {
                username: "user".to_string()
            })
        );
        assert_eq!(
            parse_request("user,clear,ignored"),
            Ok(Request::Clear {
                username: "user".to_string()
            })
        );
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            parse_request("user,delete,123"),
            Ok(Request::Delete {
                username: "user".to_string(),
                entry_id: 123
            })
        );
    }

    #[test]
    fn test_delete_invalid_id() {
        let err = parse_request("bob,delete,abc").unwrap_err();
        assert_eq!(err, ParseError::InvalidRecordId);
        assert_eq!(err.to_string(), "invalid record id");
        assert_eq!(err.action(), "delete");
    }

    #[test]
    fn test_delete_missing_id() {
        let err = parse_request("user,delete").unwrap_err();
        assert_eq!(err, ParseError::MissingRecordId);
        assert_eq!(err.action(), "delete");
    }
}
