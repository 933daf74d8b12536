//! Command Handler Module
//!
//! This module implements the ledger actions. It parses each request line,
//! validates it, runs the matching storage operation, and turns the outcome
//! into a [`Reply`].
//!
//! ## Supported Actions
//!
//! - `user,add,amount,date[,type,subject,note | ,subject[,note]]` - Record an entry
//! - `user,register,password` - Create a credential
//! - `user,login,password` - Check a credential
//! - `user,search[,start[,end[,type[,min[,max]]]]]` - Filter entries
//! - `user,list` - All entries of a user
//! - `user,clear` - Delete all entries of a user
//! - `user,delete,id` - Delete one entry of a user
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  dispatch() │───>│  cmd_*()    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                         LedgerStore         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Replies
//!
//! `execute` never fails. Bad input becomes the parser's message, expected
//! negative outcomes get their own message, a storage fault becomes
//! `storage error: ...`, and a panic inside an action becomes
//! `processing error: ...`. The action name is kept in every case.

use crate::ledger::{Entry, SearchCriteria};
use crate::protocol::{parse_request, Action, Reply, Request};
use crate::storage::{LedgerStore, StorageError, StorageResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Message for a registration whose username is taken
pub const MSG_USERNAME_TAKEN: &str = "username already exists";

/// Message for a login whose username has no credential
pub const MSG_USERNAME_NOT_FOUND: &str = "username not found";

/// Message for a login whose password does not match
pub const MSG_INCORRECT_PASSWORD: &str = "incorrect password";

/// Message for a delete that removed a row
pub const MSG_DELETE_SUCCESSFUL: &str = "delete successful";

/// Message for a delete that matched no row of the user
pub const MSG_RECORD_NOT_FOUND: &str = "record not found";

/// Executes ledger requests against a store.
///
/// Cheap to clone; every clone shares the same store.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<dyn LedgerStore>,
}

impl CommandHandler {
    /// Creates a new command handler over the given store.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Executes one request line and returns the reply.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ledgerline::commands::CommandHandler;
    /// use ledgerline::storage::{StorageConfig, StorageEngine};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new(StorageConfig::new("ledger.db")));
    /// engine.initialize().unwrap();
    ///
    /// let handler = CommandHandler::new(engine);
    /// let reply = handler.execute("bob,delete,abc");
    /// assert_eq!(reply.serialize(), "delete~0~invalid record id~null");
    /// ```
    pub fn execute(&self, line: &str) -> Reply {
        let request = match parse_request(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(action = e.action(), error = %e, "Rejected request");
                return Reply::failure(e.action(), e.to_string());
            }
        };

        let action = request.action();
        debug!(action = %action, user = request.username(), "Dispatching request");

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(request))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(action = %action, error = %e, "Storage fault");
                Reply::failure(action.as_str(), storage_failure(&e))
            }
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                error!(action = %action, detail = %detail, "Request handler panicked");
                Reply::failure(action.as_str(), processing_failure(&detail))
            }
        }
    }

    /// Dispatches a request to its action.
    fn dispatch(&self, request: Request) -> StorageResult<Reply> {
        match request {
            Request::Add(entry) => self.cmd_add(&entry),
            Request::Register { username, password } => self.cmd_register(&username, &password),
            Request::Login { username, password } => self.cmd_login(&username, &password),
            Request::Search(criteria) => self.cmd_search(&criteria),
            Request::List { username } => self.cmd_list(&username),
            Request::Clear { username } => self.cmd_clear(&username),
            Request::Delete { username, entry_id } => self.cmd_delete(&username, entry_id),
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// add: the store assigns the id; the reply carries no payload.
    fn cmd_add(&self, entry: &Entry) -> StorageResult<Reply> {
        let id = self.store.add(entry)?;
        debug!(user = %entry.username, id, "Entry added");
        Ok(Reply::success(Action::Add))
    }

    fn cmd_register(&self, username: &str, password: &str) -> StorageResult<Reply> {
        if self.store.register(username, password)? {
            Ok(Reply::success(Action::Register))
        } else {
            Ok(Reply::failure(Action::Register.as_str(), MSG_USERNAME_TAKEN))
        }
    }

    /// login: existence is checked before any password comparison so the
    /// two failures stay distinguishable. This reveals whether a username
    /// is registered.
    fn cmd_login(&self, username: &str, password: &str) -> StorageResult<Reply> {
        if !self.store.user_exists(username)? {
            return Ok(Reply::failure(Action::Login.as_str(), MSG_USERNAME_NOT_FOUND));
        }

        if self.store.login(username, password)? {
            Ok(Reply::success(Action::Login))
        } else {
            Ok(Reply::failure(Action::Login.as_str(), MSG_INCORRECT_PASSWORD))
        }
    }

    /// search: no matches is still a success.
    fn cmd_search(&self, criteria: &SearchCriteria) -> StorageResult<Reply> {
        let entries = self.store.search(criteria)?;
        Ok(Reply::entries(Action::Search, entries))
    }

    fn cmd_list(&self, username: &str) -> StorageResult<Reply> {
        let entries = self.store.list(username)?;
        Ok(Reply::entries(Action::List, entries))
    }

    /// clear: the message is the number of entries removed.
    fn cmd_clear(&self, username: &str) -> StorageResult<Reply> {
        let removed = self.store.clear(username)?;
        Ok(Reply::with_message(Action::Clear, true, removed.to_string()))
    }

    fn cmd_delete(&self, username: &str, entry_id: i64) -> StorageResult<Reply> {
        if self.store.delete(username, entry_id)? {
            Ok(Reply::with_message(Action::Delete, true, MSG_DELETE_SUCCESSFUL))
        } else {
            Ok(Reply::with_message(Action::Delete, false, MSG_RECORD_NOT_FOUND))
        }
    }
}

/// Reply text for a storage fault. Kept on one line so the reply stays a
/// single protocol line.
fn storage_failure(e: &StorageError) -> String {
    format!("storage error: {}", single_line(&e.to_string()))
}

fn processing_failure(detail: &str) -> String {
    format!("processing error: {}", single_line(detail))
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Extracts a readable message from a panic payload.
fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected failure".to_string()
    }
}
