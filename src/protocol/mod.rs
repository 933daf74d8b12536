//! Ledger Line Protocol
//!
//! This module implements the comma-delimited request protocol and the
//! `~`-delimited reply format.
//!
//! ## Modules
//!
//! - `types`: [`Action`], [`Request`], and [`Reply`] with its encoder
//! - `parser`: turns a raw request line into a [`Request`]
//!
//! ## Example
//!
//! ```
//! use ledgerline::protocol::{parse_request, Action, Reply};
//!
//! let request = parse_request("alice,clear").unwrap();
//! assert_eq!(request.action(), Action::Clear);
//!
//! let reply = Reply::with_message(Action::Clear, true, "3");
//! assert_eq!(reply.serialize(), "clear~1~3~null");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, ParseError, ParseResult};
pub use types::{Action, Reply, Request};
