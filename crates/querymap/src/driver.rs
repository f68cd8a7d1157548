//! The driver boundary.
//!
//! The backend wire protocol is an external collaborator; this module
//! defines the interface the compiler drives: prepare a statement, bind
//! named parameters with their type tags, execute, fetch rows, quote string
//! literals, report the last inserted id, and manage transactions. The call
//! model is synchronous: each call blocks until the backend responds.

use crate::value::{BindKind, Map, Value};
use thiserror::Error;

/// A fetched result row: column name → value, in select-list order.
pub type Row = Map;

/// An error reported by the backend driver.
///
/// Carried into [`DbError::Execution`](crate::DbError::Execution) by the
/// statement executor, which also records it in the connection's error slot.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A prepared statement.
pub trait Statement {
    /// Bind one named parameter with its type tag.
    fn bind(&mut self, name: &str, value: &Value, kind: BindKind) -> Result<(), DriverError>;

    /// Execute the statement, returning the affected-row count.
    fn execute(&mut self) -> Result<u64, DriverError>;

    /// Fetch the next result row; `None` at end of the result set.
    fn fetch(&mut self) -> Result<Option<Row>, DriverError>;
}

/// An open backend connection.
pub trait Driver {
    /// Prepare a statement for execution.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>, DriverError>;

    /// Render a string as an escaped SQL literal (used only for debug
    /// rendering and the query log, never for executed statements).
    fn quote(&self, literal: &str) -> String {
        let mut out = String::with_capacity(literal.len() + 2);
        out.push('\'');
        for c in literal.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
        out
    }

    /// The id generated by the most recent insert, if the backend reports
    /// one.
    fn last_insert_id(&mut self) -> Result<Option<String>, DriverError>;

    fn begin(&mut self) -> Result<(), DriverError>;
    fn commit(&mut self) -> Result<(), DriverError>;
    fn rollback(&mut self) -> Result<(), DriverError>;
}
