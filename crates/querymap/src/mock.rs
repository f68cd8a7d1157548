//! A scriptable in-memory driver.
//!
//! [`MockDriver`] records every prepared statement and bound parameter and
//! replays canned results in order. The crate's own tests, benches, and
//! examples run against it; it is also useful for asserting on the exact SQL
//! an application would send.

use crate::driver::{Driver, DriverError, Row, Statement};
use crate::value::{BindKind, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One statement as the driver saw it.
#[derive(Debug, Clone)]
pub struct RecordedStatement {
    pub sql: String,
    pub binds: Vec<(String, Value, BindKind)>,
}

/// A canned result for one statement.
#[derive(Debug, Clone, Default)]
pub struct MockResult {
    pub rows: Vec<Row>,
    pub affected: u64,
    pub error: Option<String>,
}

impl MockResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    statements: Vec<RecordedStatement>,
    results: VecDeque<MockResult>,
    transactions: Vec<&'static str>,
    last_insert_id: Option<String>,
}

/// Shared view into a [`MockDriver`]'s recordings, kept by the test after
/// the driver itself moves into the connection.
#[derive(Debug, Clone)]
pub struct MockHandle(Arc<Mutex<State>>);

impl MockHandle {
    /// Queue the result for the next executed statement. Statements without
    /// a queued result succeed with an empty result set.
    pub fn push_result(&self, result: MockResult) {
        self.0.lock().unwrap().results.push_back(result);
    }

    pub fn set_last_insert_id(&self, id: impl Into<String>) {
        self.0.lock().unwrap().last_insert_id = Some(id.into());
    }

    /// Every statement prepared so far, with its binds in bind order.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.0.lock().unwrap().statements.clone()
    }

    /// SQL of the most recently prepared statement.
    pub fn last_sql(&self) -> Option<String> {
        self.0
            .lock()
            .unwrap()
            .statements
            .last()
            .map(|s| s.sql.clone())
    }

    /// Transaction events in order: `"BEGIN"`, `"COMMIT"`, `"ROLLBACK"`.
    pub fn transactions(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().transactions.clone()
    }
}

/// The scriptable driver.
pub struct MockDriver {
    state: Arc<Mutex<State>>,
}

impl MockDriver {
    /// Create a driver and the handle used to script and inspect it.
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(State::default()));
        (
            Self {
                state: state.clone(),
            },
            MockHandle(state),
        )
    }
}

impl Driver for MockDriver {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(RecordedStatement {
            sql: sql.to_string(),
            binds: Vec::new(),
        });
        let index = state.statements.len() - 1;
        let result = state.results.pop_front().unwrap_or_default();
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
            index,
            rows: result.rows.into(),
            affected: result.affected,
            error: result.error,
        }))
    }

    fn last_insert_id(&mut self) -> Result<Option<String>, DriverError> {
        Ok(self.state.lock().unwrap().last_insert_id.clone())
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().transactions.push("BEGIN");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().transactions.push("COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().transactions.push("ROLLBACK");
        Ok(())
    }
}

struct MockStatement {
    state: Arc<Mutex<State>>,
    index: usize,
    rows: VecDeque<Row>,
    affected: u64,
    error: Option<String>,
}

impl Statement for MockStatement {
    fn bind(&mut self, name: &str, value: &Value, kind: BindKind) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements[self.index]
            .binds
            .push((name.to_string(), value.clone(), kind));
        Ok(())
    }

    fn execute(&mut self) -> Result<u64, DriverError> {
        match self.error.take() {
            Some(message) => Err(DriverError::new(message)),
            None => Ok(self.affected),
        }
    }

    fn fetch(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.pop_front())
    }
}
