//! The parameter bag threaded through compilation.
//!
//! Every literal that must be bound gets a fresh placeholder name drawn from
//! the connection's shared counter. The counter is a process-lifetime
//! `AtomicU64` so that statements compiled concurrently against one
//! connection context can never collide on a name.

use crate::error::DbResult;
use crate::raw::Raw;
use crate::value::{BoundParam, Value, classify};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered collection of `(placeholder name, bound parameter)` pairs for one
/// statement. Created fresh per call, discarded after execution.
#[derive(Debug)]
pub struct ParamBag {
    counter: Arc<AtomicU64>,
    params: Vec<(String, BoundParam)>,
}

impl ParamBag {
    /// A bag with its own private counter; used by unit tests and one-off
    /// compilations.
    pub fn new() -> Self {
        Self::with_counter(Arc::new(AtomicU64::new(0)))
    }

    /// A bag drawing names from a shared connection-context counter.
    pub fn with_counter(counter: Arc<AtomicU64>) -> Self {
        Self {
            counter,
            params: Vec::new(),
        }
    }

    /// Classify `value`, store it under a fresh generated name, and return
    /// the placeholder token to splice into the SQL (`:p7`).
    pub fn bind(&mut self, value: &Value) -> DbResult<String> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("p{n}");
        let token = format!(":{name}");
        self.params.push((name, classify(value)?));
        Ok(token)
    }

    /// Store a caller-named parameter from a raw fragment.
    pub fn bind_named(&mut self, name: &str, value: &Value) -> DbResult<()> {
        self.params.push((name.to_string(), classify(value)?));
        Ok(())
    }

    /// Take over all named parameters a raw fragment carries.
    pub fn absorb_raw(&mut self, raw: &Raw) -> DbResult<()> {
        for (name, value) in raw.params() {
            self.bind_named(name, value)?;
        }
        Ok(())
    }

    pub fn params(&self) -> &[(String, BoundParam)] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Default for ParamBag {
    fn default() -> Self {
        Self::new()
    }
}
