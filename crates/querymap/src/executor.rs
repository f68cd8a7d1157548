//! The statement executor.
//!
//! Prepares, binds, and executes compiled statements. Failures capture the
//! backend's error detail in the connection's error slot before surfacing as
//! [`DbError::Execution`]. Debug mode renders the fully-interpolated literal
//! SQL instead of executing, consuming exactly one call. The query log keeps
//! only the most recent statement unless logging is enabled, in which case
//! it is append-only.

use crate::bind::ParamBag;
use crate::client::Database;
use crate::driver::{Driver, DriverError, Row};
use crate::error::{DbError, DbResult};
use crate::value::{BoundParam, Value};

impl Database {
    /// Execute a row-returning statement. `None` means a one-shot debug call
    /// consumed the statement without touching the driver.
    pub(crate) fn run_query(&mut self, sql: &str, bag: &ParamBag) -> DbResult<Option<Vec<Row>>> {
        let rendered = self.render_literal(sql, bag);
        self.record_log(rendered);
        if self.take_debug() {
            return Ok(None);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "querymap", sql, params = bag.len(), "executing query");
        match drive(self.driver.as_mut(), sql, bag, true) {
            Ok((_, rows)) => Ok(Some(rows)),
            Err(e) => Err(self.record_failure(e)),
        }
    }

    /// Execute a statement without a result set, returning the affected-row
    /// count, or `None` under one-shot debug.
    pub(crate) fn run_execute(&mut self, sql: &str, bag: &ParamBag) -> DbResult<Option<u64>> {
        let rendered = self.render_literal(sql, bag);
        self.record_log(rendered);
        if self.take_debug() {
            return Ok(None);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "querymap", sql, params = bag.len(), "executing statement");
        match drive(self.driver.as_mut(), sql, bag, false) {
            Ok((affected, _)) => Ok(Some(affected)),
            Err(e) => Err(self.record_failure(e)),
        }
    }

    fn record_failure(&mut self, error: DriverError) -> DbError {
        self.last_error = Some(error.message.clone());
        #[cfg(feature = "tracing")]
        tracing::warn!(target: "querymap", error = %error, "statement failed");
        DbError::Execution(error.message)
    }

    fn record_log(&mut self, rendered: String) {
        if self.logging {
            self.log.push(rendered);
        } else {
            self.log.clear();
            self.log.push(rendered);
        }
    }

    /// Substitute placeholders with quoted literals, for the log and for
    /// debug inspection. Never used for executed SQL.
    pub(crate) fn render_literal(&self, sql: &str, bag: &ParamBag) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut rest = sql;
        while let Some(pos) = rest.find(':') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            let name_len = tail
                .bytes()
                .take_while(|b| *b == b'_' || b.is_ascii_alphanumeric())
                .count();
            let name = &tail[..name_len];
            match bag.params().iter().find(|(n, _)| n == name) {
                Some((_, param)) if name_len > 0 => {
                    out.push_str(&self.literal(param));
                }
                _ => {
                    out.push(':');
                    out.push_str(name);
                }
            }
            rest = &tail[name_len..];
        }
        out.push_str(rest);
        out
    }

    fn literal(&self, param: &BoundParam) -> String {
        match &param.value {
            Value::Null => "NULL".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => self.driver.quote(s),
            Value::Bytes(bytes) => {
                let mut out = String::with_capacity(bytes.len() * 2 + 3);
                out.push_str("X'");
                for byte in bytes {
                    out.push_str(&format!("{byte:02X}"));
                }
                out.push('\'');
                out
            }
            // Bound values are normalized scalars; nothing else reaches here.
            other => format!("{other:?}"),
        }
    }
}

fn drive(
    driver: &mut dyn Driver,
    sql: &str,
    bag: &ParamBag,
    want_rows: bool,
) -> Result<(u64, Vec<Row>), DriverError> {
    let mut statement = driver.prepare(sql)?;
    for (name, param) in bag.params() {
        statement.bind(name, &param.value, param.kind)?;
    }
    let affected = statement.execute()?;
    let mut rows = Vec::new();
    if want_rows {
        while let Some(row) = statement.fetch()? {
            rows.push(row);
        }
    }
    Ok((affected, rows))
}
