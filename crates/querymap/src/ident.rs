//! Safe SQL identifier handling.
//!
//! Identifiers cannot be parameterized in SQL, so they are the one place a
//! caller-supplied string could reach the statement text directly. The
//! [`Quoter`] validates every table/column reference against a strict
//! grammar before quoting it: letters, digits, and underscores, with at most
//! one dot separating a table segment from a column segment. Anything else
//! fails with [`DbError::InvalidIdentifier`].
//!
//! The configured table prefix is applied to table names, and to the table
//! segment of dotted column references, never to bare columns.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};

/// True when `s` is a single valid identifier segment: `[A-Za-z0-9_]+`.
pub(crate) fn is_segment(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b == b'_' || b.is_ascii_alphanumeric())
}

/// Split a reference into `(table, column)` or `(None, column)`, validating
/// the grammar `segment` or `segment.segment`.
pub(crate) fn split_reference(s: &str) -> DbResult<(Option<&str>, &str)> {
    match s.split_once('.') {
        Some((table, column)) => {
            if is_segment(table) && is_segment(column) {
                Ok((Some(table), column))
            } else {
                Err(DbError::ident(s))
            }
        }
        None => {
            if is_segment(s) {
                Ok((None, s))
            } else {
                Err(DbError::ident(s))
            }
        }
    }
}

/// Validates and quotes table/column identifiers for one connection.
#[derive(Debug, Clone)]
pub struct Quoter {
    dialect: Dialect,
    prefix: String,
}

impl Quoter {
    pub fn new(dialect: Dialect, prefix: impl Into<String>) -> Self {
        Self {
            dialect,
            prefix: prefix.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Quote a table name, applying the configured prefix.
    ///
    /// Dotted names are rejected here: tables are always single-segment in
    /// the specification language.
    pub fn quote_table(&self, name: &str) -> DbResult<String> {
        if !is_segment(name) {
            return Err(DbError::ident(name));
        }
        Ok(self
            .dialect
            .quote_segment(&format!("{}{}", self.prefix, name)))
    }

    /// Quote a column reference: `column` or `table.column`.
    ///
    /// Dotted references are prefixed per-segment, producing
    /// `"prefix_table"."column"`.
    pub fn quote_column(&self, reference: &str) -> DbResult<String> {
        let (table, column) = split_reference(reference)?;
        match table {
            Some(table) => {
                let mut out = self
                    .dialect
                    .quote_segment(&format!("{}{}", self.prefix, table));
                out.push('.');
                out.push_str(&self.dialect.quote_segment(column));
                Ok(out)
            }
            None => Ok(self.dialect.quote_segment(column)),
        }
    }

    /// Quote an alias segment (no prefix, single segment only).
    pub fn quote_alias(&self, alias: &str) -> DbResult<String> {
        if !is_segment(alias) {
            return Err(DbError::ident(alias));
        }
        Ok(self.dialect.quote_segment(alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoter() -> Quoter {
        Quoter::new(Dialect::Postgres, "app_")
    }

    #[test]
    fn table_gets_prefix() {
        assert_eq!(quoter().quote_table("users").unwrap(), "\"app_users\"");
    }

    #[test]
    fn bare_column_gets_no_prefix() {
        assert_eq!(quoter().quote_column("name").unwrap(), "\"name\"");
    }

    #[test]
    fn dotted_column_prefixes_table_segment() {
        assert_eq!(
            quoter().quote_column("users.name").unwrap(),
            "\"app_users\".\"name\""
        );
    }

    #[test]
    fn mysql_uses_backticks() {
        let q = Quoter::new(Dialect::MySql, "");
        assert_eq!(q.quote_column("users.name").unwrap(), "`users`.`name`");
    }

    #[test]
    fn quoting_is_stable() {
        let q = quoter();
        assert_eq!(
            q.quote_column("users.name").unwrap(),
            q.quote_column("users.name").unwrap()
        );
    }

    #[test]
    fn rejects_injection_attempts() {
        let q = quoter();
        assert!(q.quote_table("users; DROP TABLE users").is_err());
        assert!(q.quote_column("name'||'").is_err());
        assert!(q.quote_column("a.b.c").is_err());
        assert!(q.quote_column("").is_err());
        assert!(q.quote_column(".name").is_err());
    }

    #[test]
    fn rejects_dotted_table() {
        assert!(quoter().quote_table("schema.users").is_err());
    }
}
