//! SQL dialect strategies.
//!
//! Every backend-specific syntax decision lives behind [`Dialect`]: the
//! identifier quote character, LIMIT/OFFSET rendering, the regex comparison
//! form, the existence-probe shape, and full-text MATCH support. The rest of
//! the compiler is dialect-agnostic and asks this enum instead of branching
//! on backend names.

use crate::error::{DbError, DbResult};
use std::fmt;
use std::str::FromStr;

/// The SQL syntax variant of a specific backend.
///
/// Fixed per connection at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    Mssql,
    Oracle,
    Sybase,
}

impl Dialect {
    /// All supported dialects, for diagnostics.
    pub const ALL: [Dialect; 6] = [
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Sqlite,
        Dialect::Mssql,
        Dialect::Oracle,
        Dialect::Sybase,
    ];

    /// Canonical driver name used in connection options.
    pub fn driver_name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "pgsql",
            Dialect::Sqlite => "sqlite",
            Dialect::Mssql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Sybase => "sybase",
        }
    }

    /// Identifier quote character.
    ///
    /// MySQL uses backticks; everything else understands the standard
    /// double-quoted form (MSSQL with QUOTED_IDENTIFIER, which is the
    /// server default).
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            _ => '"',
        }
    }

    /// Quote a single identifier segment. The segment is already validated,
    /// so no escaping is required.
    pub fn quote_segment(self, segment: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(segment.len() + 2);
        out.push(q);
        out.push_str(segment);
        out.push(q);
        out
    }

    /// Whether `LIMIT n OFFSET m` is understood directly.
    ///
    /// The T-SQL/Oracle family needs `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    /// appended after ORDER BY instead.
    pub fn supports_limit_offset(self) -> bool {
        matches!(self, Dialect::MySql | Dialect::Postgres | Dialect::Sqlite)
    }

    /// Render a LIMIT request.
    ///
    /// Returns `None` when the clause must be dropped: the FETCH NEXT form
    /// is only valid after an ORDER BY, so without one the request cannot be
    /// expressed on MSSQL/Oracle/Sybase.
    pub fn render_limit(self, offset: u64, count: u64, has_order: bool) -> Option<String> {
        if self.supports_limit_offset() {
            if offset == 0 {
                Some(format!("LIMIT {count}"))
            } else {
                Some(format!("LIMIT {count} OFFSET {offset}"))
            }
        } else if has_order {
            Some(format!("OFFSET {offset} ROWS FETCH NEXT {count} ROWS ONLY"))
        } else {
            None
        }
    }

    /// Whether full-text `MATCH … AGAINST` is available.
    pub fn supports_match(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Render the backend-native regex comparison for an already-quoted
    /// column and a placeholder.
    pub fn regexp_condition(self, column: &str, placeholder: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite | Dialect::Sybase => {
                format!("{column} REGEXP {placeholder}")
            }
            Dialect::Postgres => format!("{column} ~ {placeholder}"),
            Dialect::Oracle | Dialect::Mssql => {
                format!("REGEXP_LIKE({column}, {placeholder})")
            }
        }
    }

    /// Whether the existence probe uses `SELECT TOP 1 1 …` instead of
    /// wrapping the query in `SELECT EXISTS(…)`.
    pub fn probe_with_top(self) -> bool {
        matches!(self, Dialect::Mssql | Dialect::Sybase)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

impl FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mssql" | "sqlsrv" => Ok(Dialect::Mssql),
            "oracle" => Ok(Dialect::Oracle),
            "sybase" | "dblib" => Ok(Dialect::Sybase),
            other => Err(DbError::config(format!("unsupported dialect '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlsrv".parse::<Dialect>().unwrap(), Dialect::Mssql);
    }

    #[test]
    fn rejects_unknown_name() {
        assert!("mongodb".parse::<Dialect>().is_err());
    }

    #[test]
    fn quote_char_per_family() {
        assert_eq!(Dialect::MySql.quote_segment("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote_segment("users"), "\"users\"");
        assert_eq!(Dialect::Mssql.quote_segment("users"), "\"users\"");
    }

    #[test]
    fn limit_rendering_differs_by_dialect() {
        assert_eq!(
            Dialect::Postgres.render_limit(10, 5, false).unwrap(),
            "LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            Dialect::Mssql.render_limit(10, 5, true).unwrap(),
            "OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn fetch_next_requires_order_by() {
        assert!(Dialect::Oracle.render_limit(0, 5, false).is_none());
        assert!(Dialect::Sqlite.render_limit(0, 5, false).is_some());
    }

    #[test]
    fn regexp_forms() {
        assert_eq!(
            Dialect::MySql.regexp_condition("`name`", ":p0"),
            "`name` REGEXP :p0"
        );
        assert_eq!(
            Dialect::Postgres.regexp_condition("\"name\"", ":p0"),
            "\"name\" ~ :p0"
        );
        assert_eq!(
            Dialect::Oracle.regexp_condition("\"name\"", ":p0"),
            "REGEXP_LIKE(\"name\", :p0)"
        );
    }
}
