//! The connection context and high-level verbs.
//!
//! [`Database`] owns the driver connection, the table-name prefix, the
//! placeholder counter, the last-error slot, and the query log. Each verb
//! compiles its SQL through the identifier quoter, condition compiler,
//! column projector, join builder, and clause assembler, runs it through the
//! statement executor, and (for reads) decodes rows through the result
//! mapper.

use crate::bind::ParamBag;
use crate::clause;
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::ident::Quoter;
use crate::join;
use crate::projection;
use crate::raw::Raw;
use crate::row::map_rows;
use crate::syntax::{TableRef, parse_table_ref, parse_update_key};
use crate::value::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Connection options, validated at construction.
///
/// # Example
/// ```
/// use querymap::{Dialect, Options};
///
/// let options = Options::new(Dialect::Postgres)
///     .prefix("app_")
///     .logging(true);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) dialect: Dialect,
    pub(crate) prefix: String,
    pub(crate) logging: bool,
}

impl Options {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            prefix: String::new(),
            logging: false,
        }
    }

    /// Parse the dialect from a driver name (`"mysql"`, `"pgsql"`, …).
    pub fn from_driver_name(name: &str) -> DbResult<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Table-name prefix applied by the identifier quoter.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// When enabled the query log is unbounded and append-only; otherwise it
    /// retains only the most recent statement.
    pub fn logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }
}

/// A single logical connection: compiler state plus the driver handle.
pub struct Database {
    pub(crate) driver: Box<dyn Driver>,
    quoter: Quoter,
    counter: Arc<AtomicU64>,
    pub(crate) logging: bool,
    pub(crate) log: Vec<String>,
    pub(crate) last_error: Option<String>,
    debug_once: bool,
    in_transaction: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("quoter", &self.quoter)
            .field("logging", &self.logging)
            .field("log", &self.log)
            .field("last_error", &self.last_error)
            .field("debug_once", &self.debug_once)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open a connection context over a driver.
    pub fn open(driver: impl Driver + 'static, options: Options) -> DbResult<Self> {
        if !options
            .prefix
            .bytes()
            .all(|b| b == b'_' || b.is_ascii_alphanumeric())
        {
            return Err(DbError::config(format!(
                "invalid table prefix '{}'",
                options.prefix
            )));
        }
        Ok(Self {
            driver: Box::new(driver),
            quoter: Quoter::new(options.dialect, options.prefix),
            counter: Arc::new(AtomicU64::new(0)),
            logging: options.logging,
            log: Vec::new(),
            last_error: None,
            debug_once: false,
            in_transaction: false,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.quoter.dialect()
    }

    pub fn prefix(&self) -> &str {
        self.quoter.prefix()
    }

    /// Arm one-shot debug mode: the next statement is rendered into the log
    /// instead of executing, and read verbs return empty results.
    pub fn debug(&mut self) -> &mut Self {
        self.debug_once = true;
        self
    }

    pub(crate) fn take_debug(&mut self) -> bool {
        std::mem::take(&mut self.debug_once)
    }

    /// Detail of the most recent execution failure, if any.
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The most recently compiled statement, rendered with literals.
    pub fn last(&self) -> Option<&str> {
        self.log.last().map(String::as_str)
    }

    /// The query log. Only the most recent entry is retained unless logging
    /// was enabled in [`Options`].
    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// The id generated by the most recent insert, if the backend reports
    /// one.
    pub fn id(&mut self) -> DbResult<Option<String>> {
        match self.driver.last_insert_id() {
            Ok(id) => Ok(id),
            Err(e) => {
                self.last_error = Some(e.message.clone());
                Err(DbError::Execution(e.message))
            }
        }
    }

    fn param_bag(&self) -> ParamBag {
        ParamBag::with_counter(self.counter.clone())
    }

    fn render_from(&self, table: &TableRef) -> DbResult<String> {
        let mut sql = self.quoter.quote_table(&table.name)?;
        if let Some(alias) = &table.alias {
            sql.push_str(" AS ");
            sql.push_str(&self.quoter.quote_alias(alias)?);
        }
        Ok(sql)
    }

    // ==================== Read verbs ====================

    /// Fetch rows matching the where-spec, decoded per the column spec.
    ///
    /// A single non-`*` column string flattens the result to a bare list of
    /// that column's values.
    ///
    /// # Example
    /// ```no_run
    /// # use querymap::{Database, spec, seq};
    /// # fn demo(db: &mut Database) -> querymap::DbResult<()> {
    /// let users = db.select(
    ///     "users",
    ///     seq!["id[Int]", "name"],
    ///     Some(&spec! { "status" => "active" }),
    /// )?;
    /// # Ok(()) }
    /// ```
    pub fn select(
        &mut self,
        table: &str,
        columns: impl Into<Value>,
        where_spec: Option<&Map>,
    ) -> DbResult<Value> {
        self.select_with(table, None, &columns.into(), where_spec)
    }

    /// [`select`](Self::select) over a join specification.
    pub fn select_join(
        &mut self,
        table: &str,
        joins: &Map,
        columns: impl Into<Value>,
        where_spec: Option<&Map>,
    ) -> DbResult<Value> {
        self.select_with(table, Some(joins), &columns.into(), where_spec)
    }

    fn select_with(
        &mut self,
        table: &str,
        joins: Option<&Map>,
        columns: &Value,
        where_spec: Option<&Map>,
    ) -> DbResult<Value> {
        let mut bag = self.param_bag();
        let sql = self.build_select(table, joins, columns, where_spec, &mut bag)?;
        match self.run_query(&sql, &bag)? {
            Some(rows) => map_rows(columns, rows),
            None => Ok(Value::Seq(Vec::new())),
        }
    }

    fn build_select(
        &self,
        table: &str,
        joins: Option<&Map>,
        columns: &Value,
        where_spec: Option<&Map>,
        bag: &mut ParamBag,
    ) -> DbResult<String> {
        let table_ref = parse_table_ref(table)?;
        let joins = joins.filter(|j| !j.is_empty());
        let list = projection::project(columns, &self.quoter, bag, joins.is_some())?;
        let mut sql = format!("SELECT {list} FROM {}", self.render_from(&table_ref)?);
        if let Some(joins) = joins {
            sql.push(' ');
            sql.push_str(&join::build(&table_ref, joins, &self.quoter)?);
        }
        if let Some(where_spec) = where_spec {
            sql.push_str(&clause::assemble(where_spec, &self.quoter, bag)?);
        }
        Ok(sql)
    }

    /// Fetch a single record (or a single scalar for a single-column
    /// request); `None` when nothing matches.
    pub fn get(
        &mut self,
        table: &str,
        columns: impl Into<Value>,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.get_with(table, None, &columns.into(), where_spec)
    }

    /// [`get`](Self::get) over a join specification.
    pub fn get_join(
        &mut self,
        table: &str,
        joins: &Map,
        columns: impl Into<Value>,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.get_with(table, Some(joins), &columns.into(), where_spec)
    }

    fn get_with(
        &mut self,
        table: &str,
        joins: Option<&Map>,
        columns: &Value,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        let mut limited = where_spec.cloned().unwrap_or_default();
        limited.insert("LIMIT".to_string(), Value::Int(1));
        let mut bag = self.param_bag();
        let sql = self.build_select(table, joins, columns, Some(&limited), &mut bag)?;
        let Some(rows) = self.run_query(&sql, &bag)? else {
            return Ok(None);
        };
        match map_rows(columns, rows)? {
            Value::Seq(items) => Ok(items.into_iter().next()),
            Value::Map(entries) => Ok(entries.into_iter().next().map(|(_, record)| record)),
            other => Ok(Some(other)),
        }
    }

    /// Whether any row matches the where-spec.
    pub fn has(&mut self, table: &str, where_spec: Option<&Map>) -> DbResult<bool> {
        self.has_with(table, None, where_spec)
    }

    /// [`has`](Self::has) over a join specification.
    pub fn has_join(
        &mut self,
        table: &str,
        joins: &Map,
        where_spec: Option<&Map>,
    ) -> DbResult<bool> {
        self.has_with(table, Some(joins), where_spec)
    }

    fn has_with(
        &mut self,
        table: &str,
        joins: Option<&Map>,
        where_spec: Option<&Map>,
    ) -> DbResult<bool> {
        let table_ref = parse_table_ref(table)?;
        let mut bag = self.param_bag();
        let mut from = self.render_from(&table_ref)?;
        if let Some(joins) = joins.filter(|j| !j.is_empty()) {
            from.push(' ');
            from.push_str(&join::build(&table_ref, joins, &self.quoter)?);
        }
        let suffix = match where_spec {
            Some(where_spec) => clause::assemble(where_spec, &self.quoter, &mut bag)?,
            None => String::new(),
        };
        let sql = if self.dialect().probe_with_top() {
            format!("SELECT TOP 1 1 FROM {from}{suffix}")
        } else {
            format!("SELECT EXISTS(SELECT 1 FROM {from}{suffix})")
        };
        match self.run_query(&sql, &bag)? {
            Some(rows) => Ok(rows
                .first()
                .and_then(|row| row.values().next())
                .is_some_and(truthy)),
            None => Ok(false),
        }
    }

    // ==================== Aggregates ====================

    /// `SELECT COUNT(*)` over the where-spec.
    pub fn count(&mut self, table: &str, where_spec: Option<&Map>) -> DbResult<u64> {
        match self.aggregate("COUNT", table, "*", where_spec)? {
            Some(value) => Ok(value.coerce_f64().map(|f| f as u64).unwrap_or(0)),
            None => Ok(0),
        }
    }

    pub fn avg(
        &mut self,
        table: &str,
        column: &str,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.aggregate("AVG", table, column, where_spec)
    }

    pub fn max(
        &mut self,
        table: &str,
        column: &str,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.aggregate("MAX", table, column, where_spec)
    }

    pub fn min(
        &mut self,
        table: &str,
        column: &str,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.aggregate("MIN", table, column, where_spec)
    }

    pub fn sum(
        &mut self,
        table: &str,
        column: &str,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        self.aggregate("SUM", table, column, where_spec)
    }

    fn aggregate(
        &mut self,
        function: &str,
        table: &str,
        column: &str,
        where_spec: Option<&Map>,
    ) -> DbResult<Option<Value>> {
        let table_ref = parse_table_ref(table)?;
        let mut bag = self.param_bag();
        let target = if column == "*" {
            "*".to_string()
        } else {
            self.quoter.quote_column(column)?
        };
        let mut sql = format!(
            "SELECT {function}({target}) FROM {}",
            self.render_from(&table_ref)?
        );
        if let Some(where_spec) = where_spec {
            sql.push_str(&clause::assemble(where_spec, &self.quoter, &mut bag)?);
        }
        let Some(rows) = self.run_query(&sql, &bag)? else {
            return Ok(None);
        };
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().next())
            .map(coerce_numeric))
    }

    // ==================== Write verbs ====================

    /// Insert one record, or a sequence of records batched into one
    /// multi-row INSERT. Records sharing the statement are unified on one
    /// column set; a record missing a column binds NULL for it.
    pub fn insert(&mut self, table: &str, data: impl Into<Value>) -> DbResult<u64> {
        let data = data.into();
        let records: Vec<&Map> = match &data {
            Value::Map(record) => vec![record],
            Value::Seq(items) => items
                .iter()
                .map(|item| {
                    item.as_map()
                        .ok_or_else(|| DbError::compile("insert records must be maps"))
                })
                .collect::<DbResult<_>>()?,
            _ => return Err(DbError::compile("insert requires a record or record list")),
        };
        if records.is_empty() {
            return Err(DbError::compile("insert requires at least one record"));
        }

        let mut columns: Vec<&str> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key.as_str());
                }
            }
        }

        let mut bag = self.param_bag();
        let quoted_columns = columns
            .iter()
            .map(|column| self.quoter.quote_alias(column))
            .collect::<DbResult<Vec<_>>>()?;
        let mut tuples = Vec::with_capacity(records.len());
        for record in &records {
            let mut slots = Vec::with_capacity(columns.len());
            for column in &columns {
                match record.get(*column) {
                    None => slots.push(bag.bind(&Value::Null)?),
                    Some(Value::Raw(raw)) => {
                        bag.absorb_raw(raw)?;
                        slots.push(raw.splice(&self.quoter)?);
                    }
                    Some(value) => slots.push(bag.bind(value)?),
                }
            }
            tuples.push(format!("({})", slots.join(", ")));
        }

        let table_ref = parse_table_ref(table)?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quoter.quote_table(&table_ref.name)?,
            quoted_columns.join(", "),
            tuples.join(", ")
        );
        Ok(self.run_execute(&sql, &bag)?.unwrap_or(0))
    }

    /// Update matching rows. Keys may carry the arithmetic shorthand
    /// `col[+]`, `col[-]`, `col[*]`, `col[/]`, compiled to
    /// `col = col OP value`; the operand must be numeric.
    pub fn update(
        &mut self,
        table: &str,
        data: &Map,
        where_spec: Option<&Map>,
    ) -> DbResult<u64> {
        if data.is_empty() {
            return Err(DbError::compile("update requires at least one assignment"));
        }
        let mut bag = self.param_bag();
        let mut assignments = Vec::with_capacity(data.len());
        for (key, value) in data {
            let (column, operator) = parse_update_key(key)?;
            let quoted = self.quoter.quote_column(&column)?;
            match operator {
                Some(operator) => {
                    if !value.is_numeric() {
                        return Err(DbError::compile(format!(
                            "'{key}' requires a numeric operand"
                        )));
                    }
                    let token = bag.bind(value)?;
                    assignments.push(format!("{quoted} = {quoted} {operator} {token}"));
                }
                None => match value {
                    Value::Raw(raw) => {
                        bag.absorb_raw(raw)?;
                        assignments.push(format!("{quoted} = {}", raw.splice(&self.quoter)?));
                    }
                    value => {
                        let token = bag.bind(value)?;
                        assignments.push(format!("{quoted} = {token}"));
                    }
                },
            }
        }

        let table_ref = parse_table_ref(table)?;
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quoter.quote_table(&table_ref.name)?,
            assignments.join(", ")
        );
        if let Some(where_spec) = where_spec {
            sql.push_str(&clause::assemble(where_spec, &self.quoter, &mut bag)?);
        }
        Ok(self.run_execute(&sql, &bag)?.unwrap_or(0))
    }

    /// Delete matching rows.
    pub fn delete(&mut self, table: &str, where_spec: Option<&Map>) -> DbResult<u64> {
        let table_ref = parse_table_ref(table)?;
        let mut bag = self.param_bag();
        let mut sql = format!("DELETE FROM {}", self.quoter.quote_table(&table_ref.name)?);
        if let Some(where_spec) = where_spec {
            sql.push_str(&clause::assemble(where_spec, &self.quoter, &mut bag)?);
        }
        Ok(self.run_execute(&sql, &bag)?.unwrap_or(0))
    }

    // ==================== Raw statements ====================

    /// Execute a caller-supplied raw fragment and fetch its rows. Identifier
    /// markers are resolved, and the fragment's named parameters are bound.
    pub fn query(&mut self, raw: &Raw) -> DbResult<Value> {
        let mut bag = self.param_bag();
        bag.absorb_raw(raw)?;
        let sql = raw.splice(&self.quoter)?;
        match self.run_query(&sql, &bag)? {
            Some(rows) => Ok(Value::Seq(rows.into_iter().map(Value::Map).collect())),
            None => Ok(Value::Seq(Vec::new())),
        }
    }

    /// Execute a raw fragment without a result set.
    pub fn exec(&mut self, raw: &Raw) -> DbResult<u64> {
        let mut bag = self.param_bag();
        bag.absorb_raw(raw)?;
        let sql = raw.splice(&self.quoter)?;
        Ok(self.run_execute(&sql, &bag)?.unwrap_or(0))
    }

    // ==================== Transactions ====================

    /// Run a unit of work under begin/commit/rollback.
    ///
    /// Commits when the closure returns `Ok`; rolls back and propagates the
    /// error otherwise. Rollback is attempted unconditionally before the
    /// error reaches the caller. Only one transaction may be active per
    /// connection; nesting is an error.
    pub fn action<T, F>(&mut self, work: F) -> DbResult<T>
    where
        F: FnOnce(&mut Self) -> DbResult<T>,
    {
        if self.in_transaction {
            return Err(DbError::Transaction(
                "a transaction is already active on this connection".to_string(),
            ));
        }
        self.driver
            .begin()
            .map_err(|e| DbError::Transaction(e.message))?;
        self.in_transaction = true;
        let outcome = work(self);
        self.in_transaction = false;
        match outcome {
            Ok(value) => {
                self.driver
                    .commit()
                    .map_err(|e| DbError::Transaction(e.message))?;
                Ok(value)
            }
            Err(error) => match self.driver.rollback() {
                Ok(()) => Err(error),
                Err(rollback_err) => Err(DbError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => matches!(s.as_str(), "1" | "t" | "true"),
        _ => false,
    }
}

/// Numeric coercion of aggregate scalars: numeric strings become numbers,
/// everything else passes through.
fn coerce_numeric(value: Value) -> Value {
    match &value {
        Value::Str(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                Value::Float(f)
            } else {
                value
            }
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockHandle, MockResult};
    use crate::value::BindKind;
    use crate::{seq, spec};

    fn open(dialect: Dialect) -> (Database, MockHandle) {
        let (driver, handle) = MockDriver::new();
        let db = Database::open(driver, Options::new(dialect)).unwrap();
        (db, handle)
    }

    #[test]
    fn select_compiles_and_maps() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![
            spec! { "id" => "1", "name" => "ann" },
        ]));
        let out = db
            .select(
                "users",
                seq!["id[Int]", "name"],
                Some(&spec! { "status" => "active" }),
            )
            .unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"status\" = :p0"
        );
        let record = out.as_seq().unwrap()[0].as_map().unwrap();
        assert_eq!(record["id"], Value::Int(1));

        let binds = handle.statements()[0].binds.clone();
        assert_eq!(binds[0].0, "p0");
        assert_eq!(binds[0].1, Value::Str("active".to_string()));
        assert_eq!(binds[0].2, BindKind::Str);
    }

    #[test]
    fn select_single_column_flattens() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![
            spec! { "name" => "ann" },
            spec! { "name" => "bob" },
        ]));
        let out = db.select("users", "name", None).unwrap();
        assert_eq!(out, seq!["ann", "bob"]);
    }

    #[test]
    fn select_join_compiles_join_clauses() {
        let (mut db, handle) = open(Dialect::Postgres);
        db.select_join(
            "users",
            &spec! { "[>]posts" => Value::Map(spec! { "id" => "author_id" }) },
            seq!["users.name", "posts.title"],
            None,
        )
        .unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "SELECT \"users\".\"name\", \"posts\".\"title\" FROM \"users\" \
             LEFT JOIN \"posts\" ON \"users\".\"id\" = \"posts\".\"author_id\""
        );
    }

    #[test]
    fn get_injects_limit_one() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![spec! { "name" => "ann" }]));
        let out = db.get("users", "name", None).unwrap();
        assert_eq!(out, Some(Value::Str("ann".to_string())));
        assert!(handle.last_sql().unwrap().ends_with("LIMIT 1"));
    }

    #[test]
    fn get_returns_none_for_empty_result() {
        let (mut db, _handle) = open(Dialect::Postgres);
        assert_eq!(db.get("users", "name", None).unwrap(), None);
    }

    #[test]
    fn has_wraps_in_exists() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![spec! { "exists" => true }]));
        assert!(db.has("users", Some(&spec! { "id" => 3 })).unwrap());
        assert_eq!(
            handle.last_sql().unwrap(),
            "SELECT EXISTS(SELECT 1 FROM \"users\" WHERE \"id\" = :p0)"
        );
    }

    #[test]
    fn has_uses_top_probe_on_mssql() {
        let (mut db, handle) = open(Dialect::Mssql);
        assert!(!db.has("users", None).unwrap());
        assert_eq!(handle.last_sql().unwrap(), "SELECT TOP 1 1 FROM \"users\"");
    }

    #[test]
    fn insert_batches_and_fills_missing_columns_with_null() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::affected(2));
        let affected = db
            .insert(
                "users",
                seq![
                    Value::Map(spec! { "name" => "ann", "email" => "a@x" }),
                    Value::Map(spec! { "name" => "bob", "age" => 40 }),
                ],
            )
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(
            handle.last_sql().unwrap(),
            "INSERT INTO \"users\" (\"name\", \"email\", \"age\") \
             VALUES (:p0, :p1, :p2), (:p3, :p4, :p5)"
        );
        let binds = handle.statements()[0].binds.clone();
        // First record has no "age"; second has no "email".
        assert_eq!(binds[2].1, Value::Null);
        assert_eq!(binds[2].2, BindKind::Null);
        assert_eq!(binds[4].1, Value::Null);
    }

    #[test]
    fn insert_reports_last_insert_id() {
        let (mut db, handle) = open(Dialect::MySql);
        handle.set_last_insert_id("42");
        db.insert("users", spec! { "name" => "ann" }).unwrap();
        assert_eq!(db.id().unwrap(), Some("42".to_string()));
    }

    #[test]
    fn update_supports_arithmetic_shorthand() {
        let (mut db, handle) = open(Dialect::Postgres);
        db.update(
            "users",
            &spec! { "views[+]" => 1, "name" => "ann" },
            Some(&spec! { "id" => 7 }),
        )
        .unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "UPDATE \"users\" SET \"views\" = \"views\" + :p0, \"name\" = :p1 WHERE \"id\" = :p2"
        );
    }

    #[test]
    fn update_rejects_non_numeric_arithmetic() {
        let (mut db, _handle) = open(Dialect::Postgres);
        let err = db
            .update("users", &spec! { "views[+]" => "one" }, None)
            .unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn delete_is_where_only() {
        let (mut db, handle) = open(Dialect::Postgres);
        db.delete("sessions", Some(&spec! { "expired" => true }))
            .unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "DELETE FROM \"sessions\" WHERE \"expired\" = :p0"
        );
    }

    #[test]
    fn aggregates_coerce_numeric_scalars() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![spec! { "count" => "12" }]));
        assert_eq!(db.count("users", None).unwrap(), 12);
        assert_eq!(
            handle.statements()[0].sql,
            "SELECT COUNT(*) FROM \"users\""
        );

        handle.push_result(MockResult::rows(vec![spec! { "avg" => "20.5" }]));
        assert_eq!(
            db.avg("users", "age", None).unwrap(),
            Some(Value::Float(20.5))
        );
    }

    #[test]
    fn prefix_applies_to_every_table_reference() {
        let (driver, handle) = MockDriver::new();
        let mut db = Database::open(
            driver,
            Options::new(Dialect::MySql).prefix("app_"),
        )
        .unwrap();
        db.select("users", "*", Some(&spec! { "users.id[>]" => 5 }))
            .unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "SELECT * FROM `app_users` WHERE `app_users`.`id` > :p0"
        );
    }

    #[test]
    fn invalid_prefix_is_a_config_error() {
        let (driver, _handle) = MockDriver::new();
        let err =
            Database::open(driver, Options::new(Dialect::MySql).prefix("bad prefix")).unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn execution_failure_fills_the_error_slot() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::error("relation \"users\" does not exist"));
        let err = db.select("users", "*", None).unwrap_err();
        assert!(err.is_execution());
        assert_eq!(db.error(), Some("relation \"users\" does not exist"));
    }

    #[test]
    fn debug_mode_consumes_exactly_one_call() {
        let (mut db, handle) = open(Dialect::Postgres);
        let out = db
            .debug()
            .select("users", "*", Some(&spec! { "name" => "ann" }))
            .unwrap();
        assert_eq!(out, Value::Seq(Vec::new()));
        // Nothing reached the driver; the rendered SQL is inspectable.
        assert!(handle.statements().is_empty());
        assert_eq!(
            db.last().unwrap(),
            "SELECT * FROM \"users\" WHERE \"name\" = 'ann'"
        );

        // The next call executes normally.
        db.select("users", "*", None).unwrap();
        assert_eq!(handle.statements().len(), 1);
    }

    #[test]
    fn log_retention_follows_the_logging_flag() {
        let (driver, _handle) = MockDriver::new();
        let mut db = Database::open(driver, Options::new(Dialect::Postgres)).unwrap();
        db.select("users", "*", None).unwrap();
        db.select("posts", "*", None).unwrap();
        assert_eq!(db.log().len(), 1);
        assert_eq!(db.last().unwrap(), "SELECT * FROM \"posts\"");

        let (driver, _handle) = MockDriver::new();
        let mut db =
            Database::open(driver, Options::new(Dialect::Postgres).logging(true)).unwrap();
        db.select("users", "*", None).unwrap();
        db.select("posts", "*", None).unwrap();
        assert_eq!(db.log().len(), 2);
    }

    #[test]
    fn action_commits_on_ok() {
        let (mut db, handle) = open(Dialect::Postgres);
        let value = db
            .action(|db| {
                db.insert("users", spec! { "name" => "ann" })?;
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(handle.transactions(), vec!["BEGIN", "COMMIT"]);
    }

    #[test]
    fn action_rolls_back_on_err() {
        let (mut db, handle) = open(Dialect::Postgres);
        let err = db
            .action(|_db| -> DbResult<()> { Err(DbError::compile("abort")) })
            .unwrap_err();
        assert!(err.is_compile());
        assert_eq!(handle.transactions(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn nested_actions_are_rejected() {
        let (mut db, handle) = open(Dialect::Postgres);
        let err = db
            .action(|db| db.action(|_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, DbError::Transaction(_)));
        // The outer transaction still rolled back.
        assert_eq!(handle.transactions(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn raw_query_resolves_markers_and_params() {
        let (mut db, handle) = open(Dialect::Postgres);
        handle.push_result(MockResult::rows(vec![spec! { "n" => 1 }]));
        let raw = Raw::new("SELECT COUNT(*) AS n FROM <users> WHERE <age> > :min").bind("min", 18);
        db.query(&raw).unwrap();
        assert_eq!(
            handle.last_sql().unwrap(),
            "SELECT COUNT(*) AS n FROM \"users\" WHERE \"age\" > :min"
        );
        assert_eq!(handle.statements()[0].binds[0].0, "min");
    }

    #[test]
    fn placeholder_names_are_unique_across_statements() {
        let (mut db, handle) = open(Dialect::Postgres);
        db.select("users", "*", Some(&spec! { "a" => 1 })).unwrap();
        db.select("users", "*", Some(&spec! { "b" => 2 })).unwrap();
        let statements = handle.statements();
        assert_eq!(statements[0].binds[0].0, "p0");
        assert_eq!(statements[1].binds[0].0, "p1");
    }
}
