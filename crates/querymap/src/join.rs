//! The join builder.
//!
//! Join-spec keys carry a direction token and the joined table
//! (`[>]contacts(profile)`); values select the join condition: a column name
//! or sequence becomes `USING (…)`, a map of column pairs becomes an `ON`
//! clause. In an `ON` pair, a dotted key names that side's fully-qualified
//! column while an undotted key names a column of the base table.

use crate::error::{DbError, DbResult};
use crate::ident::Quoter;
use crate::syntax::{TableRef, parse_join_key};
use crate::value::{Map, Value};

/// Build the `JOIN …` clauses for a join specification, in insertion order.
pub fn build(base: &TableRef, joins: &Map, quoter: &Quoter) -> DbResult<String> {
    let mut parts = Vec::with_capacity(joins.len());
    for (key, value) in joins {
        let join = parse_join_key(key)?;
        let mut sql = String::from(join.kind.keyword());
        sql.push(' ');
        sql.push_str(&quoter.quote_table(&join.table)?);
        if let Some(alias) = &join.alias {
            sql.push_str(" AS ");
            sql.push_str(&quoter.quote_alias(alias)?);
        }

        match value {
            Value::Str(column) => {
                sql.push_str(" USING (");
                sql.push_str(&quoter.quote_alias(column)?);
                sql.push(')');
            }
            Value::Seq(columns) => {
                let mut quoted = Vec::with_capacity(columns.len());
                for column in columns {
                    let name = column.as_str().ok_or_else(|| {
                        DbError::compile(format!("'{key}' USING list entries must be column names"))
                    })?;
                    quoted.push(quoter.quote_alias(name)?);
                }
                if quoted.is_empty() {
                    return Err(DbError::compile(format!("'{key}' USING list is empty")));
                }
                sql.push_str(" USING (");
                sql.push_str(&quoted.join(", "));
                sql.push(')');
            }
            Value::Map(pairs) => {
                if pairs.is_empty() {
                    return Err(DbError::compile(format!("'{key}' ON pairing is empty")));
                }
                let mut conditions = Vec::with_capacity(pairs.len());
                for (left, right) in pairs {
                    let right = right.as_str().ok_or_else(|| {
                        DbError::compile(format!("'{key}' ON values must be column names"))
                    })?;
                    conditions.push(format!(
                        "{} = {}",
                        side_column(left, base, quoter)?,
                        side_column(right, &joined_ref(&join.table, join.alias.as_deref()), quoter)?
                    ));
                }
                sql.push_str(" ON ");
                sql.push_str(&conditions.join(" AND "));
            }
            _ => {
                return Err(DbError::compile(format!(
                    "'{key}' requires a column, a column list, or an ON pairing"
                )));
            }
        }
        parts.push(sql);
    }
    Ok(parts.join(" "))
}

fn joined_ref(table: &str, alias: Option<&str>) -> TableRef {
    TableRef {
        name: table.to_string(),
        alias: alias.map(str::to_string),
    }
}

/// Qualify one side of an ON pair: dotted references stand on their own,
/// bare columns belong to `owner` (through its alias when it has one).
fn side_column(reference: &str, owner: &TableRef, quoter: &Quoter) -> DbResult<String> {
    if reference.contains('.') {
        return quoter.quote_column(reference);
    }
    match &owner.alias {
        Some(alias) => Ok(format!(
            "{}.{}",
            quoter.quote_alias(alias)?,
            quoter.quote_alias(reference)?
        )),
        None => quoter.quote_column(&format!("{}.{reference}", owner.name)),
    }
}
