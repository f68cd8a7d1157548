//! The clause assembler.
//!
//! Combines the WHERE condition tree with the reserved keys `GROUP`,
//! `HAVING`, `ORDER`, `LIMIT`, `LIKE`, and `MATCH` (case-sensitive, exact
//! match) into the dialect-correct statement suffix. All other keys of the
//! where-spec form the condition tree handed to the condition compiler.

use crate::bind::ParamBag;
use crate::condition;
use crate::error::{DbError, DbResult};
use crate::ident::Quoter;
use crate::value::{Map, Value};

const RESERVED: [&str; 6] = ["GROUP", "HAVING", "ORDER", "LIMIT", "LIKE", "MATCH"];

/// Assemble the statement suffix (starting with ` WHERE …` when any
/// condition exists) for a where-spec.
pub fn assemble(where_spec: &Map, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    let mut conditions = Map::new();
    for (key, value) in where_spec {
        if !RESERVED.contains(&key.as_str()) {
            conditions.insert(key.clone(), value.clone());
        }
    }

    let mut where_sql = condition::compile(&conditions, quoter, bag)?;

    if let Some(like) = where_spec.get("LIKE") {
        let like_sql = compile_like_group(like, quoter, bag)?;
        push_condition(&mut where_sql, &like_sql);
    }
    if let Some(match_spec) = where_spec.get("MATCH") {
        // MATCH … AGAINST only exists on MySQL; elsewhere the key
        // contributes nothing.
        if quoter.dialect().supports_match() {
            let match_sql = compile_match(match_spec, quoter, bag)?;
            push_condition(&mut where_sql, &match_sql);
        }
    }

    let mut sql = String::new();
    if !where_sql.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
    }

    if let Some(group) = where_spec.get("GROUP") {
        sql.push_str(" GROUP BY ");
        sql.push_str(&compile_group_by(group, quoter)?);
    }
    if let Some(having) = where_spec.get("HAVING") {
        sql.push_str(" HAVING ");
        sql.push_str(&compile_having(having, quoter, bag)?);
    }

    let mut has_order = false;
    if let Some(order) = where_spec.get("ORDER") {
        sql.push_str(" ORDER BY ");
        sql.push_str(&compile_order(order, quoter, bag)?);
        has_order = true;
    }

    if let Some(limit) = where_spec.get("LIMIT") {
        let (offset, count) = parse_limit(limit)?;
        if let Some(rendered) = quoter.dialect().render_limit(offset, count, has_order) {
            sql.push(' ');
            sql.push_str(&rendered);
        }
    }

    Ok(sql)
}

fn push_condition(where_sql: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !where_sql.is_empty() {
        where_sql.push_str(" AND ");
    }
    where_sql.push_str(fragment);
}

/// The reserved `LIKE` key: a map of column → pattern(s), every entry a
/// pattern match joined by AND.
fn compile_like_group(like: &Value, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    let entries = like
        .as_map()
        .ok_or_else(|| DbError::compile("'LIKE' requires a map of column => pattern"))?;
    let mut tree = Map::new();
    for (column, pattern) in entries {
        tree.insert(format!("{column}[~]"), pattern.clone());
    }
    condition::compile(&tree, quoter, bag)
}

/// `MATCH (columns) AGAINST (:p [mode])`, mode one of
/// natural / natural+query / boolean / query.
fn compile_match(spec: &Value, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    let map = spec
        .as_map()
        .ok_or_else(|| DbError::compile("'MATCH' requires a map with columns and keyword"))?;
    let columns = map
        .get("columns")
        .and_then(Value::as_seq)
        .ok_or_else(|| DbError::compile("'MATCH' requires a 'columns' sequence"))?;
    let keyword = map
        .get("keyword")
        .ok_or_else(|| DbError::compile("'MATCH' requires a 'keyword' value"))?;

    let mut quoted = Vec::with_capacity(columns.len());
    for column in columns {
        let name = column
            .as_str()
            .ok_or_else(|| DbError::compile("'MATCH' column entries must be names"))?;
        quoted.push(quoter.quote_column(name)?);
    }
    if quoted.is_empty() {
        return Err(DbError::compile("'MATCH' column list is empty"));
    }

    let mode = match map.get("mode") {
        None => "",
        Some(mode) => match mode.as_str() {
            Some("natural") => " IN NATURAL LANGUAGE MODE",
            Some("natural+query") => " IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION",
            Some("boolean") => " IN BOOLEAN MODE",
            Some("query") => " WITH QUERY EXPANSION",
            _ => return Err(DbError::compile("unknown 'MATCH' mode")),
        },
    };

    let token = bag.bind(keyword)?;
    Ok(format!(
        "MATCH ({}) AGAINST ({token}{mode})",
        quoted.join(", ")
    ))
}

fn compile_group_by(group: &Value, quoter: &Quoter) -> DbResult<String> {
    match group {
        Value::Str(column) => quoter.quote_column(column),
        Value::Seq(columns) => {
            let mut quoted = Vec::with_capacity(columns.len());
            for column in columns {
                let name = column
                    .as_str()
                    .ok_or_else(|| DbError::compile("'GROUP' entries must be column names"))?;
                quoted.push(quoter.quote_column(name)?);
            }
            if quoted.is_empty() {
                return Err(DbError::compile("'GROUP' column list is empty"));
            }
            Ok(quoted.join(", "))
        }
        _ => Err(DbError::compile("'GROUP' requires a column or column list")),
    }
}

fn compile_having(having: &Value, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    match having {
        Value::Map(tree) => condition::compile(tree, quoter, bag),
        Value::Raw(raw) => {
            bag.absorb_raw(raw)?;
            raw.splice(quoter)
        }
        _ => Err(DbError::compile("'HAVING' requires a condition tree")),
    }
}

fn compile_order(order: &Value, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    let mut parts = Vec::new();
    compile_order_into(order, quoter, bag, &mut parts)?;
    if parts.is_empty() {
        return Err(DbError::compile("'ORDER' specification is empty"));
    }
    Ok(parts.join(", "))
}

fn compile_order_into(
    order: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
    out: &mut Vec<String>,
) -> DbResult<()> {
    match order {
        Value::Str(column) => {
            out.push(quoter.quote_column(column)?);
            Ok(())
        }
        Value::Seq(entries) => {
            for entry in entries {
                compile_order_into(entry, quoter, bag, out)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            for (column, value) in entries {
                let quoted = quoter.quote_column(column)?;
                match value {
                    Value::Str(direction) => {
                        let direction = match direction.to_ascii_uppercase().as_str() {
                            "ASC" => "ASC",
                            "DESC" => "DESC",
                            _ => {
                                return Err(DbError::compile(format!(
                                    "'ORDER' direction for '{column}' must be ASC or DESC"
                                )));
                            }
                        };
                        out.push(format!("{quoted} {direction}"));
                    }
                    // Explicit ordering by enumerated values.
                    Value::Seq(values) => {
                        if values.is_empty() {
                            return Err(DbError::compile(format!(
                                "'ORDER' FIELD list for '{column}' is empty"
                            )));
                        }
                        let mut tokens = Vec::with_capacity(values.len());
                        for value in values {
                            tokens.push(bag.bind(value)?);
                        }
                        out.push(format!("FIELD({quoted}, {})", tokens.join(", ")));
                    }
                    _ => {
                        return Err(DbError::compile(format!(
                            "'ORDER' entry for '{column}' must be a direction or value list"
                        )));
                    }
                }
            }
            Ok(())
        }
        _ => Err(DbError::compile("unsupported 'ORDER' specification")),
    }
}

/// `LIMIT` accepts a single count or an `[offset, count]` pair.
fn parse_limit(limit: &Value) -> DbResult<(u64, u64)> {
    let as_u64 = |v: &Value| -> DbResult<u64> {
        match v {
            Value::Int(i) if *i >= 0 => Ok(*i as u64),
            _ => Err(DbError::compile("'LIMIT' values must be non-negative integers")),
        }
    };
    match limit {
        Value::Int(_) => Ok((0, as_u64(limit)?)),
        Value::Seq(pair) if pair.len() == 2 => Ok((as_u64(&pair[0])?, as_u64(&pair[1])?)),
        _ => Err(DbError::compile(
            "'LIMIT' requires a count or an [offset, count] pair",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::{seq, spec};

    fn assemble_with(dialect: Dialect, where_spec: &Map) -> String {
        let quoter = Quoter::new(dialect, "");
        let mut bag = ParamBag::new();
        assemble(where_spec, &quoter, &mut bag).unwrap()
    }

    #[test]
    fn empty_spec_renders_nothing() {
        assert_eq!(assemble_with(Dialect::Postgres, &Map::new()), "");
    }

    #[test]
    fn conditions_and_clauses_in_order() {
        let where_spec = spec! {
            "status" => "active",
            "GROUP" => "team",
            "HAVING" => Value::Map(spec! { "score[>]" => 10 }),
            "ORDER" => Value::Map(spec! { "score" => "DESC" }),
            "LIMIT" => 5,
        };
        assert_eq!(
            assemble_with(Dialect::Postgres, &where_spec),
            " WHERE \"status\" = :p0 GROUP BY \"team\" HAVING \"score\" > :p1 ORDER BY \"score\" DESC LIMIT 5"
        );
    }

    #[test]
    fn limit_offset_pair_differs_by_dialect() {
        let where_spec = spec! {
            "ORDER" => "id",
            "LIMIT" => seq![10, 5],
        };
        assert!(
            assemble_with(Dialect::Postgres, &where_spec).ends_with("LIMIT 5 OFFSET 10")
        );
        assert!(
            assemble_with(Dialect::Mssql, &where_spec)
                .ends_with("OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY")
        );
    }

    #[test]
    fn fetch_next_dropped_without_order_by() {
        let where_spec = spec! { "LIMIT" => 5 };
        assert_eq!(assemble_with(Dialect::Oracle, &where_spec), "");
        assert_eq!(assemble_with(Dialect::Sybase, &where_spec), "");
    }

    #[test]
    fn order_accepts_bare_and_field_forms() {
        let where_spec = spec! {
            "ORDER" => seq![
                Value::Map(spec! { "priority" => seq!["high", "medium", "low"] }),
                "created_at",
            ],
        };
        assert_eq!(
            assemble_with(Dialect::MySql, &where_spec),
            " ORDER BY FIELD(`priority`, :p0, :p1, :p2), `created_at`"
        );
    }

    #[test]
    fn match_emits_only_on_mysql() {
        let where_spec = spec! {
            "MATCH" => Value::Map(spec! {
                "columns" => seq!["title", "body"],
                "keyword" => "rust",
                "mode" => "boolean",
            }),
        };
        assert_eq!(
            assemble_with(Dialect::MySql, &where_spec),
            " WHERE MATCH (`title`, `body`) AGAINST (:p0 IN BOOLEAN MODE)"
        );
        assert_eq!(assemble_with(Dialect::Postgres, &where_spec), "");
    }

    #[test]
    fn match_modes() {
        for (mode, rendered) in [
            ("natural", " IN NATURAL LANGUAGE MODE"),
            ("natural+query", " IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION"),
            ("query", " WITH QUERY EXPANSION"),
        ] {
            let where_spec = spec! {
                "MATCH" => Value::Map(spec! {
                    "columns" => seq!["title"],
                    "keyword" => "x",
                    "mode" => mode,
                }),
            };
            let sql = assemble_with(Dialect::MySql, &where_spec);
            assert!(sql.ends_with(&format!("AGAINST (:p0{rendered})")), "{sql}");
        }
    }

    #[test]
    fn like_reserved_key_joins_with_and() {
        let where_spec = spec! {
            "status" => "active",
            "LIKE" => Value::Map(spec! { "name" => "bob" }),
        };
        assert_eq!(
            assemble_with(Dialect::Postgres, &where_spec),
            " WHERE \"status\" = :p0 AND \"name\" LIKE :p1"
        );
    }

    #[test]
    fn reserved_keys_are_case_sensitive() {
        // Lowercase "limit" is an ordinary column.
        let where_spec = spec! { "limit" => 3 };
        assert_eq!(
            assemble_with(Dialect::Postgres, &where_spec),
            " WHERE \"limit\" = :p0"
        );
    }

    #[test]
    fn negative_limit_is_rejected() {
        let where_spec = spec! { "LIMIT" => -1 };
        let quoter = Quoter::new(Dialect::Postgres, "");
        let mut bag = ParamBag::new();
        assert!(assemble(&where_spec, &quoter, &mut bag).is_err());
    }
}
