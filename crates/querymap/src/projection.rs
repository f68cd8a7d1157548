//! The column projector.
//!
//! Expands a column specification into the SELECT list and, from the same
//! spec, builds the [`ColumnMap`] the result mapper consumes for every row.
//! Both walks see identical structure, so the map's key set always matches
//! the query's output columns.

use crate::bind::ParamBag;
use crate::error::{DbError, DbResult};
use crate::ident::Quoter;
use crate::syntax::{Cast, ColumnRef, parse_column_ref};
use crate::value::Value;

/// Per-query lookup from a projected row key to its output key and decode
/// type. Built once per query and reused for every fetched row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    entries: indexmap::IndexMap<String, (String, Option<Cast>)>,
}

impl ColumnMap {
    pub fn get(&self, row_key: &str) -> Option<&(String, Option<Cast>)> {
        self.entries.get(row_key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert_ref(&mut self, column: &ColumnRef) {
        self.entries
            .insert(column.row_key().to_string(), (column.row_key().to_string(), column.cast));
    }
}

/// The overall result shape implied by a column specification.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecShape {
    /// `*` (or a `table.*` passthrough): raw rows, no mapping.
    Star,
    /// A single non-`*` column string: flattened to a list of values.
    SingleColumn(ColumnRef),
    /// A single grouping key with a nested spec: rows become a mapping keyed
    /// by the grouping column's raw value.
    IndexByKey(ColumnRef),
    /// Everything else: a list of (possibly nested) records.
    Records,
}

/// Classify the result shape of a column spec.
pub fn spec_shape(spec: &Value) -> DbResult<SpecShape> {
    match spec {
        Value::Str(s) if s == "*" || s.ends_with(".*") => Ok(SpecShape::Star),
        Value::Str(s) => Ok(SpecShape::SingleColumn(parse_column_ref(s)?)),
        Value::Seq(entries) => {
            let has_star = entries
                .iter()
                .any(|e| matches!(e, Value::Str(s) if s == "*" || s.ends_with(".*")));
            Ok(if has_star {
                SpecShape::Star
            } else {
                SpecShape::Records
            })
        }
        Value::Map(map) if map.len() == 1 => {
            let (key, inner) = map.first().expect("len checked");
            match inner {
                Value::Seq(_) | Value::Map(_) => Ok(SpecShape::IndexByKey(parse_column_ref(key)?)),
                _ => Ok(SpecShape::Records),
            }
        }
        Value::Map(_) => Ok(SpecShape::Records),
        _ => Err(DbError::compile("unsupported column specification")),
    }
}

/// Expand a column spec into the SELECT column list.
///
/// `is_join` rejects `table.*`, which is ambiguous against the other joined
/// tables.
pub fn project(
    spec: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
    is_join: bool,
) -> DbResult<String> {
    let mut columns = Vec::new();
    project_into(spec, quoter, bag, is_join, true, &mut columns)?;
    if columns.is_empty() {
        return Err(DbError::compile("empty column specification"));
    }
    Ok(columns.join(", "))
}

fn project_into(
    spec: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
    is_join: bool,
    is_root: bool,
    out: &mut Vec<String>,
) -> DbResult<()> {
    match spec {
        Value::Str(s) => {
            out.push(render_column(s, quoter, is_join)?);
            Ok(())
        }
        Value::Seq(entries) => {
            for entry in entries {
                match entry {
                    Value::Str(s) => out.push(render_column(s, quoter, is_join)?),
                    Value::Map(map) if map.len() == 1 => {
                        let (key, inner) = map.first().expect("len checked");
                        match inner {
                            // Dotted-namespace grouping: only the children
                            // are selected; the key shapes the output.
                            Value::Seq(_) | Value::Map(_) => {
                                project_into(inner, quoter, bag, is_join, false, out)?;
                            }
                            Value::Raw(raw) => {
                                out.push(render_raw_column(key, raw, quoter, bag)?);
                            }
                            _ => {
                                return Err(DbError::compile(format!(
                                    "column group '{key}' requires a nested spec or raw fragment"
                                )));
                            }
                        }
                    }
                    _ => {
                        return Err(DbError::compile(
                            "column spec entries must be strings or single-key maps",
                        ));
                    }
                }
            }
            Ok(())
        }
        Value::Map(map) if map.len() == 1 => {
            let (key, inner) = map.first().expect("len checked");
            match inner {
                // The single top-level grouping key is itself selected,
                // alongside the nested columns it groups; a non-root group
                // only selects its children.
                Value::Seq(_) | Value::Map(_) => {
                    if is_root {
                        out.push(render_column(key, quoter, is_join)?);
                    }
                    project_into(inner, quoter, bag, is_join, false, out)
                }
                Value::Raw(raw) => {
                    out.push(render_raw_column(key, raw, quoter, bag)?);
                    Ok(())
                }
                _ => Err(DbError::compile(format!(
                    "column group '{key}' requires a nested spec or raw fragment"
                ))),
            }
        }
        _ => Err(DbError::compile("unsupported column specification")),
    }
}

fn render_column(reference: &str, quoter: &Quoter, is_join: bool) -> DbResult<String> {
    if reference == "*" {
        return Ok("*".to_string());
    }
    if let Some(table) = reference.strip_suffix(".*") {
        if is_join {
            return Err(DbError::compile(format!(
                "'{reference}' is ambiguous in a join projection"
            )));
        }
        return Ok(format!("{}.*", quoter.quote_table(table)?));
    }
    let column = parse_column_ref(reference)?;
    let mut sql = quoter.quote_column(&column.path)?;
    if let Some(alias) = &column.alias {
        sql.push_str(" AS ");
        sql.push_str(&quoter.quote_alias(alias)?);
    }
    Ok(sql)
}

/// A raw fragment projected under a caller-chosen name (which may carry its
/// own type tag): `<expr> AS "name"`.
fn render_raw_column(
    key: &str,
    raw: &crate::raw::Raw,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    let column = parse_column_ref(key)?;
    bag.absorb_raw(raw)?;
    Ok(format!(
        "{} AS {}",
        raw.splice(quoter)?,
        quoter.quote_alias(column.row_key())?
    ))
}

/// Build the column map from the same spec used to generate the SELECT list.
///
/// `*` projections produce an empty map; the mapper passes those rows
/// through unchanged.
pub fn build_column_map(spec: &Value) -> DbResult<ColumnMap> {
    let mut map = ColumnMap::default();
    if !matches!(spec_shape(spec)?, SpecShape::Star) {
        collect_into(spec, true, &mut map)?;
    }
    Ok(map)
}

fn collect_into(spec: &Value, is_root: bool, out: &mut ColumnMap) -> DbResult<()> {
    match spec {
        Value::Str(s) => {
            out.insert_ref(&parse_column_ref(s)?);
            Ok(())
        }
        Value::Seq(entries) => {
            for entry in entries {
                match entry {
                    Value::Str(s) => out.insert_ref(&parse_column_ref(s)?),
                    Value::Map(map) if map.len() == 1 => {
                        let (key, inner) = map.first().expect("len checked");
                        match inner {
                            Value::Seq(_) | Value::Map(_) => collect_into(inner, false, out)?,
                            Value::Raw(_) => out.insert_ref(&parse_column_ref(key)?),
                            _ => {
                                return Err(DbError::compile(format!(
                                    "column group '{key}' requires a nested spec or raw fragment"
                                )));
                            }
                        }
                    }
                    _ => {
                        return Err(DbError::compile(
                            "column spec entries must be strings or single-key maps",
                        ));
                    }
                }
            }
            Ok(())
        }
        Value::Map(map) if map.len() == 1 => {
            let (key, inner) = map.first().expect("len checked");
            match inner {
                Value::Seq(_) | Value::Map(_) => {
                    if is_root {
                        out.insert_ref(&parse_column_ref(key)?);
                    }
                    collect_into(inner, false, out)
                }
                Value::Raw(_) => {
                    out.insert_ref(&parse_column_ref(key)?);
                    Ok(())
                }
                _ => Err(DbError::compile(format!(
                    "column group '{key}' requires a nested spec or raw fragment"
                ))),
            }
        }
        _ => Err(DbError::compile("unsupported column specification")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::raw::Raw;
    use crate::{seq, spec};

    fn quoter() -> Quoter {
        Quoter::new(Dialect::Postgres, "")
    }

    fn project_sql(spec: &Value) -> String {
        let mut bag = ParamBag::new();
        project(spec, &quoter(), &mut bag, false).unwrap()
    }

    #[test]
    fn star_passthrough() {
        assert_eq!(project_sql(&Value::from("*")), "*");
        assert!(build_column_map(&Value::from("*")).unwrap().is_empty());
    }

    #[test]
    fn plain_aliased_and_typed_columns() {
        let cols = seq!["id[Int]", "users.name(nickname)", "email"];
        assert_eq!(
            project_sql(&cols),
            "\"id\", \"users\".\"name\" AS \"nickname\", \"email\""
        );
        let map = build_column_map(&cols).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("id").unwrap().1, Some(Cast::Int));
        assert_eq!(map.get("nickname").unwrap().0, "nickname");
    }

    #[test]
    fn nested_group_projects_children_only() {
        let cols = seq![
            "name",
            Value::Map(spec! { "meta" => seq!["city", "country"] }),
        ];
        assert_eq!(project_sql(&cols), "\"name\", \"city\", \"country\"");
        let map = build_column_map(&cols).unwrap();
        assert!(map.get("meta").is_none());
        assert!(map.get("city").is_some());
    }

    #[test]
    fn root_grouping_key_is_selected() {
        let cols = Value::Map(spec! { "user_id" => seq!["name", "email"] });
        assert_eq!(project_sql(&cols), "\"user_id\", \"name\", \"email\"");
        assert_eq!(
            spec_shape(&cols).unwrap(),
            SpecShape::IndexByKey(parse_column_ref("user_id").unwrap())
        );
    }

    #[test]
    fn raw_columns_alias_into_the_output() {
        let cols = seq![
            "id",
            Value::Map(spec! { "total[Int]" => Raw::new("SUM(<amount>)") }),
        ];
        assert_eq!(project_sql(&cols), "\"id\", SUM(\"amount\") AS \"total\"");
        let map = build_column_map(&cols).unwrap();
        assert_eq!(map.get("total").unwrap().1, Some(Cast::Int));
    }

    #[test]
    fn table_star_rejected_in_joins() {
        let cols = seq!["users.*"];
        let mut bag = ParamBag::new();
        assert!(project(&cols, &quoter(), &mut bag, true).is_err());
        assert!(project(&cols, &quoter(), &mut bag, false).is_ok());
    }

    #[test]
    fn single_column_shape_flattens() {
        assert_eq!(
            spec_shape(&Value::from("name")).unwrap(),
            SpecShape::SingleColumn(parse_column_ref("name").unwrap())
        );
        assert_eq!(spec_shape(&seq!["name"]).unwrap(), SpecShape::Records);
    }

    #[test]
    fn empty_spec_is_rejected() {
        let mut bag = ParamBag::new();
        assert!(project(&Value::Seq(vec![]), &quoter(), &mut bag, false).is_err());
    }
}
