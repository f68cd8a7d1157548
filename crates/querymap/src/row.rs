//! The result mapper.
//!
//! Walks the column specification against each fetched row, applying the
//! declared type casts and re-nesting flattened keys into the structure the
//! spec implies. Decoding the same row through the same column map twice
//! yields identical output; SQL NULL passes through untouched regardless of
//! the declared tag.

use crate::driver::Row;
use crate::error::{DbError, DbResult};
use crate::projection::{ColumnMap, SpecShape, build_column_map, spec_shape};
use crate::syntax::{Cast, ColumnRef, parse_column_ref};
use crate::value::{Map, Value};

/// Decode fetched rows into the output shape implied by the column spec.
///
/// - `*` projections pass rows through unchanged;
/// - a single-column spec flattens to a list of that column's values;
/// - a single root grouping key produces a mapping keyed by that column's
///   raw value;
/// - anything else produces a list of (possibly nested) records.
pub(crate) fn map_rows(spec: &Value, rows: Vec<Row>) -> DbResult<Value> {
    let shape = spec_shape(spec)?;
    let column_map = build_column_map(spec)?;
    match shape {
        SpecShape::Star => Ok(Value::Seq(rows.into_iter().map(Value::Map).collect())),
        SpecShape::SingleColumn(column) => {
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(map_leaf(&column, &column_map, row)?);
            }
            Ok(Value::Seq(out))
        }
        SpecShape::IndexByKey(key) => {
            let inner = spec
                .as_map()
                .and_then(|m| m.first())
                .map(|(_, inner)| inner)
                .ok_or_else(|| DbError::compile("malformed index-by-key column spec"))?;
            let mut out = Map::new();
            for row in &rows {
                let raw_key = row.get(key.row_key()).cloned().unwrap_or(Value::Null);
                let record = map_record(inner, &column_map, row)?;
                out.insert(index_key(&raw_key), record);
            }
            Ok(Value::Map(out))
        }
        SpecShape::Records => {
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(map_record(spec, &column_map, row)?);
            }
            Ok(Value::Seq(out))
        }
    }
}

/// Render the grouping column's raw value as a map key.
fn index_key(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Null => String::new(),
        other => format!("{other:?}"),
    }
}

/// Decode one row against a (possibly nested) column spec.
fn map_record(spec: &Value, column_map: &ColumnMap, row: &Row) -> DbResult<Value> {
    let mut record = Map::new();
    fill_record(spec, column_map, row, &mut record)?;
    Ok(Value::Map(record))
}

fn fill_record(
    spec: &Value,
    column_map: &ColumnMap,
    row: &Row,
    record: &mut Map,
) -> DbResult<()> {
    match spec {
        Value::Str(reference) => {
            let column = parse_column_ref(reference)?;
            record.insert(
                column.row_key().to_string(),
                map_leaf(&column, column_map, row)?,
            );
            Ok(())
        }
        Value::Seq(entries) => {
            for entry in entries {
                match entry {
                    Value::Str(reference) => {
                        let column = parse_column_ref(reference)?;
                        record.insert(
                            column.row_key().to_string(),
                            map_leaf(&column, column_map, row)?,
                        );
                    }
                    Value::Map(map) if map.len() == 1 => {
                        let (key, inner) = map.first().expect("len checked");
                        match inner {
                            Value::Seq(_) | Value::Map(_) => {
                                record.insert(
                                    key.clone(),
                                    map_record(inner, column_map, row)?,
                                );
                            }
                            Value::Raw(_) => {
                                let column = parse_column_ref(key)?;
                                record.insert(
                                    column.row_key().to_string(),
                                    map_leaf(&column, column_map, row)?,
                                );
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
                Value::Raw(_) => {
                    let column = parse_column_ref(key)?;
                    record.insert(
                        column.row_key().to_string(),
                        map_leaf(&column, column_map, row)?,
                    );
                    Ok(())
                }
                _ => fill_record(inner, column_map, row, record),
            }
        }
        _ => Err(DbError::compile("unsupported column specification")),
    }
}

fn map_leaf(column: &ColumnRef, column_map: &ColumnMap, row: &Row) -> DbResult<Value> {
    let row_key = column.row_key();
    let cast = column_map
        .get(row_key)
        .map(|(_, cast)| *cast)
        .unwrap_or(column.cast);
    let value = row.get(row_key).cloned().unwrap_or(Value::Null);
    apply_cast(row_key, cast, value)
}

/// Apply a declared type tag to a fetched value. NULL always passes through.
fn apply_cast(column: &str, cast: Option<Cast>, value: Value) -> DbResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let Some(cast) = cast else {
        return Ok(value);
    };
    match cast {
        Cast::String => Ok(value),
        Cast::Int => match &value {
            Value::Int(_) => Ok(value),
            Value::Float(f) => Ok(Value::Int(*f as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Str(s) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| DbError::decode(column, format!("'{s}' is not an integer"))),
            _ => Err(DbError::decode(column, "value is not an integer")),
        },
        Cast::Number => value
            .coerce_f64()
            .map(Value::Float)
            .ok_or_else(|| DbError::decode(column, "value is not numeric")),
        Cast::Bool => match &value {
            Value::Bool(_) => Ok(value),
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            Value::Str(s) => match s.as_str() {
                "1" | "t" | "true" => Ok(Value::Bool(true)),
                "0" | "f" | "false" => Ok(Value::Bool(false)),
                _ => Err(DbError::decode(column, format!("'{s}' is not a boolean"))),
            },
            _ => Err(DbError::decode(column, "value is not a boolean")),
        },
        Cast::Object | Cast::Json => match &value {
            Value::Str(text) => serde_json::from_str::<serde_json::Value>(text)
                .map(Value::from_json)
                .map_err(|e| DbError::decode(column, e.to_string())),
            // Drivers that decode structured columns natively hand the tree
            // straight through.
            Value::Map(_) | Value::Seq(_) => Ok(value),
            _ => Err(DbError::decode(column, "value is not a serialized object")),
        },
    }
}
