//! The condition compiler.
//!
//! Turns a nested condition tree into a boolean SQL expression plus a flat
//! bag of named bind parameters. Clause order follows the insertion order of
//! the input map. Every value requiring a bind receives a fresh placeholder;
//! sequences expand to one placeholder per element.

use crate::bind::ParamBag;
use crate::error::{DbError, DbResult};
use crate::ident::Quoter;
use crate::syntax::{
    CmpOp, ConditionKey, Relation, parse_column_compare, parse_condition_key,
};
use crate::value::{Map, Value};

/// Compile a condition tree joined by `AND` at the top level.
///
/// Returns an empty string for an empty tree; the caller omits the WHERE
/// keyword in that case.
pub fn compile(tree: &Map, quoter: &Quoter, bag: &mut ParamBag) -> DbResult<String> {
    compile_group(tree, Relation::And, quoter, bag)
}

fn compile_group(
    tree: &Map,
    relation: Relation,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    let mut parts = Vec::with_capacity(tree.len());
    for (key, value) in tree {
        parts.push(compile_entry(key, value, quoter, bag)?);
    }
    Ok(parts.join(relation.joiner()))
}

fn compile_entry(
    key: &str,
    value: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    match parse_condition_key(key)? {
        ConditionKey::Relation(relation) => compile_relation(key, relation, value, quoter, bag),
        ConditionKey::Positional(_) => {
            let compare = value
                .as_str()
                .ok_or_else(|| {
                    DbError::compile(format!(
                        "positional key '{key}' requires a column comparison string"
                    ))
                })
                .and_then(parse_column_compare)?;
            Ok(format!(
                "{} {} {}",
                quoter.quote_column(&compare.left)?,
                compare.operator,
                quoter.quote_column(&compare.right)?
            ))
        }
        ConditionKey::Column { column, op } => {
            let quoted = quoter.quote_column(&column)?;
            compile_comparison(&column, &quoted, op, value, quoter, bag)
        }
    }
}

/// An `AND`/`OR` key: a sequence of sub-trees is parenthesized per sub-tree
/// and joined by the relation; a single map is an inline group joined by it.
fn compile_relation(
    key: &str,
    relation: Relation,
    value: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    match value {
        Value::Seq(subtrees) => {
            let mut parts = Vec::with_capacity(subtrees.len());
            for subtree in subtrees {
                let map = subtree.as_map().ok_or_else(|| {
                    DbError::compile(format!("'{key}' sequence entries must be condition trees"))
                })?;
                parts.push(format!("({})", compile_group(map, Relation::And, quoter, bag)?));
            }
            Ok(format!("({})", parts.join(relation.joiner())))
        }
        Value::Map(subtree) => Ok(format!(
            "({})",
            compile_group(subtree, relation, quoter, bag)?
        )),
        _ => Err(DbError::compile(format!(
            "'{key}' requires a nested condition tree"
        ))),
    }
}

fn compile_comparison(
    column: &str,
    quoted: &str,
    op: CmpOp,
    value: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    match op {
        CmpOp::Eq => compile_equality(quoted, value, false, quoter, bag),
        CmpOp::Not => compile_equality(quoted, value, true, quoter, bag),
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
            let operator = match op {
                CmpOp::Gt => ">",
                CmpOp::Ge => ">=",
                CmpOp::Lt => "<",
                CmpOp::Le => "<=",
                _ => unreachable!(),
            };
            match value {
                Value::Raw(raw) => {
                    bag.absorb_raw(raw)?;
                    Ok(format!("{quoted} {operator} {}", raw.splice(quoter)?))
                }
                Value::Null | Value::Seq(_) | Value::Map(_) => Err(DbError::compile(format!(
                    "'{column}[{operator}]' requires a scalar or raw value"
                ))),
                other => Ok(format!("{quoted} {operator} {}", bag.bind(other)?)),
            }
        }
        CmpOp::Between | CmpOp::NotBetween => {
            let ends = value.as_seq().filter(|s| s.len() == 2).ok_or_else(|| {
                DbError::compile(format!(
                    "'{column}' BETWEEN requires a two-element sequence"
                ))
            })?;
            let keyword = if op == CmpOp::Between {
                "BETWEEN"
            } else {
                "NOT BETWEEN"
            };
            let low = bag.bind(&ends[0])?;
            let high = bag.bind(&ends[1])?;
            Ok(format!("{quoted} {keyword} {low} AND {high}"))
        }
        CmpOp::Like | CmpOp::NotLike => {
            compile_like(column, quoted, op == CmpOp::NotLike, value, quoter, bag)
        }
        CmpOp::Regexp => {
            let token = bag.bind(value)?;
            Ok(quoter.dialect().regexp_condition(quoted, &token))
        }
    }
}

/// No-operator and `[!]` forms: the value's shape selects `=`/`!=`, IN/NOT
/// IN, IS [NOT] NULL, or a raw splice.
fn compile_equality(
    quoted: &str,
    value: &Value,
    negated: bool,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    match value {
        Value::Null => Ok(format!(
            "{quoted} IS {}NULL",
            if negated { "NOT " } else { "" }
        )),
        Value::Raw(raw) => {
            bag.absorb_raw(raw)?;
            Ok(format!(
                "{quoted} {} {}",
                if negated { "!=" } else { "=" },
                raw.splice(quoter)?
            ))
        }
        Value::Seq(items) => {
            // An empty list can match (or exclude) nothing.
            if items.is_empty() {
                return Ok(if negated { "1=1" } else { "1=0" }.to_string());
            }
            let mut tokens = Vec::with_capacity(items.len());
            for item in items {
                tokens.push(bag.bind(item)?);
            }
            Ok(format!(
                "{quoted} {}IN ({})",
                if negated { "NOT " } else { "" },
                tokens.join(",")
            ))
        }
        other => Ok(format!(
            "{quoted} {} {}",
            if negated { "!=" } else { "=" },
            bag.bind(other)?
        )),
    }
}

fn compile_like(
    column: &str,
    quoted: &str,
    negated: bool,
    value: &Value,
    quoter: &Quoter,
    bag: &mut ParamBag,
) -> DbResult<String> {
    let keyword = if negated { "NOT LIKE" } else { "LIKE" };

    if let Value::Raw(raw) = value {
        bag.absorb_raw(raw)?;
        return Ok(format!("{quoted} {keyword} {}", raw.splice(quoter)?));
    }

    // Candidate patterns plus the relation joining them: a bare sequence is
    // OR-joined; a map with a single AND/OR key selects the relation itself.
    let (candidates, relation): (&[Value], Relation) = match value {
        Value::Seq(items) => (items, Relation::Or),
        Value::Map(map) if map.len() == 1 => {
            let (key, inner) = map.first().expect("len checked");
            match parse_condition_key(key)? {
                ConditionKey::Relation(relation) => {
                    let items = inner.as_seq().ok_or_else(|| {
                        DbError::compile(format!(
                            "'{column}[~]' relation group requires a sequence of patterns"
                        ))
                    })?;
                    (items, relation)
                }
                _ => {
                    return Err(DbError::compile(format!(
                        "'{column}[~]' does not accept nested condition trees"
                    )));
                }
            }
        }
        single => (std::slice::from_ref(single), Relation::Or),
    };
    if candidates.is_empty() {
        return Err(DbError::compile(format!(
            "'{column}[~]' requires at least one pattern"
        )));
    }

    let mut parts = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let pattern = like_pattern(column, candidate)?;
        let token = bag.bind(&Value::Str(pattern))?;
        parts.push(format!("{quoted} {keyword} {token}"));
    }
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(format!("({})", parts.join(relation.joiner())))
    }
}

/// Auto-wrap a candidate with `%…%` unless it already carries a wildcard or
/// character-class token of its own.
fn like_pattern(column: &str, candidate: &Value) -> DbResult<String> {
    let text = match candidate {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        _ => {
            return Err(DbError::compile(format!(
                "'{column}[~]' patterns must be strings or numbers"
            )));
        }
    };
    if text.contains(['%', '_', '[', ']']) {
        Ok(text)
    } else {
        Ok(format!("%{text}%"))
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

    fn compile_one(tree: &Map) -> (String, usize) {
        let mut bag = ParamBag::new();
        let sql = compile(tree, &quoter(), &mut bag).unwrap();
        (sql, bag.len())
    }

    #[test]
    fn equality_and_order_follow_insertion() {
        let tree = spec! { "status" => "active", "age[>]" => 21 };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "\"status\" = :p0 AND \"age\" > :p1");
        assert_eq!(n, 2);
    }

    #[test]
    fn null_values_compile_to_is_null() {
        let tree = spec! { "deleted_at" => Value::Null };
        assert_eq!(compile_one(&tree).0, "\"deleted_at\" IS NULL");

        let tree = spec! { "deleted_at[!]" => Value::Null };
        assert_eq!(compile_one(&tree).0, "\"deleted_at\" IS NOT NULL");
    }

    #[test]
    fn in_and_not_in() {
        let tree = spec! { "status" => seq!["a", "b"] };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "\"status\" IN (:p0,:p1)");
        assert_eq!(n, 2);

        let tree = spec! { "status[!]" => seq!["a", "b"] };
        assert_eq!(compile_one(&tree).0, "\"status\" NOT IN (:p0,:p1)");
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let tree = spec! { "id" => Value::Seq(vec![]) };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "1=0");
        assert_eq!(n, 0);
    }

    #[test]
    fn between_uses_two_placeholders() {
        let tree = spec! { "age[><]" => seq![18, 30] };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "\"age\" NOT BETWEEN :p0 AND :p1");
        assert_eq!(n, 2);

        let tree = spec! { "age[<>]" => seq![18, 30] };
        assert_eq!(compile_one(&tree).0, "\"age\" BETWEEN :p0 AND :p1");
    }

    #[test]
    fn between_requires_a_pair() {
        let tree = spec! { "age[<>]" => seq![18] };
        let mut bag = ParamBag::new();
        assert!(compile(&tree, &quoter(), &mut bag).is_err());
    }

    #[test]
    fn nested_and_or_preserves_parenthesization() {
        let tree = spec! {
            "AND" => Value::Map(spec! {
                "a" => 1,
                "OR" => seq![Value::Map(spec! { "b" => 2 }), Value::Map(spec! { "c" => 3 })],
            }),
        };
        let (sql, n) = compile_one(&tree);
        assert_eq!(
            sql,
            "(\"a\" = :p0 AND ((\"b\" = :p1) OR (\"c\" = :p2)))"
        );
        assert_eq!(n, 3);
    }

    #[test]
    fn relation_comments_allow_sibling_groups() {
        let tree = spec! {
            "OR #young" => Value::Map(spec! { "age[<]" => 18 }),
            "OR #old" => Value::Map(spec! { "age[>]" => 65 }),
        };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "(\"age\" < :p0) AND (\"age\" > :p1)");
        assert_eq!(n, 2);
    }

    #[test]
    fn like_auto_wraps_plain_values() {
        let tree = spec! { "name[~]" => "bob" };
        let mut bag = ParamBag::new();
        let sql = compile(&tree, &quoter(), &mut bag).unwrap();
        assert_eq!(sql, "\"name\" LIKE :p0");
        assert_eq!(
            bag.params()[0].1.value,
            Value::Str("%bob%".to_string())
        );
    }

    #[test]
    fn like_keeps_explicit_wildcards() {
        let tree = spec! { "name[~]" => "bo%" };
        let mut bag = ParamBag::new();
        compile(&tree, &quoter(), &mut bag).unwrap();
        assert_eq!(bag.params()[0].1.value, Value::Str("bo%".to_string()));
    }

    #[test]
    fn like_multiple_values_join_with_or() {
        let tree = spec! { "name[~]" => seq!["ann", "bob"] };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "(\"name\" LIKE :p0 OR \"name\" LIKE :p1)");
        assert_eq!(n, 2);
    }

    #[test]
    fn like_relation_group_joins_with_and() {
        let tree = spec! {
            "name[!~]" => Value::Map(spec! { "AND" => seq!["spam", "test"] }),
        };
        let (sql, _) = compile_one(&tree);
        assert_eq!(sql, "(\"name\" NOT LIKE :p0 AND \"name\" NOT LIKE :p1)");
    }

    #[test]
    fn positional_keys_compare_columns() {
        let tree = spec! { "0" => "posts.user_id[=]users.id" };
        let (sql, n) = compile_one(&tree);
        assert_eq!(sql, "\"posts\".\"user_id\" = \"users\".\"id\"");
        assert_eq!(n, 0);
    }

    #[test]
    fn raw_fragments_splice_with_their_params() {
        let tree = spec! {
            "created_at[>]" => Raw::new("NOW() - INTERVAL :days DAY").bind("days", 7),
        };
        let mut bag = ParamBag::new();
        let sql = compile(&tree, &quoter(), &mut bag).unwrap();
        assert_eq!(sql, "\"created_at\" > NOW() - INTERVAL :days DAY");
        assert_eq!(bag.params()[0].0, "days");
    }

    #[test]
    fn regexp_uses_dialect_operator() {
        let tree = spec! { "name[REGEXP]" => "^a" };
        let mut bag = ParamBag::new();
        let sql = compile(&tree, &Quoter::new(Dialect::MySql, ""), &mut bag).unwrap();
        assert_eq!(sql, "`name` REGEXP :p0");
    }

    #[test]
    fn malformed_operator_fails_loudly() {
        let tree = spec! { "age[%]" => 1 };
        let mut bag = ParamBag::new();
        let err = compile(&tree, &quoter(), &mut bag).unwrap_err();
        assert!(err.is_compile());
    }

    #[test]
    fn placeholder_count_matches_bindable_values() {
        let tree = spec! {
            "a" => 1,
            "b" => seq![1, 2, 3],
            "c[>]" => 4,
            "d[<>]" => seq![5, 6],
            "e" => Value::Null,
        };
        let (_, n) = compile_one(&tree);
        assert_eq!(n, 1 + 3 + 1 + 2);
    }
}
