//! Parsers for the query-specification mini-language.
//!
//! Condition keys (`age[>=]`, `AND #group`), column references
//! (`users.name(alias)[Int]`), join keys (`[>]contacts(profile)`), and table
//! references (`accounts(a)`) each get one small hand-written parser that
//! produces a structured token. Every consumer works from these tokens; no
//! grammar is re-derived by pattern matching elsewhere. A key that matches
//! none of the recognized shapes is a [`DbError::Compile`], never silently
//! skipped.

use crate::error::{DbError, DbResult};
use crate::ident::{is_segment, split_reference};

/// Boolean relation of a nested condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    And,
    Or,
}

impl Relation {
    pub fn joiner(self) -> &'static str {
        match self {
            Relation::And => " AND ",
            Relation::Or => " OR ",
        }
    }
}

/// Comparison operator suffix of a condition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// No suffix: `=`, `IN`, `IS NULL`, or raw splice by value shape.
    Eq,
    /// `[!]`: negated forms of the above.
    Not,
    Gt,
    Ge,
    Lt,
    Le,
    /// `[<>]`
    Between,
    /// `[><]`
    NotBetween,
    /// `[~]`
    Like,
    /// `[!~]`
    NotLike,
    /// `[REGEXP]`
    Regexp,
}

/// A parsed condition-tree key.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKey {
    /// `AND` / `OR`, optionally suffixed with `#comment` for disambiguation.
    Relation(Relation),
    /// `column` or `column[op]`.
    Column { column: String, op: CmpOp },
    /// Integer key: the value holds a column-to-column comparison.
    Positional(usize),
}

/// Parse a condition-tree key into its structured form.
pub fn parse_condition_key(key: &str) -> DbResult<ConditionKey> {
    if let Some(relation) = parse_relation_key(key) {
        return Ok(ConditionKey::Relation(relation));
    }
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        let index = key
            .parse()
            .map_err(|_| DbError::compile(format!("positional key out of range: '{key}'")))?;
        return Ok(ConditionKey::Positional(index));
    }

    let (column, suffix) = match key.find('[') {
        Some(open) => {
            let close = key
                .rfind(']')
                .filter(|&close| close == key.len() - 1 && close > open)
                .ok_or_else(|| DbError::compile(format!("malformed condition key '{key}'")))?;
            (&key[..open], Some(&key[open + 1..close]))
        }
        None => (key, None),
    };
    split_reference(column)
        .map_err(|_| DbError::compile(format!("malformed condition key '{key}'")))?;

    let op = match suffix {
        None => CmpOp::Eq,
        Some(">") => CmpOp::Gt,
        Some(">=") => CmpOp::Ge,
        Some("<") => CmpOp::Lt,
        Some("<=") => CmpOp::Le,
        Some("!") => CmpOp::Not,
        Some("<>") => CmpOp::Between,
        Some("><") => CmpOp::NotBetween,
        Some("~") => CmpOp::Like,
        Some("!~") => CmpOp::NotLike,
        Some("REGEXP") => CmpOp::Regexp,
        Some(other) => {
            return Err(DbError::compile(format!(
                "unknown operator '[{other}]' in condition key '{key}'"
            )));
        }
    };
    Ok(ConditionKey::Column {
        column: column.to_string(),
        op,
    })
}

/// `AND` / `OR`, case-sensitive, optionally followed by whitespace and a
/// `#comment` (so one map can hold several groups with the same relation).
fn parse_relation_key(key: &str) -> Option<Relation> {
    let (word, rest) = key
        .find([' ', '\t', '#'])
        .map(|pos| (&key[..pos], key[pos..].trim_start()))
        .unwrap_or((key, ""));
    let relation = match word {
        "AND" => Relation::And,
        "OR" => Relation::Or,
        _ => return None,
    };
    if rest.is_empty() || rest.starts_with('#') {
        Some(relation)
    } else {
        None
    }
}

/// Decode type tag of a projected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    String,
    Bool,
    Int,
    Number,
    Object,
    Json,
}

impl Cast {
    fn parse(tag: &str) -> Option<Cast> {
        match tag {
            "String" => Some(Cast::String),
            "Bool" => Some(Cast::Bool),
            "Int" => Some(Cast::Int),
            "Number" => Some(Cast::Number),
            "Object" => Some(Cast::Object),
            "JSON" => Some(Cast::Json),
            _ => None,
        }
    }
}

/// A parsed column reference: `column`, `table.column`, optional `(alias)`,
/// optional `[Type]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub path: String,
    pub alias: Option<String>,
    pub cast: Option<Cast>,
}

impl ColumnRef {
    /// The key this column occupies in a fetched row: the alias when one is
    /// given, otherwise the column segment without its table.
    pub fn row_key(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('.').next().unwrap_or(&self.path),
        }
    }
}

/// Parse a column reference from a projection or key position.
pub fn parse_column_ref(input: &str) -> DbResult<ColumnRef> {
    let mut rest = input;
    let mut cast = None;
    if let Some(open) = rest.find('[') {
        let close = rest
            .rfind(']')
            .filter(|&close| close == rest.len() - 1 && close > open)
            .ok_or_else(|| DbError::compile(format!("malformed column reference '{input}'")))?;
        cast = Some(Cast::parse(&rest[open + 1..close]).ok_or_else(|| {
            DbError::compile(format!(
                "unknown type tag '[{}]' in column reference '{input}'",
                &rest[open + 1..close]
            ))
        })?);
        rest = &rest[..open];
    }

    let mut alias = None;
    if let Some(open) = rest.find('(') {
        let close = rest
            .rfind(')')
            .filter(|&close| close == rest.len() - 1 && close > open)
            .ok_or_else(|| DbError::compile(format!("malformed column reference '{input}'")))?;
        let name = &rest[open + 1..close];
        if !is_segment(name) {
            return Err(DbError::compile(format!(
                "invalid alias '({name})' in column reference '{input}'"
            )));
        }
        alias = Some(name.to_string());
        rest = &rest[..open];
    }

    split_reference(rest)
        .map_err(|_| DbError::compile(format!("malformed column reference '{input}'")))?;
    Ok(ColumnRef {
        path: rest.to_string(),
        alias,
        cast,
    })
}

/// Join direction encoded by the bracket token of a join-spec key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Right,
    Full,
    Inner,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Inner => "INNER JOIN",
        }
    }
}

/// A parsed join-spec key: `[>]table` with optional `(alias)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinKey {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
}

/// Parse a join-spec key.
pub fn parse_join_key(key: &str) -> DbResult<JoinKey> {
    let rest = key
        .strip_prefix('[')
        .ok_or_else(|| DbError::compile(format!("join key must start with a direction token: '{key}'")))?;
    let (token, rest) = rest
        .split_once(']')
        .ok_or_else(|| DbError::compile(format!("malformed join key '{key}'")))?;
    let kind = match token {
        ">" => JoinKind::Left,
        "<" => JoinKind::Right,
        "<>" => JoinKind::Full,
        "><" => JoinKind::Inner,
        other => {
            return Err(DbError::compile(format!(
                "unknown join direction '[{other}]' in '{key}'"
            )));
        }
    };
    let table = parse_table_ref(rest)
        .map_err(|_| DbError::compile(format!("malformed join key '{key}'")))?;
    Ok(JoinKey {
        kind,
        table: table.name,
        alias: table.alias,
    })
}

/// A parsed table reference: `table` with optional `(alias)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

/// Parse a table reference.
pub fn parse_table_ref(input: &str) -> DbResult<TableRef> {
    let (name, alias) = match input.find('(') {
        Some(open) => {
            let close = input
                .rfind(')')
                .filter(|&close| close == input.len() - 1 && close > open)
                .ok_or_else(|| DbError::compile(format!("malformed table reference '{input}'")))?;
            let alias = &input[open + 1..close];
            if !is_segment(alias) {
                return Err(DbError::compile(format!(
                    "invalid alias '({alias})' in table reference '{input}'"
                )));
            }
            (&input[..open], Some(alias.to_string()))
        }
        None => (input, None),
    };
    if !is_segment(name) {
        return Err(DbError::ident(name));
    }
    Ok(TableRef {
        name: name.to_string(),
        alias,
    })
}

/// An update-data key: `column` or `column[+|-|*|/]` for arithmetic
/// shorthand.
pub fn parse_update_key(key: &str) -> DbResult<(String, Option<&'static str>)> {
    let (column, operator) = match key.find('[') {
        Some(open) => {
            let suffix = &key[open..];
            let operator = match suffix {
                "[+]" => "+",
                "[-]" => "-",
                "[*]" => "*",
                "[/]" => "/",
                other => {
                    return Err(DbError::compile(format!(
                        "unknown update shorthand '{other}' in key '{key}'"
                    )));
                }
            };
            (&key[..open], Some(operator))
        }
        None => (key, None),
    };
    split_reference(column)
        .map_err(|_| DbError::compile(format!("malformed update key '{key}'")))?;
    Ok((column.to_string(), operator))
}

/// A column-to-column comparison, the value form of a positional key:
/// `left[op]right`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCompare {
    pub left: String,
    pub operator: &'static str,
    pub right: String,
}

/// Parse a `left[op]right` column comparison string.
pub fn parse_column_compare(input: &str) -> DbResult<ColumnCompare> {
    let open = input
        .find('[')
        .ok_or_else(|| DbError::compile(format!("malformed column comparison '{input}'")))?;
    let close = input[open..]
        .find(']')
        .map(|p| p + open)
        .ok_or_else(|| DbError::compile(format!("malformed column comparison '{input}'")))?;
    let operator = match &input[open + 1..close] {
        "=" => "=",
        "!" | "!=" => "!=",
        ">" => ">",
        ">=" => ">=",
        "<" => "<",
        "<=" => "<=",
        other => {
            return Err(DbError::compile(format!(
                "unknown operator '[{other}]' in column comparison '{input}'"
            )));
        }
    };
    let left = &input[..open];
    let right = &input[close + 1..];
    split_reference(left)
        .and(split_reference(right))
        .map_err(|_| DbError::compile(format!("malformed column comparison '{input}'")))?;
    Ok(ColumnCompare {
        left: left.to_string(),
        operator,
        right: right.to_string(),
    })
}
