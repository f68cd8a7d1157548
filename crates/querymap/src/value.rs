//! The tagged value type flowing through the compiler.
//!
//! Every application value entering a query specification is converted once,
//! at the API boundary, into a [`Value`] variant. The compiler then matches
//! exhaustively instead of re-deriving a value's shape at each call site.
//! [`classify`] turns a `Value` into the bind-parameter form handed to the
//! driver.

use crate::error::{DbError, DbResult};
use crate::raw::Raw;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// An insertion-ordered mapping, used for condition trees, column specs,
/// structured values, and result rows. Iteration order is part of the
/// compiled SQL, so a hash map will not do.
pub type Map = IndexMap<String, Value>;

/// A query-specification value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A sequence: IN lists, BETWEEN pairs, sub-tree groups, column lists.
    Seq(Vec<Value>),
    /// A structured value; serialized on bind, recursed on compile.
    Map(Map),
    /// A hand-written SQL fragment spliced verbatim (after marker rewriting).
    Raw(Raw),
}

impl Value {
    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `Int` and `Float`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric coercion used by aggregates and the `FIELD(…)` ordering:
    /// integers, floats, and numeric strings all coerce.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert a `serde_json::Value` tree. Objects keep their insertion
    /// order (`preserve_order` is enabled on serde_json).
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

// Structured values are serialized with serde_json when bound; raw fragments
// have no serialized form and surface as an error at classification time,
// not here, so they serialize as null for diagnostics.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Raw(_) => serializer.serialize_unit(),
        }
    }
}

// ==================== From conversions ====================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}
impl From<Raw> for Value {
    fn from(v: Raw) -> Self {
        Value::Raw(v)
    }
}
impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Str(v.hyphenated().to_string())
    }
}
impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        Value::Str(v.format("%Y-%m-%d").to_string())
    }
}
impl From<chrono::NaiveTime> for Value {
    fn from(v: chrono::NaiveTime) -> Self {
        Value::Str(v.format("%H:%M:%S").to_string())
    }
}
impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::Str(v.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}
impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Str(v.to_rfc3339())
    }
}
impl From<chrono::DateTime<chrono::FixedOffset>> for Value {
    fn from(v: chrono::DateTime<chrono::FixedOffset>) -> Self {
        Value::Str(v.to_rfc3339())
    }
}

#[cfg(feature = "rust_decimal")]
impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        Value::Str(v.to_string())
    }
}

// ==================== Bind classification ====================

/// Bind-parameter type tag passed to the driver's `bind` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    Null,
    Int,
    Str,
    Bool,
    /// Large/binary payloads: byte strings and serialized structured values.
    Lob,
}

/// A value normalized for binding, plus its type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub value: Value,
    pub kind: BindKind,
}

/// Classify an application value into its bound form.
///
/// Floats are bound as strings to avoid locale/precision drift; booleans are
/// normalized to `"1"`/`"0"`; structured values are serialized with
/// serde_json and bound as LOBs. Raw fragments and sequences are spliced or
/// expanded by the compiler and can never reach a single bind slot.
pub fn classify(value: &Value) -> DbResult<BoundParam> {
    let bound = match value {
        Value::Null => BoundParam {
            value: Value::Null,
            kind: BindKind::Null,
        },
        Value::Bool(b) => BoundParam {
            value: Value::Str(if *b { "1" } else { "0" }.to_string()),
            kind: BindKind::Bool,
        },
        Value::Int(i) => BoundParam {
            value: Value::Int(*i),
            kind: BindKind::Int,
        },
        Value::Float(f) => BoundParam {
            value: Value::Str(f.to_string()),
            kind: BindKind::Str,
        },
        Value::Str(s) => BoundParam {
            value: Value::Str(s.clone()),
            kind: BindKind::Str,
        },
        Value::Bytes(b) => BoundParam {
            value: Value::Bytes(b.clone()),
            kind: BindKind::Lob,
        },
        Value::Map(_) => {
            let serialized = serde_json::to_string(value)
                .map_err(|e| DbError::compile(format!("unserializable value: {e}")))?;
            BoundParam {
                value: Value::Str(serialized),
                kind: BindKind::Lob,
            }
        }
        Value::Seq(_) => {
            return Err(DbError::compile(
                "sequence values expand to one placeholder per element and cannot be bound directly",
            ));
        }
        Value::Raw(_) => {
            return Err(DbError::compile(
                "raw fragments are spliced into SQL, not bound",
            ));
        }
    };
    Ok(bound)
}

// ==================== Construction macros ====================

/// Build an insertion-ordered specification map.
///
/// # Example
/// ```
/// use querymap::{spec, Value};
///
/// let where_clause = spec! {
///     "status" => "active",
///     "age[>]" => 21,
/// };
/// assert_eq!(where_clause["status"], Value::Str("active".into()));
/// ```
#[macro_export]
macro_rules! spec {
    () => { $crate::value::Map::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::Map::new();
        $(map.insert(($key).to_string(), $crate::Value::from($value));)+
        map
    }};
}

/// Build a [`Value::Seq`] from heterogeneous items.
///
/// # Example
/// ```
/// use querymap::{seq, Value};
///
/// let range = seq![18, 30];
/// assert_eq!(range, Value::Seq(vec![Value::Int(18), Value::Int(30)]));
/// ```
#[macro_export]
macro_rules! seq {
    () => { $crate::Value::Seq(Vec::new()) };
    ($($item:expr),+ $(,)?) => {
        $crate::Value::Seq(vec![$($crate::Value::from($item)),+])
    };
}
