//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+contrail@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0
//!

//! Attribute value sum type for the contrail contract testing engine
//!
//! Attribute and rule values flow through the engine as a heterogeneous
//! tagged union; every consumer pattern-matches explicitly. The only
//! implicit coercion is numeric cross-type equality (int vs. float),
//! which compares as `f64` with an absolute tolerance of `1e-9`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Absolute tolerance for numeric equality comparisons
pub const NUMERIC_TOLERANCE: f64 = 1e-9;

/// Attribute map keyed by attribute name
///
/// Keys are unique; iteration order is sorted, which keeps error lists
/// and serialized bundles deterministic across runs.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Heterogeneous telemetry value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Absent or explicit null
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit float
    Double(f64),

    /// UTF-8 string
    Str(String),

    /// Ordered list of values
    List(Vec<AttributeValue>),

    /// Nested map of values
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Check whether the value is null
    ///
    /// Existence checks in the expression engine are defined as
    /// `value != null`, so a missing field and an explicit null are
    /// indistinguishable by design.
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Strict numeric view: integers and floats only
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric coercion for range and threshold checks
    ///
    /// Unlike [`as_f64`](Self::as_f64) this also parses numeric strings,
    /// matching the range operator's contract.
    pub fn to_numeric(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            AttributeValue::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// String view without conversion
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view without conversion
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality with numeric cross-type coercion
    ///
    /// Strict by type except int vs. float, which compare as `f64`
    /// within [`NUMERIC_TOLERANCE`]. Null equals only null.
    pub fn loose_eq(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Null, AttributeValue::Null) => true,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Str(a), AttributeValue::Str(b)) => a == b,
            (AttributeValue::List(a), AttributeValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (AttributeValue::Map(a), AttributeValue::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|o| v.loose_eq(o)).unwrap_or(false))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < NUMERIC_TOLERANCE,
                _ => false,
            },
        }
    }

    /// Ordering comparison for the relational operators
    ///
    /// Defined for two strings (lexicographic) and two numerics (as
    /// `f64`). Any other pairing is non-comparable and returns `None`.
    pub fn partial_compare(&self, other: &AttributeValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (AttributeValue::Str(a), AttributeValue::Str(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => {
                    if (a - b).abs() < NUMERIC_TOLERANCE {
                        Some(std::cmp::Ordering::Equal)
                    } else {
                        a.partial_cmp(&b)
                    }
                }
                _ => None,
            },
        }
    }
}

impl fmt::Display for AttributeValue {
    /// Canonical string form used by the pattern and substring operators
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Str(s) => write!(f, "{}", s),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            AttributeValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Default for AttributeValue {
    fn default() -> Self {
        AttributeValue::Null
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}
