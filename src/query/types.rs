//! Core types for the query system

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Operator for combining terms in a match query
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    /// All terms must match (AND)
    And,
    /// At least one term must match (OR)
    #[default]
    Or,
}

/// Boundary operator of a range clause
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// Operator keyword as used both in the query language and in the DSL
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }

    /// Whether `ordering` (value compared to bound) satisfies this operator
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            RangeOp::Gt => ordering == Ordering::Greater,
            RangeOp::Gte => ordering != Ordering::Less,
            RangeOp::Lt => ordering == Ordering::Less,
            RangeOp::Lte => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type for range queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeValue {
    /// 64-bit integer
    Long(i64),
    /// 64-bit floating point
    Double(f64),
    /// String (for dates, keywords)
    String(String),
}

impl RangeValue {
    /// Convert to f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RangeValue::Long(v) => Some(*v as f64),
            RangeValue::Double(v) => Some(*v),
            RangeValue::String(s) => s.parse().ok(),
        }
    }

    /// Compare a document value against this bound
    ///
    /// Numbers compare numerically, everything else compares as lowercased text.
    /// Returns None when the two sides cannot be ordered.
    pub fn compare_document_value(&self, value: &serde_json::Value) -> Option<Ordering> {
        use serde_json::Value;
        match (value, self) {
            (Value::Number(n), RangeValue::Long(_) | RangeValue::Double(_)) => {
                n.as_f64()?.partial_cmp(&self.as_f64()?)
            }
            (Value::Number(n), RangeValue::String(s)) => {
                let bound: f64 = s.parse().ok()?;
                n.as_f64()?.partial_cmp(&bound)
            }
            (Value::String(s), RangeValue::String(bound)) => {
                Some(s.to_lowercase().cmp(&bound.to_lowercase()))
            }
            (Value::String(s), _) => {
                let v: f64 = s.parse().ok()?;
                v.partial_cmp(&self.as_f64()?)
            }
            _ => None,
        }
    }
}
