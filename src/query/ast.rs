//! Abstract Syntax Tree for parsed Karp queries
//!
//! A `QueryNode` is produced bottom-up by the query string parser and is never
//! mutated afterwards. Two walkers consume it: the [`QueryBuilder`] lowers it into a
//! [`CompiledQuery`], and the [`FieldNameCollector`] gathers the field names it
//! mentions.
//!
//! [`QueryBuilder`]: crate::query::builder::QueryBuilder
//! [`CompiledQuery`]: crate::query::nodes::CompiledQuery
//! [`FieldNameCollector`]: crate::query::collector::FieldNameCollector

use super::types::RangeOp;
use serde::Serialize;
use std::fmt;

/// A string argument, remembering whether it was written in quotes
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StringValue {
    pub value: String,
    pub quoted: bool,
}

impl StringValue {
    pub fn new(value: impl Into<String>, quoted: bool) -> Self {
        Self {
            value: value.into(),
            quoted,
        }
    }

    /// Text as sent to the search engine: unquoted strings are lowercased
    pub fn normalized(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_lowercase()
        }
    }
}

/// Typed argument of a predicate
///
/// The type is decided by the lexical shape of the argument when the query is parsed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Integer(i64),
    Float(f64),
    String(StringValue),
}

impl QueryValue {
    /// Classify raw text: `-?\d+` is an integer, `-?\d+\.\d+` a float, anything else a string
    pub fn from_text(text: &str) -> Self {
        if is_integer(text) {
            if let Ok(v) = text.parse() {
                return QueryValue::Integer(v);
            }
        } else if is_float(text) {
            if let Ok(v) = text.parse() {
                return QueryValue::Float(v);
            }
        }
        QueryValue::String(StringValue::new(text, false))
    }

    /// JSON form of the argument after string normalization
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            QueryValue::Integer(v) => serde_json::Value::from(*v),
            QueryValue::Float(v) => serde_json::Value::from(*v),
            QueryValue::String(s) => serde_json::Value::String(s.normalized()),
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Integer(v) => write!(f, "{}", v),
            QueryValue::Float(v) => write!(f, "{}", v),
            QueryValue::String(s) if s.quoted => write!(f, "\"{}\"", s.value.replace('"', "\\\"")),
            QueryValue::String(s) => f.write_str(&s.value),
        }
    }
}

fn all_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn is_integer(text: &str) -> bool {
    all_digits(text.strip_prefix('-').unwrap_or(text))
}

fn is_float(text: &str) -> bool {
    match text.strip_prefix('-').unwrap_or(text).split_once('.') {
        Some((int, frac)) => all_digits(int) && all_digits(frac),
        None => false,
    }
}

/// Kind tag of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    And,
    Or,
    Not,
    Equals,
    Contains,
    Startswith,
    Endswith,
    Regexp,
    Freetext,
    Freergxp,
    Exists,
    Missing,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl NodeKind {
    /// Operator keyword in the query language
    pub fn keyword(&self) -> &'static str {
        match self {
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::Not => "not",
            NodeKind::Equals => "equals",
            NodeKind::Contains => "contains",
            NodeKind::Startswith => "startswith",
            NodeKind::Endswith => "endswith",
            NodeKind::Regexp => "regexp",
            NodeKind::Freetext => "freetext",
            NodeKind::Freergxp => "freergxp",
            NodeKind::Exists => "exists",
            NodeKind::Missing => "missing",
            NodeKind::Gt => "gt",
            NodeKind::Gte => "gte",
            NodeKind::Lt => "lt",
            NodeKind::Lte => "lte",
        }
    }

    /// Look up an operator keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword {
            "and" => NodeKind::And,
            "or" => NodeKind::Or,
            "not" => NodeKind::Not,
            "equals" => NodeKind::Equals,
            "contains" => NodeKind::Contains,
            "startswith" => NodeKind::Startswith,
            "endswith" => NodeKind::Endswith,
            "regexp" => NodeKind::Regexp,
            "freetext" => NodeKind::Freetext,
            "freergxp" => NodeKind::Freergxp,
            "exists" => NodeKind::Exists,
            "missing" => NodeKind::Missing,
            "gt" => NodeKind::Gt,
            "gte" => NodeKind::Gte,
            "lt" => NodeKind::Lt,
            "lte" => NodeKind::Lte,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, NodeKind::And | NodeKind::Or | NodeKind::Not)
    }

    /// Range operator for Gt/Gte/Lt/Lte
    pub fn range_op(&self) -> Option<RangeOp> {
        match self {
            NodeKind::Gt => Some(RangeOp::Gt),
            NodeKind::Gte => Some(RangeOp::Gte),
            NodeKind::Lt => Some(RangeOp::Lt),
            NodeKind::Lte => Some(RangeOp::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed query
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryNode {
    /// All children must match (at least two)
    And { exps: Vec<QueryNode> },
    /// Any child may match (at least two)
    Or { exps: Vec<QueryNode> },
    /// The child must not match
    Not { exp: Box<QueryNode> },
    Equals { field: String, arg: QueryValue },
    Contains { field: String, arg: StringValue },
    Startswith { field: String, arg: StringValue },
    Endswith { field: String, arg: StringValue },
    Regexp { field: String, arg: StringValue },
    /// Match the argument against every field
    Freetext { arg: QueryValue },
    /// Match the regular expression against every field
    Freergxp { arg: StringValue },
    Exists { field: String },
    Missing { field: String },
    Range {
        field: String,
        op: RangeOp,
        arg: QueryValue,
    },
}

impl QueryNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            QueryNode::And { .. } => NodeKind::And,
            QueryNode::Or { .. } => NodeKind::Or,
            QueryNode::Not { .. } => NodeKind::Not,
            QueryNode::Equals { .. } => NodeKind::Equals,
            QueryNode::Contains { .. } => NodeKind::Contains,
            QueryNode::Startswith { .. } => NodeKind::Startswith,
            QueryNode::Endswith { .. } => NodeKind::Endswith,
            QueryNode::Regexp { .. } => NodeKind::Regexp,
            QueryNode::Freetext { .. } => NodeKind::Freetext,
            QueryNode::Freergxp { .. } => NodeKind::Freergxp,
            QueryNode::Exists { .. } => NodeKind::Exists,
            QueryNode::Missing { .. } => NodeKind::Missing,
            QueryNode::Range { op, .. } => match op {
                RangeOp::Gt => NodeKind::Gt,
                RangeOp::Gte => NodeKind::Gte,
                RangeOp::Lt => NodeKind::Lt,
                RangeOp::Lte => NodeKind::Lte,
            },
        }
    }

    /// Field this node targets, if it is field-qualified
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryNode::Equals { field, .. }
            | QueryNode::Contains { field, .. }
            | QueryNode::Startswith { field, .. }
            | QueryNode::Endswith { field, .. }
            | QueryNode::Regexp { field, .. }
            | QueryNode::Exists { field }
            | QueryNode::Missing { field }
            | QueryNode::Range { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Direct sub-expressions, in source order
    pub fn children(&self) -> Vec<&QueryNode> {
        match self {
            QueryNode::And { exps } | QueryNode::Or { exps } => exps.iter().collect(),
            QueryNode::Not { exp } => vec![exp.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Build an `and` node, collapsing a single expression to itself
    pub fn and(mut exps: Vec<QueryNode>) -> QueryNode {
        if exps.len() == 1 {
            exps.remove(0)
        } else {
            QueryNode::And { exps }
        }
    }

    /// Build an `or` node, collapsing a single expression to itself
    pub fn or(mut exps: Vec<QueryNode>) -> QueryNode {
        if exps.len() == 1 {
            exps.remove(0)
        } else {
            QueryNode::Or { exps }
        }
    }

    /// Build a `not` node; several expressions are negated as a disjunction
    pub fn not(exps: Vec<QueryNode>) -> QueryNode {
        QueryNode::Not {
            exp: Box::new(QueryNode::or(exps)),
        }
    }
}

/// Renders the node back into the parenthesised query syntax
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::And { exps } | QueryNode::Or { exps } => {
                write!(f, "{}(", self.kind())?;
                for (i, exp) in exps.iter().enumerate() {
                    if i > 0 {
                        f.write_str("||")?;
                    }
                    write!(f, "{}", exp)?;
                }
                f.write_str(")")
            }
            QueryNode::Not { exp } => write!(f, "not({})", exp),
            QueryNode::Equals { field, arg } | QueryNode::Range { field, arg, .. } => {
                write!(f, "{}|{}|{}", self.kind(), field, arg)
            }
            QueryNode::Contains { field, arg }
            | QueryNode::Startswith { field, arg }
            | QueryNode::Endswith { field, arg }
            | QueryNode::Regexp { field, arg } => {
                write!(f, "{}|{}|{}", self.kind(), field, QueryValue::String(arg.clone()))
            }
            QueryNode::Freetext { arg } => write!(f, "freetext|{}", arg),
            QueryNode::Freergxp { arg } => {
                write!(f, "freergxp|{}", QueryValue::String(arg.clone()))
            }
            QueryNode::Exists { field } | QueryNode::Missing { field } => {
                write!(f, "{}|{}", self.kind(), field)
            }
        }
    }
}
