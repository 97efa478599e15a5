//! Property-based tests for the query DSL
//!
//! Random query trees are rendered to query strings, compiled, and evaluated
//! against random documents. The result must agree with a direct evaluation of
//! the tree.
//!
//! Run with: `cargo test --test query_properties`

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use karp::query::{compile, parse, QueryContext};
use karp::Tokenizer;

// =============================================================================
// Strategies for generating test data
// =============================================================================

const FIELDS: [&str; 3] = ["area", "density", "population"];

#[derive(Clone, Debug)]
enum Expr {
    Exists(&'static str),
    Missing(&'static str),
    Gt(&'static str, i64),
    Lte(&'static str, i64),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    fn render(&self) -> String {
        match self {
            Expr::Exists(field) => format!("exists|{}", field),
            Expr::Missing(field) => format!("missing|{}", field),
            Expr::Gt(field, value) => format!("gt|{}|{}", field, value),
            Expr::Lte(field, value) => format!("lte|{}|{}", field, value),
            Expr::And(exps) => format!("and({})", render_all(exps)),
            Expr::Or(exps) => format!("or({})", render_all(exps)),
            Expr::Not(exp) => format!("not({})", exp.render()),
        }
    }

    fn eval(&self, doc: &Map<String, Value>) -> bool {
        let number = |field: &str| doc.get(field).and_then(Value::as_i64);
        match self {
            Expr::Exists(field) => number(field).is_some(),
            Expr::Missing(field) => number(field).is_none(),
            Expr::Gt(field, value) => number(field).is_some_and(|n| n > *value),
            Expr::Lte(field, value) => number(field).is_some_and(|n| n <= *value),
            Expr::And(exps) => exps.iter().all(|e| e.eval(doc)),
            Expr::Or(exps) => exps.iter().any(|e| e.eval(doc)),
            Expr::Not(exp) => !exp.eval(doc),
        }
    }

    fn fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Exists(field) | Expr::Missing(field) => {
                out.insert(field.to_string());
            }
            Expr::Gt(field, _) | Expr::Lte(field, _) => {
                out.insert(field.to_string());
            }
            Expr::And(exps) | Expr::Or(exps) => exps.iter().for_each(|e| e.fields(out)),
            Expr::Not(exp) => exp.fields(out),
        }
    }
}

fn render_all(exps: &[Expr]) -> String {
    exps.iter().map(Expr::render).collect::<Vec<_>>().join("||")
}

fn field_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(FIELDS.to_vec())
}

fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        field_strategy().prop_map(Expr::Exists),
        field_strategy().prop_map(Expr::Missing),
        (field_strategy(), 0i64..10).prop_map(|(f, v)| Expr::Gt(f, v)),
        (field_strategy(), 0i64..10).prop_map(|(f, v)| Expr::Lte(f, v)),
    ];

    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expr::And),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Expr::Or),
            inner.prop_map(|e| Expr::Not(Box::new(e))),
        ]
    })
}

fn doc_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::vec(prop::option::of(0i64..10), FIELDS.len()).prop_map(|values| {
        FIELDS
            .iter()
            .zip(values)
            .filter_map(|(field, value)| value.map(|v| (field.to_string(), Value::from(v))))
            .collect()
    })
}

/// Punctuation that is plain text in an unquoted query argument
const PUNCTUATION: &str = "[<>.?+*{}\\[\\]#@&~^$!%,;:=/-]";

fn punctuation_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("{}{{1,3}}", PUNCTUATION)).unwrap()
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("([a-z ]|{}){{0,12}}", PUNCTUATION)).unwrap()
}

fn name_matches(q: &str, name: &str) -> bool {
    let (query, _) = compile(q).unwrap();
    let doc: Map<String, Value> = [("name".to_string(), Value::from(name))].into_iter().collect();
    let tokenizer = Tokenizer::default();
    query.matches(&QueryContext::new(&doc, &tokenizer))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Compiled queries select exactly the documents the tree describes
    #[test]
    fn compiled_query_agrees_with_tree(expr in expr_strategy(), docs in prop::collection::vec(doc_strategy(), 1..8)) {
        let q = expr.render();
        let (query, _) = compile(&q).unwrap();
        let tokenizer = Tokenizer::default();
        for doc in &docs {
            let ctx = QueryContext::new(doc, &tokenizer);
            prop_assert_eq!(query.matches(&ctx), expr.eval(doc), "query {} on {:?}", q, doc);
        }
    }

    /// Building is deterministic
    #[test]
    fn compile_is_deterministic(expr in expr_strategy()) {
        let q = expr.render();
        let (first, first_fields) = compile(&q).unwrap();
        let (second, second_fields) = compile(&q).unwrap();
        prop_assert_eq!(first.to_dsl(), second.to_dsl());
        prop_assert_eq!(first_fields, second_fields);
    }

    /// The collected field names are exactly those the query mentions
    #[test]
    fn collected_fields_match_tree(expr in expr_strategy()) {
        let (_, fields) = compile(&expr.render()).unwrap();
        let mut expected = BTreeSet::new();
        expr.fields(&mut expected);
        prop_assert_eq!(fields, expected);
    }

    /// String operators treat punctuation in their argument literally
    #[test]
    fn string_operators_match_literally(arg in punctuation_strategy(), name in text_strategy()) {
        prop_assert_eq!(name_matches(&format!("contains|name|{}", arg), &name), name.contains(&arg));
        prop_assert_eq!(name_matches(&format!("startswith|name|{}", arg), &name), name.starts_with(&arg));
        prop_assert_eq!(name_matches(&format!("endswith|name|{}", arg), &name), name.ends_with(&arg));
    }

    /// The parser never panics, it only returns errors
    #[test]
    fn parse_never_panics(input in ".{0,64}") {
        let _ = parse(&input);
    }

    /// Pipes and parentheses are plain text inside quotes
    #[test]
    fn quoted_values_parse(value in "[a-zA-Z0-9 |()]{1,20}") {
        let q = format!("equals|name|\"{}\"", value);
        prop_assert!(parse(&q).is_ok(), "query {}", q);
    }
}
