//! Query evaluation context
//!
//! The `QueryContext` gives compiled clauses access to a single index document,
//! the analyzer, and a shared cache of compiled regular expressions.

use crate::query::accessor::FieldAccessor;
use crate::tokenizer::Tokenizer;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Regex cache shared between evaluations (keyed by anchored pattern)
pub type RegexCache = Arc<RwLock<HashMap<String, Option<Regex>>>>;

/// Context for evaluating a compiled query against one document
pub struct QueryContext<'a> {
    document: &'a Map<String, Value>,
    id: Option<&'a str>,
    tokenizer: &'a Tokenizer,
    regex_cache: RegexCache,
    /// Fields ending with this suffix are computed as value counts
    length_suffix: String,
}

impl<'a> QueryContext<'a> {
    /// Create a new context over `document`
    pub fn new(document: &'a Map<String, Value>, tokenizer: &'a Tokenizer) -> Self {
        Self {
            document,
            id: None,
            tokenizer,
            regex_cache: Arc::new(RwLock::new(HashMap::new())),
            length_suffix: ".length".to_string(),
        }
    }

    /// Share a regex cache across many documents
    pub fn with_regex_cache(mut self, cache: RegexCache) -> Self {
        self.regex_cache = cache;
        self
    }

    /// Id of the document, for id queries
    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the runtime length-field suffix
    pub fn with_length_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.length_suffix = suffix.into();
        self
    }

    pub fn document(&self) -> &Map<String, Value> {
        self.document
    }

    pub fn id(&self) -> Option<&str> {
        self.id
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        self.tokenizer
    }

    /// Values of a field, including runtime `<field>.length` values
    pub fn values(&self, field: &str) -> Vec<Value> {
        if let Some(base) = self.length_base(field) {
            let count = self.document.value_count(base);
            return vec![Value::from(count as u64)];
        }
        self.document.field_values(field).into_iter().cloned().collect()
    }

    /// Whether a field has any value
    pub fn has_field(&self, field: &str) -> bool {
        if self.length_base(field).is_some() {
            return true;
        }
        self.document.has_field(field)
    }

    /// Document fields matching a field pattern where `*` matches any run of characters
    pub fn matching_fields(&self, pattern: &str) -> Vec<String> {
        let paths = self.document.field_paths();
        if pattern == "*" {
            return paths;
        }
        match self.regex(&glob_to_regex(pattern)) {
            Some(re) => paths.into_iter().filter(|p| re.is_match(p)).collect(),
            None => Vec::new(),
        }
    }

    /// Compile (or fetch) an anchored regular expression
    ///
    /// Invalid patterns are logged once and never match.
    pub fn regex(&self, pattern: &str) -> Option<Regex> {
        if let Some(cached) = self.regex_cache.read().get(pattern) {
            return cached.clone();
        }

        let anchored = format!("^(?:{})$", translate_regexp(pattern));
        let compiled = match Regex::new(&anchored) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid regular expression in query");
                None
            }
        };
        self.regex_cache
            .write()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }

    fn length_base<'f>(&self, field: &'f str) -> Option<&'f str> {
        if self.length_suffix.is_empty() {
            return None;
        }
        field
            .strip_suffix(self.length_suffix.as_str())
            .filter(|base| !base.is_empty())
    }
}

/// Rewrite a search-engine regexp into `regex` syntax
///
/// An escaped punctuation character is a plain literal in the search engine,
/// while `regex` gives some of them a meaning (`\<` and `\>` are word
/// boundaries). Other escapes, such as `\d`, pass through.
pub fn translate_regexp(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            translated.push(ch);
            continue;
        }
        match chars.next() {
            Some(next) if next.is_ascii_punctuation() => {
                translated.push_str(&regex::escape(&next.to_string()));
            }
            Some(next) => {
                translated.push('\\');
                translated.push(next);
            }
            None => translated.push('\\'),
        }
    }
    translated
}

/// Translate a field-name glob into a regular expression
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex_pattern = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' => regex_pattern.push_str(".*"),
            _ => regex_pattern.push_str(&regex::escape(&ch.to_string())),
        }
    }
    regex_pattern
}
