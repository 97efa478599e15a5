use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Text analyzer used when evaluating queries against in-memory documents
///
/// Splits on Unicode word boundaries and lowercases, which is what the search
/// engine's standard analyzer does for the text fields Karp indexes.
#[derive(Clone, Debug, Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|word| {
                if self.config.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .filter(|token| token.chars().count() <= self.config.max_token_length)
            .collect()
    }

    /// Get unique terms from text
    pub fn unique_terms(&self, text: &str) -> HashSet<String> {
        self.tokenize(text).into_iter().collect()
    }

    /// Tokenize the text form of a JSON scalar
    ///
    /// Objects and arrays yield nothing; callers flatten them first.
    pub fn tokenize_value(&self, value: &serde_json::Value) -> Vec<String> {
        match scalar_text(value) {
            Some(text) => self.tokenize(&text),
            None => Vec::new(),
        }
    }
}

/// Text form of a JSON scalar as the search engine would index it
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::default();
        assert_eq!(
            tokenizer.tokenize("Botten test, Grund-test"),
            vec!["botten", "test", "grund", "test"]
        );
    }

    #[test]
    fn test_numbers_stay_whole() {
        let tokenizer = Tokenizer::default();
        assert_eq!(tokenizer.tokenize("area 12.5"), vec!["area", "12.5"]);
        assert_eq!(tokenizer.tokenize_value(&json!(50000)), vec!["50000"]);
    }

    #[test]
    fn test_unicode_words() {
        let tokenizer = Tokenizer::default();
        assert_eq!(tokenizer.tokenize("Åsa Älvkarleö"), vec!["åsa", "älvkarleö"]);
    }

    #[test]
    fn test_without_lowercase() {
        let tokenizer = Tokenizer::new(&TokenizerConfig {
            lowercase: false,
            max_token_length: 5,
        });
        assert_eq!(tokenizer.tokenize("Hambo Bjurvik"), vec!["Hambo"]);
    }

    #[test]
    fn test_unique_terms() {
        let tokenizer = Tokenizer::default();
        let terms = tokenizer.unique_terms("vik Vik vik");
        assert_eq!(terms.len(), 1);
        assert!(terms.contains("vik"));
    }

    #[test]
    fn test_containers_have_no_text() {
        let tokenizer = Tokenizer::default();
        assert!(tokenizer.tokenize_value(&json!([1, 2])).is_empty());
        assert!(tokenizer.tokenize_value(&json!(null)).is_empty());
    }
}
