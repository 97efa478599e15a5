use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which transformed values are left out of an index document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyValuePolicy {
    /// Drop null, false, 0, "", [] and {}
    #[default]
    Falsy,
    /// Drop only null and missing values
    Absent,
}

impl EmptyValuePolicy {
    /// Whether `value` should be written to the index document
    pub fn keeps(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            EmptyValuePolicy::Absent => !value.is_null(),
            EmptyValuePolicy::Falsy => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
            },
        }
    }
}

/// Index transform settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    pub empty_values: EmptyValuePolicy,
    /// Prefix for dereferenced and computed fields
    pub virtual_prefix: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            empty_values: EmptyValuePolicy::Falsy,
            virtual_prefix: "v_".to_string(),
        }
    }
}

/// Tokenizer configuration for the in-memory analyzer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

/// Query service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    pub default_size: usize,
    pub max_size: usize,
    /// Field suffix that is backed by a runtime length mapping
    pub length_suffix: String,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_size: 25,
            max_size: 10_000,
            length_suffix: ".length".to_string(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KarpConfig {
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub search: SearchSettings,
}

impl KarpConfig {
    /// Build a configuration from `KARP_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = KarpConfig::default();

        if let Some(raw) = lookup("KARP_EMPTY_VALUES") {
            match raw.to_lowercase().as_str() {
                "falsy" => config.index.empty_values = EmptyValuePolicy::Falsy,
                "absent" => config.index.empty_values = EmptyValuePolicy::Absent,
                _ => warn!("Unknown KARP_EMPTY_VALUES '{}', using 'falsy'", raw),
            }
        }

        if let Some(raw) = lookup("KARP_SEARCH_DEFAULT_SIZE") {
            match raw.parse() {
                Ok(size) => config.search.default_size = size,
                Err(_) => warn!("Invalid KARP_SEARCH_DEFAULT_SIZE '{}', keeping default", raw),
            }
        }

        if let Some(raw) = lookup("KARP_SEARCH_MAX_SIZE") {
            match raw.parse() {
                Ok(size) => config.search.max_size = size,
                Err(_) => warn!("Invalid KARP_SEARCH_MAX_SIZE '{}', keeping default", raw),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_falsy_policy() {
        let policy = EmptyValuePolicy::Falsy;
        assert!(!policy.keeps(&json!(null)));
        assert!(!policy.keeps(&json!(0)));
        assert!(!policy.keeps(&json!(0.0)));
        assert!(!policy.keeps(&json!("")));
        assert!(!policy.keeps(&json!([])));
        assert!(!policy.keeps(&json!({})));
        assert!(!policy.keeps(&json!(false)));
        assert!(policy.keeps(&json!(3)));
        assert!(policy.keeps(&json!("x")));
    }

    #[test]
    fn test_absent_policy() {
        let policy = EmptyValuePolicy::Absent;
        assert!(!policy.keeps(&json!(null)));
        assert!(policy.keeps(&json!(0)));
        assert!(policy.keeps(&json!([])));
        assert!(policy.keeps(&json!(false)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("KARP_EMPTY_VALUES", "Absent"),
            ("KARP_SEARCH_DEFAULT_SIZE", "50"),
            ("KARP_SEARCH_MAX_SIZE", "lots"),
        ]
        .into_iter()
        .collect();

        let config = KarpConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.index.empty_values, EmptyValuePolicy::Absent);
        assert_eq!(config.search.default_size, 50);
        assert_eq!(config.search.max_size, 10_000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: KarpConfig =
            serde_json::from_str(r#"{"index": {"empty_values": "absent", "virtual_prefix": "v_"}}"#)
                .unwrap();
        assert_eq!(config.index.empty_values, EmptyValuePolicy::Absent);
        assert_eq!(config.search.default_size, 25);
    }
}
