//! Field access over index documents
//!
//! Index documents are nested JSON objects. Query clauses address fields with
//! dotted paths (`v_larger_place.name`), and arrays are transparent at every
//! level, the same way the search engine flattens object arrays.

use serde_json::{Map, Value};

/// Trait for reading field values out of an index document
pub trait FieldAccessor {
    /// All non-null scalar values stored under a dotted path
    fn field_values(&self, path: &str) -> Vec<&Value>;

    /// Dotted paths of every scalar leaf in the document
    fn field_paths(&self) -> Vec<String>;

    /// Number of non-null values under a path, counting objects as one value each
    fn value_count(&self, path: &str) -> usize;

    /// Whether the path holds a value, either directly or through an object's sub-fields
    fn has_field(&self, path: &str) -> bool {
        if !self.field_values(path).is_empty() {
            return true;
        }
        let prefix = format!("{}.", path);
        self.field_paths().iter().any(|p| p.starts_with(&prefix))
    }
}

impl FieldAccessor for Map<String, Value> {
    fn field_values(&self, path: &str) -> Vec<&Value> {
        let mut leaves = Vec::new();
        for value in resolve(self, path) {
            collect_scalars(value, &mut leaves);
        }
        leaves
    }

    fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (key, value) in self {
            collect_paths(key, value, &mut paths);
        }
        paths
    }

    fn value_count(&self, path: &str) -> usize {
        resolve(self, path).into_iter().map(count_values).sum()
    }
}

/// Values stored under a dotted path, before arrays at the last segment are flattened
fn resolve<'a>(document: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = Vec::new();
    let mut segments = path.split('.');

    match segments.next().and_then(|first| document.get(first)) {
        Some(value) => current.push(value),
        None => return Vec::new(),
    }

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            collect_member(value, segment, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn count_values(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.iter().map(count_values).sum(),
        _ => 1,
    }
}

fn collect_member<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(member) = map.get(key) {
                out.push(member);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_member(item, key, out);
            }
        }
        _ => {}
    }
}

fn collect_scalars<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null | Value::Object(_) => {}
        Value::Array(items) => {
            for item in items {
                collect_scalars(item, out);
            }
        }
        _ => out.push(value),
    }
}

fn collect_paths(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, member) in map {
                collect_paths(&format!("{}.{}", prefix, key), member, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_paths(prefix, item, out);
            }
        }
        Value::Null => {}
        _ => {
            if !out.iter().any(|p| p == prefix) {
                out.push(prefix.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_top_level_values() {
        let d = doc(json!({"name": "Hambo", "area": 50000, "density": null}));
        assert_eq!(d.field_values("name"), vec![&json!("Hambo")]);
        assert!(d.field_values("density").is_empty());
        assert!(d.field_values("missing").is_empty());
    }

    #[test]
    fn test_nested_and_array_values() {
        let d = doc(json!({
            "v_smaller_places": [{"name": "Alvik"}, {"name": "Bjurvik", "code": 3}],
            "tags": ["a", ["b", null]]
        }));
        assert_eq!(
            d.field_values("v_smaller_places.name"),
            vec![&json!("Alvik"), &json!("Bjurvik")]
        );
        assert_eq!(d.field_values("tags"), vec![&json!("a"), &json!("b")]);
        assert!(d.field_values("tags.x").is_empty());
        assert!(d.has_field("v_smaller_places"));
        assert!(!d.has_field("v_smaller"));
    }

    #[test]
    fn test_field_paths() {
        let d = doc(json!({
            "name": "Grund",
            "v_larger_place": {"code": 1, "name": "Hambo"},
            "v_smaller_places": [{"name": "Alvik"}, {"name": "Bjurvik"}],
            "empty": null
        }));
        assert_eq!(
            d.field_paths(),
            vec![
                "name".to_string(),
                "v_larger_place.code".to_string(),
                "v_larger_place.name".to_string(),
                "v_smaller_places.name".to_string(),
            ]
        );
    }

    #[test]
    fn test_value_count() {
        let d = doc(json!({
            "v_smaller_places": [{"code": 3}, {"code": 9}],
            "municipality": [2, 3, null],
            "density": null
        }));
        assert_eq!(d.value_count("v_smaller_places"), 2);
        assert_eq!(d.value_count("municipality"), 2);
        assert_eq!(d.value_count("density"), 0);
        assert_eq!(d.value_count("missing"), 0);
    }
}
