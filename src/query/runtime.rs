//! Runtime field mappings derived from a query's field names
//!
//! A query may mention `<field>.length`, which is not stored in any document. The
//! search request then carries a runtime mapping that computes it from `<field>`.

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Build the `runtime_mappings` section for every `<base><suffix>` field
///
/// Returns an empty map when no field carries the suffix.
pub fn runtime_mappings(fields: &BTreeSet<String>, length_suffix: &str) -> Map<String, Value> {
    let mut mappings = Map::new();
    if length_suffix.is_empty() {
        return mappings;
    }

    for field in fields {
        let base = match field.strip_suffix(length_suffix) {
            Some(base) if !base.is_empty() => base,
            _ => continue,
        };
        mappings.insert(
            field.clone(),
            json!({
                "type": "long",
                "script": {
                    "source": format!(
                        "emit(doc.containsKey('{base}') ? doc['{base}'].length : 0)",
                        base = base
                    )
                }
            }),
        );
    }

    mappings
}
