//! Collects the field names a query refers to

use super::ast::QueryNode;
use std::collections::BTreeSet;

/// Walker gathering every field name in a query AST
pub struct FieldNameCollector;

impl FieldNameCollector {
    /// Union of the node's own field with those of all its descendants
    ///
    /// Freetext-only queries yield an empty set.
    pub fn collect(node: &QueryNode) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        Self::walk(node, &mut fields);
        fields
    }

    fn walk(node: &QueryNode, fields: &mut BTreeSet<String>) {
        if let Some(field) = node.field() {
            fields.insert(field.to_string());
        }
        for child in node.children() {
            Self::walk(child, fields);
        }
    }
}
