//! Resource configuration and index mappings
//!
//! This module defines how a resource describes its entries:
//! - Field types and per-field configuration (plain, object, `ref`, `virtual`)
//! - Virtual field function descriptors (`multi_ref`, `plugin`)
//! - Index mappings derived from a resource config

mod field_type;
mod function;
mod mapping;
mod resource_config;

pub use field_type::FieldType;
pub use function::{FunctionSpec, MultiRef, TestOperator};
pub use mapping::{create_index_mapping, FieldMapping, IndexMapping, RAW_SUBFIELD};
pub use resource_config::{FieldConfig, Fields, RefConfig, ResourceConfig};
