//! Index documents for resources
//!
//! - [`IndexTransformer`] turns entries into index documents, resolving `ref`
//!   fields and evaluating `virtual` fields
//! - [`ReferenceUpdater`] re-indexes documents that embed a changed entry
//! - [`IndexService`] drives reindexing, upserts and deletes through a
//!   [`SearchIndexClient`]

pub mod client;
pub mod references;
pub mod service;
pub mod transform;

pub use client::{InMemorySearchIndex, SearchIndexClient};
pub use references::{BackReference, ReferenceKind, ReferenceUpdater};
pub use service::IndexService;
pub use transform::IndexTransformer;
