pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod plugins;
pub mod query;
pub mod repository;
pub mod schema;
pub mod testing;
pub mod tokenizer;

pub use config::{EmptyValuePolicy, IndexSettings, KarpConfig, SearchSettings, TokenizerConfig};
pub use error::{KarpError, Result};
pub use index::{IndexService, IndexTransformer, InMemorySearchIndex, SearchIndexClient};
pub use models::*;
pub use plugins::{PluginFunction, PluginRegistry};
pub use query::{compile, parse, QueryService};
pub use repository::{EntryRepository, ResourceRepository};
pub use schema::{FieldConfig, ResourceConfig};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
