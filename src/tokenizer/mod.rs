//! Text analysis for in-memory query evaluation

#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::{scalar_text, Tokenizer};
