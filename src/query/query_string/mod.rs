//! Karp query string parser
//!
//! Supports syntax like:
//! - `equals|name|Hambo`
//! - `and||regexp|name|.*bo.*||equals|area|50000||missing|density`
//! - `not||freergxp|.*test||freergxp|.*vik`
//! - `or(startswith|name|Al||and(gt|area|10||lt|area|20))`
//! - `contains|name|"a|b"`
//!
//! # Example
//!
//! ```rust
//! use karp::query::query_string::QueryStringParser;
//!
//! let mut parser = QueryStringParser::new("and||exists|name||gt|area|50000").unwrap();
//! let query = parser.parse().unwrap();
//! assert_eq!(query.children().len(), 2);
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token};
pub use parser::{parse, QueryStringParser};
