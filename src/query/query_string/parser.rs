//! Recursive descent parser for Karp queries
//!
//! # Grammar
//!
//! ```text
//! query      := expression EOF
//! expression := logical | predicate
//! logical    := ("and" | "or" | "not") ( "||" expression ("||" expression)*
//!                                      | "(" expression ("||" expression)* ")" )
//! predicate  := ("equals" | "gt" | "gte" | "lt" | "lte") "|" field "|" value
//!             | ("contains" | "startswith" | "endswith" | "regexp") "|" field "|" string
//!             | ("exists" | "missing") "|" field
//!             | "freetext" "|" value
//!             | "freergxp" "|" string
//! value      := INTEGER | FLOAT | string
//! string     := QUOTED | TEXT
//! ```
//!
//! The `||` form is greedy: a combinator swallows every following `||`-separated
//! expression. Parentheses delimit the sub-expressions explicitly.

use super::lexer::{Lexer, Token};
use crate::error::KarpError;
use crate::query::ast::{NodeKind, QueryNode, QueryValue, StringValue};
use crate::Result;

/// Parser for the pipe-delimited query syntax
pub struct QueryStringParser {
    lexer: Lexer,
    current_token: Token,
    /// Start offset of `current_token`
    current_position: usize,
}

impl QueryStringParser {
    /// Create a new parser for the given query string
    pub fn new(input: &str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        let current_position = lexer.token_start();

        Ok(Self {
            lexer,
            current_token,
            current_position,
        })
    }

    /// Parse the query string into a query AST
    pub fn parse(&mut self) -> Result<QueryNode> {
        if self.current_token == Token::Eof {
            return Err(self.error("empty query"));
        }

        let query = self.parse_expression()?;

        // Ensure we've consumed all input
        if self.current_token != Token::Eof {
            return Err(self.error(format!(
                "unexpected {} after complete expression",
                self.current_token.describe()
            )));
        }

        Ok(query)
    }

    /// Parse: expression := logical | predicate
    fn parse_expression(&mut self) -> Result<QueryNode> {
        let operator_position = self.current_position;
        let keyword = match &self.current_token {
            Token::Text(text) => text.clone(),
            other => {
                return Err(self.error(format!(
                    "expected an operator, found {}",
                    other.describe()
                )))
            }
        };

        let kind = NodeKind::from_keyword(&keyword).ok_or_else(|| {
            KarpError::parse(
                operator_position,
                self.lexer.fragment_at(operator_position),
                format!("unknown operator '{}'", keyword),
            )
        })?;
        self.advance()?;

        if kind.is_logical() {
            self.parse_logical(kind)
        } else {
            let node = self.parse_predicate(kind)?;
            if self.current_token == Token::Pipe {
                return Err(self.error(format!("too many arguments for '{}'", kind)));
            }
            Ok(node)
        }
    }

    /// Parse the sub-expressions of `and`, `or` and `not`
    fn parse_logical(&mut self, kind: NodeKind) -> Result<QueryNode> {
        let mut exps = Vec::new();

        match self.current_token {
            Token::DoublePipe => {
                while self.current_token == Token::DoublePipe {
                    self.advance()?;
                    exps.push(self.parse_expression()?);
                }
            }
            Token::LeftParen => {
                self.advance()?;
                exps.push(self.parse_expression()?);
                while self.current_token == Token::DoublePipe {
                    self.advance()?;
                    exps.push(self.parse_expression()?);
                }
                self.expect(Token::RightParen)?;
            }
            _ => {
                return Err(self.error(format!(
                    "expected '||' or '(' after '{}', found {}",
                    kind,
                    self.current_token.describe()
                )))
            }
        }

        Ok(match kind {
            NodeKind::And => QueryNode::and(exps),
            NodeKind::Or => QueryNode::or(exps),
            _ => QueryNode::not(exps),
        })
    }

    /// Parse the arguments of a leaf operator
    fn parse_predicate(&mut self, kind: NodeKind) -> Result<QueryNode> {
        let node = match kind {
            NodeKind::Equals => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_value(kind)?;
                QueryNode::Equals { field, arg }
            }
            NodeKind::Gt | NodeKind::Gte | NodeKind::Lt | NodeKind::Lte => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_value(kind)?;
                let op = kind
                    .range_op()
                    .ok_or_else(|| self.error(format!("'{}' is not a range operator", kind)))?;
                QueryNode::Range { field, op, arg }
            }
            NodeKind::Contains => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_string(kind)?;
                QueryNode::Contains { field, arg }
            }
            NodeKind::Startswith => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_string(kind)?;
                QueryNode::Startswith { field, arg }
            }
            NodeKind::Endswith => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_string(kind)?;
                QueryNode::Endswith { field, arg }
            }
            NodeKind::Regexp => {
                let field = self.parse_field(kind)?;
                let arg = self.parse_string(kind)?;
                QueryNode::Regexp { field, arg }
            }
            NodeKind::Exists => QueryNode::Exists {
                field: self.parse_field(kind)?,
            },
            NodeKind::Missing => QueryNode::Missing {
                field: self.parse_field(kind)?,
            },
            NodeKind::Freetext => QueryNode::Freetext {
                arg: self.parse_value(kind)?,
            },
            NodeKind::Freergxp => QueryNode::Freergxp {
                arg: self.parse_string(kind)?,
            },
            NodeKind::And | NodeKind::Or | NodeKind::Not => {
                return Err(self.error(format!("'{}' is not a predicate", kind)))
            }
        };
        Ok(node)
    }

    /// Parse: "|" field
    fn parse_field(&mut self, kind: NodeKind) -> Result<String> {
        self.expect_argument_separator(kind)?;
        match &self.current_token {
            Token::Text(text) if !text.is_empty() => {
                let field = text.clone();
                self.advance()?;
                Ok(field)
            }
            other => Err(self.error(format!(
                "'{}' expects a field name, found {}",
                kind,
                other.describe()
            ))),
        }
    }

    /// Parse: "|" value, typing unquoted text by its shape
    fn parse_value(&mut self, kind: NodeKind) -> Result<QueryValue> {
        self.expect_argument_separator(kind)?;
        let value = match &self.current_token {
            Token::Quoted(text) => QueryValue::String(StringValue::new(text.clone(), true)),
            Token::Text(text) => QueryValue::from_text(text),
            other => {
                return Err(self.error(format!(
                    "'{}' expects a value, found {}",
                    kind,
                    other.describe()
                )))
            }
        };
        self.advance()?;
        Ok(value)
    }

    /// Parse: "|" string, keeping unquoted text as-is
    fn parse_string(&mut self, kind: NodeKind) -> Result<StringValue> {
        self.expect_argument_separator(kind)?;
        let value = match &self.current_token {
            Token::Quoted(text) => StringValue::new(text.clone(), true),
            Token::Text(text) => StringValue::new(text.clone(), false),
            other => {
                return Err(self.error(format!(
                    "'{}' expects a string, found {}",
                    kind,
                    other.describe()
                )))
            }
        };
        self.advance()?;
        Ok(value)
    }

    fn expect_argument_separator(&mut self, kind: NodeKind) -> Result<()> {
        if self.current_token == Token::Pipe {
            self.advance()
        } else {
            Err(self.error(format!(
                "missing argument for '{}': expected '|', found {}",
                kind,
                self.current_token.describe()
            )))
        }
    }

    /// Advance to the next token
    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        self.current_position = self.lexer.token_start();
        Ok(())
    }

    /// Expect a specific token and advance
    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                self.current_token.describe()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> KarpError {
        KarpError::parse(
            self.current_position,
            self.lexer.fragment_at(self.current_position),
            message,
        )
    }
}

/// Parse a query string into its AST
pub fn parse(query: &str) -> Result<QueryNode> {
    QueryStringParser::new(query)?.parse()
}
