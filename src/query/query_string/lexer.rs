//! Lexer for the Karp query syntax
//!
//! Splits a query such as `and||equals|name|"a|b"||exists|area` into pipes,
//! double pipes, parentheses, quoted strings and text runs. Whitespace is
//! significant and stays inside text runs.

use crate::error::KarpError;
use crate::Result;

/// Token types for query parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Separator between an operator and its arguments
    Pipe,
    /// Separator between the sub-expressions of a combinator
    DoublePipe,
    /// Left parenthesis (explicit combinator group)
    LeftParen,
    /// Right parenthesis
    RightParen,
    /// A double-quoted string, with `\"` already unescaped
    Quoted(String),
    /// Any run of characters other than `|`, `(`, `)` and `"`
    Text(String),
    /// End of input
    Eof,
}

impl Token {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Pipe => "'|'".to_string(),
            Token::DoublePipe => "'||'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Quoted(s) => format!("\"{}\"", s),
            Token::Text(s) => format!("'{}'", s),
            Token::Eof => "end of query".to_string(),
        }
    }
}

/// Lexer for tokenizing query strings
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    /// Start of the most recently returned token
    token_start: usize,
}

impl Lexer {
    /// Create a new lexer for the given input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.token_start = self.position;

        if self.is_eof() {
            return Ok(Token::Eof);
        }

        match self.current_char() {
            '|' => {
                self.advance();
                if !self.is_eof() && self.current_char() == '|' {
                    self.advance();
                    Ok(Token::DoublePipe)
                } else {
                    Ok(Token::Pipe)
                }
            }
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '"' => {
                self.advance();
                self.read_quoted_string()
            }
            _ => Ok(self.read_text()),
        }
    }

    /// Character offset where the last returned token starts
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Check if the lexer has reached the end of input
    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Input from `position` onwards, shortened for error messages
    pub fn fragment_at(&self, position: usize) -> String {
        const MAX_FRAGMENT: usize = 30;
        let start = position.min(self.input.len());
        let end = (start + MAX_FRAGMENT).min(self.input.len());
        self.input[start..end].iter().collect()
    }

    fn read_text(&mut self) -> Token {
        let mut text = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            if Self::is_text_char(ch) {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Text(text)
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let start = self.token_start;
        let mut value = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            match ch {
                '"' => {
                    self.advance();
                    return Ok(Token::Quoted(value));
                }
                '\\' if self.peek_char() == Some('"') => {
                    value.push('"');
                    self.advance();
                    self.advance();
                }
                _ => {
                    // Other escape sequences stay verbatim
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Err(KarpError::parse(
            start,
            self.fragment_at(start),
            "unterminated quoted string",
        ))
    }

    fn is_text_char(ch: char) -> bool {
        !matches!(ch, '|' | '(' | ')' | '"')
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}
