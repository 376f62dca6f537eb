//! Parse error types
//!
//! Errors are boxed to keep `ParseResult` small on the happy path. Tokens
//! carry a line but no column, so errors report at line granularity.

use thiserror::Error;

use super::lexer::{Token, TokenKind};
use crate::error::LexError;

/// A parse error with its source line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, Box<ParseError>>;

impl ParseError {
    /// Create an error at a specific line
    pub fn at_line(message: impl Into<String>, line: u32) -> Box<Self> {
        Box::new(ParseError {
            message: message.into(),
            line,
        })
    }

    /// Create an "expected X, found Y" error from the offending token
    pub fn expected(what: impl std::fmt::Display, found: &Token) -> Box<Self> {
        let found_desc = if found.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            format!("{}", found.kind)
        };
        Box::new(ParseError {
            message: format!("Expected {}, found {}", what, found_desc),
            line: found.line,
        })
    }
}

impl From<LexError> for Box<ParseError> {
    fn from(err: LexError) -> Self {
        let line = match err {
            LexError::UnterminatedString { line } => line,
            LexError::UnexpectedChar { line, .. } => line,
        };
        Box::new(ParseError {
            message: err.to_string(),
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_display() {
        let err = ParseError::at_line("Expected '}' after block", 12);
        assert_eq!(err.to_string(), "Expected '}' after block at line 12");
    }

    #[test]
    fn test_expected_display() {
        let tok = Token::new(TokenKind::Semi, ";", 4);
        let err = ParseError::expected("expression", &tok);
        assert_eq!(err.to_string(), "Expected expression, found ';' at line 4");
    }

    #[test]
    fn test_expected_eof() {
        let tok = Token::new(TokenKind::Eof, "", 7);
        let err = ParseError::expected("'}'", &tok);
        assert_eq!(err.to_string(), "Expected '}', found end of file at line 7");
    }

    #[test]
    fn test_from_lex_error() {
        let err: Box<ParseError> = LexError::UnexpectedChar { ch: '@', line: 2 }.into();
        assert_eq!(err.line, 2);
        assert!(err.message.contains('@'));
    }
}
