use std::fmt;
use thiserror::Error;

/// Errors produced while splitting an expression into tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unexpected character '{ch}' at offset {position}")]
    UnexpectedChar { position: usize, ch: char },

    #[error(
        "Unknown word '{word}' at offset {position}. Patterns must be quoted, e.g. \"{word}\""
    )]
    UnknownWord { position: usize, word: String },

    #[error("Unterminated pattern literal starting at offset {position}")]
    UnterminatedLiteral { position: usize },
}

impl LexError {
    /// Byte offset of the offending input
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedChar { position, .. }
            | LexError::UnknownWord { position, .. }
            | LexError::UnterminatedLiteral { position } => *position,
        }
    }
}

/// Why a token sequence was rejected by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorReason {
    EmptyExpression,
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    MissingOperand {
        operator: &'static str,
    },
    UnclosedParen,
    UnmatchedParen,
    EmptyPattern,
    TooDeep {
        limit: usize,
    },
}

impl fmt::Display for ParseErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorReason::EmptyExpression => f.write_str("empty expression"),
            ParseErrorReason::UnexpectedToken { found, expected } => {
                write!(f, "unexpected {found}, expected {expected}")
            }
            ParseErrorReason::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of expression, expected {expected}")
            }
            ParseErrorReason::MissingOperand { operator } => {
                write!(f, "operator {operator} is missing an operand")
            }
            ParseErrorReason::UnclosedParen => f.write_str("'(' is never closed"),
            ParseErrorReason::UnmatchedParen => f.write_str("')' has no matching '('"),
            ParseErrorReason::EmptyPattern => f.write_str("pattern literal is empty"),
            ParseErrorReason::TooDeep { limit } => {
                write!(f, "expression nests deeper than {limit} levels")
            }
        }
    }
}

/// A structurally invalid token sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid expression at offset {position}: {reason}")]
pub struct ParseError {
    /// Byte offset into the source expression
    pub position: usize,
    pub reason: ParseErrorReason,
}

impl ParseError {
    pub(crate) fn new(position: usize, reason: ParseErrorReason) -> Self {
        Self { position, reason }
    }
}

/// A pattern literal the regex engine refused to compile
#[derive(Debug, Clone, Error)]
#[error("Invalid pattern \"{pattern}\": {source}")]
pub struct InvalidPatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Any failure while turning expression text into a [`Filter`](super::Filter)
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    InvalidPattern(#[from] InvalidPatternError),
}
