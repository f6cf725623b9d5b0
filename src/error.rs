//! Centralised error hierarchy for the **phrase‑grammar engine**.
//!
//! Two layers live here:
//!
//! * [`CodeError`] is the positioned diagnostic *value* the matcher threads through
//!   every parse attempt.  Failed alternatives are folded into one error with
//!   [`CodeError::fold`]; nothing is ever raised as control flow.
//! * [`GrammarError`] is the crate‑wide error enum (scanner, grammar patterns,
//!   parse failures, I/O) behind the uniform `Result<T>` alias.
//!
//! The module **does not** print diagnostics itself.

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

use crate::token::Position;

/// What went wrong at a [`CodeError`]'s position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A literal fragment or punctuator expected one of these spellings.
    Mismatch { expected: Vec<String> },

    /// No visible grammar symbol can start here for the requested context.
    NoViableSymbol { expected: Vec<String> },

    /// More than one maximal completion survived selection.
    Ambiguous { alternatives: Vec<String> },

    /// An assignment target is neither a mutable reference nor a new name.
    IllegalAssignable { expression: String },
}

impl ErrorKind {
    fn expectations(&self) -> Option<&[String]> {
        match self {
            ErrorKind::Mismatch { expected } | ErrorKind::NoViableSymbol { expected } => {
                Some(expected)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Mismatch { expected } => write!(f, "expected {}", expected.join(" or ")),
            ErrorKind::NoViableSymbol { expected } => {
                write!(f, "nothing here matches {}", expected.join(" or "))
            }
            ErrorKind::Ambiguous { alternatives } => {
                write!(f, "ambiguous parse between {}", alternatives.join(" and "))
            }
            ErrorKind::IllegalAssignable { expression } => {
                write!(f, "{} cannot be assigned to", expression)
            }
        }
    }
}

/// A positioned diagnostic produced by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{position}] Error: {kind}")]
pub struct CodeError {
    pub position: Position,
    pub kind: ErrorKind,
}

impl CodeError {
    pub fn new(position: Position, kind: ErrorKind) -> Self {
        Self { position, kind }
    }

    pub fn mismatch<S: Into<String>>(position: Position, expected: S) -> Self {
        Self::new(
            position,
            ErrorKind::Mismatch {
                expected: vec![expected.into()],
            },
        )
    }

    pub fn no_viable_symbol<S: Into<String>>(position: Position, context: S) -> Self {
        Self::new(
            position,
            ErrorKind::NoViableSymbol {
                expected: vec![context.into()],
            },
        )
    }

    /// Combine the failures of two alternatives.
    ///
    /// The later position wins.  At the same position two expectation
    /// carrying errors merge into one listing both; otherwise `self` is kept.
    pub fn fold(self, other: CodeError) -> CodeError {
        if other.position > self.position {
            return other;
        }
        if other.position < self.position {
            return self;
        }

        match (self.kind.expectations(), other.kind.expectations()) {
            (Some(first), Some(second)) => {
                let mut expected: Vec<String> = first.to_vec();
                for item in second {
                    if !expected.contains(item) {
                        expected.push(item.clone());
                    }
                }

                let kind = match (&self.kind, &other.kind) {
                    (ErrorKind::NoViableSymbol { .. }, ErrorKind::NoViableSymbol { .. }) => {
                        ErrorKind::NoViableSymbol { expected }
                    }
                    _ => ErrorKind::Mismatch { expected },
                };

                CodeError::new(self.position, kind)
            }
            _ => self,
        }
    }

    /// Fold into an optional accumulator.
    pub fn fold_into(self, slot: &mut Option<CodeError>) {
        *slot = Some(match slot.take() {
            Some(previous) => previous.fold(self),
            None => self,
        });
    }
}

/// Canonical error type used throughout the crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GrammarError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// A textual grammar pattern could not be turned into a symbol.
    #[error("Invalid grammar pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Positioned parse failure from the matcher.
    #[error(transparent)]
    Parse(#[from] CodeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when slicing source text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl GrammarError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        GrammarError::Lex { message, line }
    }

    /// Helper constructor for **grammar patterns**.
    pub fn pattern<P: Into<String>, S: Into<String>>(pattern: P, msg: S) -> Self {
        let pattern: String = pattern.into();
        let message: String = msg.into();

        info!("Creating Pattern error: pattern={}, msg={}", pattern, message);

        GrammarError::Pattern { pattern, message }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, GrammarError>;
