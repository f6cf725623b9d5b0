use log::debug;
use serde::Serialize;
use std::fmt;
use std::mem;

/// The different kinds of tokens produced by the scanner.
///
/// Variants without data represent punctuators, operators and keywords.
/// `STRING`, `INTEGER` and `FLOAT` carry their literal values.
/// `IDENTIFIER` covers every plain word; grammar phrases are built from them.
/// `EOF` marks the end of input.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// '('
    LEFT_PAREN,

    /// ')'
    RIGHT_PAREN,

    /// ','
    COMMA,

    /// ':'
    COLON,

    /// '+'
    PLUS,

    /// '-'
    MINUS,

    /// '*'
    STAR,

    /// '/'
    SLASH,

    /// '\' (integer division)
    BACKSLASH,

    /// '%'
    PERCENT,

    /// '&' (string concatenation)
    AMPERSAND,

    /// '<'
    LESS,

    /// '>'
    GREATER,

    /// '<='
    LESS_EQUAL,

    /// '>='
    GREATER_EQUAL,

    /// '='
    EQUAL,

    /// '<>'
    NOT_EQUAL,

    /// A plain word
    IDENTIFIER,

    /// A string literal (contents without quotes)
    STRING(String),

    /// An integral numeric literal
    #[serde(rename = "INTEGER")]
    INTEGER(i64),

    /// A numeric literal with a fractional part
    #[serde(rename = "FLOAT")]
    FLOAT(f64),

    /// 'and'
    AND,

    /// 'or'
    OR,

    /// 'not'
    NOT,

    /// End‑of‑file marker
    EOF,
}

impl PartialEq for TokenType {
    /// Two TokenTypes are equal if they share the same variant
    /// (ignoring any inner data). Uses `mem::discriminant` to compare.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl TokenType {
    /// Literal tokens become `Literal` expression leaves.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenType::STRING(_) | TokenType::INTEGER(_) | TokenType::FLOAT(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            TokenType::LEFT_PAREN => "LEFT_PAREN",
            TokenType::RIGHT_PAREN => "RIGHT_PAREN",
            TokenType::COMMA => "COMMA",
            TokenType::COLON => "COLON",
            TokenType::PLUS => "PLUS",
            TokenType::MINUS => "MINUS",
            TokenType::STAR => "STAR",
            TokenType::SLASH => "SLASH",
            TokenType::BACKSLASH => "BACKSLASH",
            TokenType::PERCENT => "PERCENT",
            TokenType::AMPERSAND => "AMPERSAND",
            TokenType::LESS => "LESS",
            TokenType::GREATER => "GREATER",
            TokenType::LESS_EQUAL => "LESS_EQUAL",
            TokenType::GREATER_EQUAL => "GREATER_EQUAL",
            TokenType::EQUAL => "EQUAL",
            TokenType::NOT_EQUAL => "NOT_EQUAL",
            TokenType::IDENTIFIER => "IDENTIFIER",
            TokenType::STRING(_) => "STRING",
            TokenType::INTEGER(_) => "INTEGER",
            TokenType::FLOAT(_) => "FLOAT",
            TokenType::AND => "AND",
            TokenType::OR => "OR",
            TokenType::NOT => "NOT",
            TokenType::EOF => "EOF",
        }
    }
}

/// 1‑based source coordinates of a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A scanned token, including its type, the original lexeme,
/// and the position where it was found.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token<'a> {
    /// The category of this token.
    pub token_type: TokenType,

    /// The exact substring from the source that produced this token.
    pub lexeme: &'a str,

    /// 1‑based line number in the source.
    pub line: usize,

    /// 1‑based column of the first byte of the lexeme.
    pub column: usize,
}

impl<'a> Token<'a> {
    /// Create a new Token with the given type, lexeme and coordinates.
    pub fn new(token_type: TokenType, lexeme: &'a str, line: usize, column: usize) -> Self {
        debug!(
            "Creating new token: type={:?}, lexeme={}, line={}, column={}",
            token_type, lexeme, line, column
        );

        Self {
            token_type,
            lexeme,
            line,
            column,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Position one past the last byte of the lexeme.
    pub fn end_position(&self) -> Position {
        Position::new(self.line, self.column + self.lexeme.len())
    }
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf: itoa::Buffer = itoa::Buffer::new();

        // ── literal payload, or "null" for everything else ──────────────
        let literal: String = match &self.token_type {
            TokenType::STRING(s) => s.clone(),
            TokenType::INTEGER(n) => buf.format(*n).to_owned(),
            TokenType::FLOAT(n) => {
                if n.fract() == 0.0 {
                    format!("{:.1}", n)
                } else {
                    n.to_string()
                }
            }
            _ => "null".to_owned(),
        };

        write!(
            f,
            "{} {} {}",
            self.token_type.name(),
            self.lexeme,
            literal
        )
    }
}
