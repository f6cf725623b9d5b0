//! Module `scanner` implements a one‑pass, streaming lexer for phrase‑grammar sources.
//!
//! It transforms a byte slice (`&[u8]`) into a sequence of `Token<'a>`s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a `FusedIterator`,
//! it can be chained safely with other iterator adapters.
//!
//! The grammar engine consumes one *line* at a time: every statement of the language fits on a
//! single line, so [`lines`] groups a scanned token slice into per‑line statement slices.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `(`, `)`, `,`, `:`, `+`, `-`, `*`, `/`, `\`, `%`, `&`, `=`.
//! - Two‑character operators: `<=`, `>=`, `<>`.
//! - String literals: `"` … `"` on a single line, reporting unterminated errors.
//! - Numeric literals: integers, and floats when a fractional part follows.
//! - Words: alphanumeric/_ sequences; `and`, `or`, `not` resolve via a perfect‑hash `KEYWORDS`
//!   map, everything else is an `IDENTIFIER`.
//! - Comments: `--` to end of line, skipped in bulk via `memchr`.
//! - Errors: any unexpected byte yields `GrammarError::lex(line, message)`.

use crate::error::{GrammarError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and" => TokenType::AND,
    b"or"  => TokenType::OR,
    b"not" => TokenType::NOT,
};

/// A single pass **scanner / lexer** that converts raw UTF‑8 bytes into a
/// sequence of [`Token`]s.  The lifetime `'a` ties every emitted token’s
/// `lexeme` slice back to the original source buffer.
pub struct Scanner<'a> {
    src: &'a [u8],              // entire source file
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    line_start: usize,          // index of the first byte of the current line
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            line_start: 0,
            pending: None,
        }
    }

    /// Scan the whole input, stopping at the first lexical error.
    pub fn tokenize(src: &'a [u8]) -> Result<Vec<Token<'a>>> {
        Scanner::new(src).collect()
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    const fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    /// Peek one byte beyond [`peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline(always)]
    fn column(&self) -> usize {
        self.start - self.line_start + 1
    }

    fn lexeme(&self) -> Result<&'a str> {
        Ok(std::str::from_utf8(&self.src[self.start..self.curr])?)
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`.  Whitespace and
    /// comments are skipped by returning `Ok(())` with `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            // ── single‑character punctuators ──────────────────────────────
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b',' => self.pending = Some(TokenType::COMMA),
            b':' => self.pending = Some(TokenType::COLON),
            b'+' => self.pending = Some(TokenType::PLUS),
            b'*' => self.pending = Some(TokenType::STAR),
            b'/' => self.pending = Some(TokenType::SLASH),
            b'\\' => self.pending = Some(TokenType::BACKSLASH),
            b'%' => self.pending = Some(TokenType::PERCENT),
            b'&' => self.pending = Some(TokenType::AMPERSAND),
            b'=' => self.pending = Some(TokenType::EQUAL),

            // ── two‑character operators (<=, <>, >=) ──────────────────────
            b'<' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else if self.match_byte(b'>') {
                    TokenType::NOT_EQUAL
                } else {
                    TokenType::LESS
                };

                self.pending = Some(tt);
            }

            b'>' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };

                self.pending = Some(tt);
            }

            // ── comments (-- … until newline) or minus ───────────────────
            b'-' => {
                if self.match_byte(b'-') {
                    if let Some(pos) = memchr(b'\n', &self.src[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }

                    return Ok(());
                }

                self.pending = Some(TokenType::MINUS);
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => {
                return Ok(());
            }

            b'\n' => {
                self.line += 1;
                self.line_start = self.curr;

                return Ok(());
            }

            b'"' => {
                return self.parse_string();
            }

            b'0'..=b'9' => {
                self.parse_number()?;
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_word();
            }

            _ => {
                return Err(GrammarError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        }

        Ok(())
    }

    /// Parse a double‑quoted string literal.  Strings never span lines
    /// because every statement is a single line.
    fn parse_string(&mut self) -> Result<()> {
        while !self.is_at_end() && self.peek() != b'"' && self.peek() != b'\n' {
            self.advance();
        }

        if self.peek() != b'"' {
            return Err(GrammarError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        let lexeme: &str = self.lexeme()?;
        let contents: &str = &lexeme[1..lexeme.len() - 1];

        self.pending = Some(TokenType::STRING(contents.to_owned()));

        Ok(())
    }

    /// Parse a numeric literal (`123`, `3.14`).
    fn parse_number(&mut self) -> Result<()> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut fractional = false;
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            fractional = true;
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: &str = self.lexeme()?;
        let tt = if fractional {
            text.parse::<f64>()
                .map(TokenType::FLOAT)
                .map_err(|e| GrammarError::lex(self.line, format!("Invalid float {}: {}", text, e)))?
        } else {
            text.parse::<i64>()
                .map(TokenType::INTEGER)
                .map_err(|e| GrammarError::lex(self.line, format!("Invalid integer {}: {}", text, e)))?
        };

        self.pending = Some(tt);

        Ok(())
    }

    /// Parse a word and decide if it is a **keyword** or a plain
    /// `IDENTIFIER` token.
    fn parse_word(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.src[self.start..self.curr];

        let tt: TokenType = KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.len() {
            // EOF guard – emit exactly one EOF then terminate.
            if self.curr == self.len() {
                self.start = self.curr;
                let column = self.column();
                self.curr += 1;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line, column)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lexeme = match self.lexeme() {
                    Ok(lexeme) => lexeme,
                    Err(e) => return Some(Err(e)),
                };
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lexeme, self.line, self.column())));
            }
            // Otherwise it was whitespace / comment → continue loop.
        }

        None
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Split a token slice into one slice per source line.  `EOF` is dropped and
/// blank lines produce no slice.
pub fn lines<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut result: Vec<&'t [Token<'a>]> = Vec::new();
    let mut begin = 0;

    for (index, token) in tokens.iter().enumerate() {
        if matches!(token.token_type, TokenType::EOF) {
            if begin < index {
                result.push(&tokens[begin..index]);
            }
            return result;
        }

        if token.line != tokens[begin].line {
            result.push(&tokens[begin..index]);
            begin = index;
        }
    }

    if begin < tokens.len() {
        result.push(&tokens[begin..]);
    }

    result
}
