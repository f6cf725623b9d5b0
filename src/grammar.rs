//! Grammar fragments and symbols.
//!
//! A [`GrammarSymbol`] is an ordered run of [`GrammarFragment`]s: literal words that must
//! appear verbatim, and typed slots that are filled by sub‑parses.  Symbols are built
//! fluently and are frozen once built; every append recomputes the canonical signature,
//! which is what the scope stack uses for shadowing.
//!
//! ```text
//! sum from <expression> to <expression>      n(sum from)en(to)e
//! <primitive> is not <type>                  pn(is not)t
//! set <assignable> to <expression>           n(set)an(to)e
//! ```

use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::error::{GrammarError, Result};

/// The shape of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FragmentKind {
    /// Literal words, e.g. `[repeat with] the current number [from] 1 [to] 100`
    Name,
    /// A type name, e.g. `set names to new [hash set]`
    Type,
    /// A primitive expression, e.g. `sum from 1 to [10]`
    Primitive,
    /// Any expression, e.g. `repeat with the current number from [1] to [100]`
    Expression,
    /// A parenthesised tuple, e.g. `collection of [("a", "b", "c")]`
    List,
    /// An existing mutable name, or a new one if nothing by that name is visible
    Assignable,
    /// Always a new name, scoped to the block the symbol heads
    Argument,
}

impl FragmentKind {
    const SLOTS: [FragmentKind; 6] = [
        FragmentKind::Type,
        FragmentKind::Primitive,
        FragmentKind::Expression,
        FragmentKind::List,
        FragmentKind::Assignable,
        FragmentKind::Argument,
    ];

    fn tag(self) -> char {
        match self {
            FragmentKind::Name => 'n',
            FragmentKind::Type => 't',
            FragmentKind::Primitive => 'p',
            FragmentKind::Expression => 'e',
            FragmentKind::List => 'l',
            FragmentKind::Assignable => 'a',
            FragmentKind::Argument => 'g',
        }
    }

    /// The `<...>` spelling used in patterns and diagnostics.
    pub fn placeholder(self) -> &'static str {
        match self {
            FragmentKind::Name => "<name>",
            FragmentKind::Type => "<type>",
            FragmentKind::Primitive => "<primitive>",
            FragmentKind::Expression => "<expression>",
            FragmentKind::List => "<list>",
            FragmentKind::Assignable => "<assignable>",
            FragmentKind::Argument => "<argument>",
        }
    }

    fn from_placeholder(text: &str) -> Option<FragmentKind> {
        Self::SLOTS
            .into_iter()
            .find(|kind| kind.placeholder() == text)
    }
}

/// One literal run or typed slot of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GrammarFragment {
    kind: FragmentKind,
    identifiers: Vec<String>,
}

impl GrammarFragment {
    pub fn slot(kind: FragmentKind) -> Self {
        Self {
            kind,
            identifiers: Vec::new(),
        }
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Literal words of a `Name` fragment; empty for slots.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    fn signature_part(&self) -> String {
        match self.kind {
            FragmentKind::Name => format!(
                "{}({})",
                self.kind.tag(),
                normalize_word(&self.identifiers.join(" "))
            ),
            kind => kind.tag().to_string(),
        }
    }
}

/// Case folding shared by signatures and literal word matching.
pub fn normalize_word(word: &str) -> String {
    word.to_lowercase()
}

/// Whether a scanned lexeme spells the literal `word`.
pub fn same_word(word: &str, lexeme: &str) -> bool {
    word == lexeme || normalize_word(word) == normalize_word(lexeme)
}

impl fmt::Display for GrammarFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FragmentKind::Name => write!(f, "{}", self.identifiers.join(" ")),
            kind => write!(f, "{}", kind.placeholder()),
        }
    }
}

bitflags! {
    /// Which parse contexts a symbol takes part in.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct SymbolClass: u8 {
        /// `<type>`
        const TYPE = 1 << 0;
        /// A value‑holding name such as a variable or `true`; matched as a `<primitive>`.
        const VALUE_FORM = 1 << 1;
        /// A value‑producing phrase; matched as a `<primitive>`, possibly by left extension.
        const PHRASE = 1 << 2;
        /// A full statement.
        const SENTENCE = 1 << 3;
        /// A statement that opens a block.
        const BLOCK = 1 << 4;
    }
}

/// The meaning the downstream stage attaches to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolTarget {
    /// Declared by user code.
    Custom,

    Object,
    Array,
    Symbol,
    Boolean,
    Integer,
    Float,
    String,

    True,
    False,
    Null,
    TheResult,

    NewType,
    NewTypeOfFields,
    NewArray,
    GetArrayItem,
    GetArrayLength,
    Invoke,
    InvokeWith,
    IsType,
    IsNotType,
    GetField,

    End,
    Exit,
    Select,
    Case,
    CaseElse,
    Call,
    CallContinuation,
    RedirectTo,
    Assign,
    SetArrayItem,
    SetField,
}

/// A declared phrase, type, sentence or block pattern.
///
/// Built by chaining [`word`](Self::word) and [`slot`](Self::slot); the signature is
/// recomputed on every append and never changes afterwards because the fields are
/// only reachable through getters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrammarSymbol {
    fragments: Vec<GrammarFragment>,
    signature: String,
    target: SymbolTarget,
    class: SymbolClass,
}

impl GrammarSymbol {
    pub fn new(class: SymbolClass, target: SymbolTarget) -> Self {
        Self {
            fragments: Vec::new(),
            signature: String::new(),
            target,
            class,
        }
    }

    /// A user variable: a mutable value holder named by `name`.
    pub fn variable(name: &str) -> Self {
        Self::new(SymbolClass::VALUE_FORM, SymbolTarget::Custom).word(name)
    }

    /// Append literal words.  Consecutive words share one `Name` fragment.
    pub fn word(mut self, words: &str) -> Self {
        for word in words.split_whitespace() {
            match self.fragments.last_mut() {
                Some(last) if last.kind == FragmentKind::Name => {
                    last.identifiers.push(word.to_owned());
                }
                _ => self.fragments.push(GrammarFragment {
                    kind: FragmentKind::Name,
                    identifiers: vec![word.to_owned()],
                }),
            }
        }

        self.calculate_signature();
        self
    }

    /// Append a typed slot.  A `Name` kind is ignored; use [`word`](Self::word).
    pub fn slot(mut self, kind: FragmentKind) -> Self {
        if kind != FragmentKind::Name {
            self.fragments.push(GrammarFragment::slot(kind));
            self.calculate_signature();
        }
        self
    }

    /// Build a symbol from its textual pattern, e.g. `sum from <expression> to <expression>`.
    pub fn from_pattern(class: SymbolClass, target: SymbolTarget, pattern: &str) -> Result<Self> {
        let mut symbol = Self::new(class, target);

        for part in pattern.split_whitespace() {
            if part.starts_with('<') || part.ends_with('>') {
                let kind = FragmentKind::from_placeholder(part).ok_or_else(|| {
                    GrammarError::pattern(pattern, format!("unknown slot {}", part))
                })?;
                symbol = symbol.slot(kind);
            } else if part.chars().all(|c| c.is_alphanumeric() || c == '_') {
                symbol = symbol.word(part);
            } else {
                return Err(GrammarError::pattern(
                    pattern,
                    format!("'{}' is not a word", part),
                ));
            }
        }

        if symbol.fragments.is_empty() {
            return Err(GrammarError::pattern(pattern, "pattern is empty"));
        }

        Ok(symbol)
    }

    fn calculate_signature(&mut self) {
        self.signature = self
            .fragments
            .iter()
            .map(GrammarFragment::signature_part)
            .collect();
    }

    pub fn fragments(&self) -> &[GrammarFragment] {
        &self.fragments
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn target(&self) -> SymbolTarget {
        self.target
    }

    pub fn class(&self) -> SymbolClass {
        self.class
    }

    pub fn leading_kind(&self) -> Option<FragmentKind> {
        self.fragments.first().map(GrammarFragment::kind)
    }

    /// Slot fragments in order; invocation arguments line up with these.
    pub fn slots(&self) -> impl Iterator<Item = &GrammarFragment> + '_ {
        self.fragments
            .iter()
            .filter(|fragment| fragment.kind != FragmentKind::Name)
    }

    /// Whether an assignment may target this symbol.
    pub fn is_mutable(&self) -> bool {
        self.class.contains(SymbolClass::VALUE_FORM)
            && matches!(self.target, SymbolTarget::Custom | SymbolTarget::TheResult)
    }

    /// The first fragment consumes a token before any nested parse starts, so the
    /// symbol can be tried at a cursor without re‑entering the same parse there.
    pub(crate) fn leads_with_token(&self) -> bool {
        matches!(
            self.leading_kind(),
            Some(FragmentKind::Name | FragmentKind::Argument | FragmentKind::List)
        )
    }

    /// Phrases whose leading slot is filled by an already parsed primitive.
    pub(crate) fn is_left_recursive(&self) -> bool {
        self.class.contains(SymbolClass::PHRASE)
            && self.fragments.len() > 1
            && matches!(
                self.leading_kind(),
                Some(FragmentKind::Primitive | FragmentKind::Expression)
            )
    }
}

impl fmt::Display for GrammarSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, fragment) in self.fragments.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", fragment)?;
        }
        Ok(())
    }
}
