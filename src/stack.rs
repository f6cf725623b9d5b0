//! Scoped grammar symbol table.
//!
//! Lexical scopes form a stack.  Each scope owns the symbols introduced inside it, and a
//! flattened index maps every signature to the symbols carrying it; the last one
//! registered wins, so inner and later declarations shadow outer and earlier ones.
//!
//! Symbols live in an append‑only arena and are handed out as [`SymbolId`]s.  Popping a
//! scope removes its symbols from the index but never reuses their ids, so handles held
//! by already parsed trees stay valid.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use log::{debug, info};
use serde::Serialize;

use crate::expression::Expression;
use crate::grammar::{FragmentKind, GrammarSymbol, SymbolClass, SymbolTarget};

/// Stable handle to a symbol in a [`GrammarStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(usize);

/// Symbols waiting to be pushed as one scope.
#[derive(Debug, Default, Clone)]
pub struct GrammarScope {
    symbols: Vec<GrammarSymbol>,
}

impl GrammarScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: GrammarSymbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn add(&mut self, symbol: GrammarSymbol) {
        self.symbols.push(symbol);
    }

    pub fn symbols(&self) -> &[GrammarSymbol] {
        &self.symbols
    }

    /// The builtin types, primitive values, primitive operations and sentences.
    pub fn predefined() -> Self {
        use FragmentKind as F;
        use SymbolTarget as T;

        let ty = |target: SymbolTarget, name: &str| GrammarSymbol::new(SymbolClass::TYPE, target).word(name);
        let value = |target: SymbolTarget, name: &str| {
            GrammarSymbol::new(SymbolClass::VALUE_FORM, target).word(name)
        };
        let phrase = |target: SymbolTarget| GrammarSymbol::new(SymbolClass::PHRASE, target);
        let sentence = |target: SymbolTarget| GrammarSymbol::new(SymbolClass::SENTENCE, target);

        Self::new()
            // types
            .with(ty(T::Object, "object"))
            .with(ty(T::Array, "array"))
            .with(ty(T::Symbol, "symbol"))
            .with(ty(T::Boolean, "boolean"))
            .with(ty(T::Integer, "integer"))
            .with(ty(T::Float, "float"))
            .with(ty(T::String, "string"))
            // primitive values
            .with(value(T::True, "true"))
            .with(value(T::False, "false"))
            .with(value(T::Null, "null"))
            .with(value(T::TheResult, "the result"))
            // primitive operations
            .with(phrase(T::NewType).word("new").slot(F::Type))
            .with(phrase(T::NewTypeOfFields).word("new").slot(F::Type).word("of").slot(F::List))
            .with(phrase(T::NewArray).word("new array of").slot(F::Expression).word("items"))
            .with(phrase(T::GetArrayItem).word("item").slot(F::Expression).word("of array").slot(F::Primitive))
            .with(phrase(T::GetArrayLength).word("length of array").slot(F::Primitive))
            .with(phrase(T::Invoke).word("invoke").slot(F::Primitive))
            .with(phrase(T::InvokeWith).word("invoke").slot(F::Expression).word("with").slot(F::List))
            .with(phrase(T::IsType).slot(F::Primitive).word("is").slot(F::Type))
            .with(phrase(T::IsNotType).slot(F::Primitive).word("is not").slot(F::Type))
            .with(phrase(T::GetField).word("field").slot(F::Argument).word("of").slot(F::Primitive))
            // sentences
            .with(sentence(T::End).word("end"))
            .with(sentence(T::Exit).word("exit"))
            .with(GrammarSymbol::new(SymbolClass::BLOCK, T::Select).word("select").slot(F::Expression))
            .with(sentence(T::Case).word("case").slot(F::Expression))
            .with(sentence(T::CaseElse).word("case else"))
            .with(sentence(T::Call).word("call").slot(F::Expression))
            .with(sentence(T::CallContinuation).word("call continuation").slot(F::Expression).word("with").slot(F::List))
            .with(sentence(T::RedirectTo).word("redirect to").slot(F::Expression))
            .with(sentence(T::Assign).word("set").slot(F::Assignable).word("to").slot(F::Expression))
            .with(
                sentence(T::SetArrayItem)
                    .word("set item")
                    .slot(F::Expression)
                    .word("of array")
                    .slot(F::Expression)
                    .word("to")
                    .slot(F::Expression),
            )
            .with(
                sentence(T::SetField)
                    .word("set field")
                    .slot(F::Argument)
                    .word("of")
                    .slot(F::Expression)
                    .word("to")
                    .slot(F::Expression),
            )
    }
}

/// The stack of visible scopes plus the signature index over them.
///
/// Symbols live in an append‑only arena so a [`SymbolId`] stays valid for
/// the stack's whole lifetime, including after its scope is popped.  Trees
/// parsed inside a block can therefore still be rendered or lowered once the
/// block is closed.  The cost is that the arena grows by one entry per
/// declaration ever made, so a long‑lived stack holds every block argument
/// and assigned name of the input it has seen.  Use a fresh stack per file.
#[derive(Debug, Default)]
pub struct GrammarStack {
    /// Every symbol ever declared; never shrinks.
    arena: Vec<GrammarSymbol>,
    scopes: Vec<Vec<SymbolId>>,
    available: HashMap<String, Vec<SymbolId>>,
}

impl GrammarStack {
    /// An empty stack with no scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack whose outermost scope holds the builtin symbols.
    pub fn with_predefined() -> Self {
        let mut stack = Self::new();
        stack.push(GrammarScope::predefined());
        stack
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Enter a scope.  Every push must be paired with a [`pop`](Self::pop);
    /// [`scoped`](Self::scoped) does the pairing.
    pub fn push(&mut self, scope: GrammarScope) {
        self.scopes.push(Vec::with_capacity(scope.symbols.len()));
        for symbol in scope.symbols {
            self.declare(symbol);
        }

        info!(
            "Pushed scope {} with {} symbol(s)",
            self.scopes.len(),
            self.scopes.last().map_or(0, Vec::len)
        );
    }

    /// Leave the innermost scope, returning the symbols that went out of view.
    ///
    /// The symbols are only unindexed; their arena entries stay so the
    /// returned handles still resolve through [`symbol`](Self::symbol).
    pub fn pop(&mut self) -> Option<Vec<SymbolId>> {
        let ids = self.scopes.pop()?;

        for id in ids.iter().rev() {
            let signature = self.arena[id.0].signature();
            if let Some(group) = self.available.get_mut(signature) {
                if let Some(index) = group.iter().rposition(|other| other == id) {
                    group.remove(index);
                }
                if group.is_empty() {
                    self.available.remove(signature);
                }
            }
        }

        info!("Popped scope {} ({} symbol(s))", self.scopes.len() + 1, ids.len());

        Some(ids)
    }

    /// Register `symbol` in the innermost scope.
    pub fn declare(&mut self, symbol: GrammarSymbol) -> SymbolId {
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }

        let id = SymbolId(self.arena.len());
        debug!("Declaring {} as {:?} in scope {}", symbol, id, self.scopes.len());

        self.available
            .entry(symbol.signature().to_owned())
            .or_default()
            .push(id);
        self.arena.push(symbol);

        if let Some(scope) = self.scopes.last_mut() {
            scope.push(id);
        }

        id
    }

    /// Number of symbols ever declared, visible or not.
    pub fn declared(&self) -> usize {
        self.arena.len()
    }

    /// The symbol behind a handle issued by this stack.
    pub fn symbol(&self, id: SymbolId) -> &GrammarSymbol {
        &self.arena[id.0]
    }

    /// The innermost visible symbol with this signature.
    pub fn lookup(&self, signature: &str) -> Option<SymbolId> {
        self.available
            .get(signature)
            .and_then(|group| group.last().copied())
    }

    /// Every visible symbol whose classification intersects `mask`, in
    /// declaration order.  Shadowed symbols are left out.
    pub fn visible(&self, mask: SymbolClass) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self
            .available
            .values()
            .filter_map(|group| group.last().copied())
            .filter(|id| self.arena[id.0].class().intersects(mask))
            .collect();

        ids.sort_unstable();
        ids
    }

    /// Push `scope` and pop it again when the guard drops.
    pub fn scoped(&mut self, scope: GrammarScope) -> ScopeGuard<'_> {
        self.push(scope);
        ScopeGuard { stack: self }
    }

    /// Open the body scope of a block statement, declaring the header's own
    /// `<argument>` names in it.
    pub fn push_block(&mut self, header: &Expression<'_>) {
        let scope = GrammarScope {
            symbols: header
                .block_arguments(self)
                .into_iter()
                .map(|name| name.to_symbol())
                .collect(),
        };

        self.push(scope);
    }

    /// [`push_block`](Self::push_block) with the matching pop on drop.
    pub fn block(&mut self, header: &Expression<'_>) -> ScopeGuard<'_> {
        self.push_block(header);
        ScopeGuard { stack: self }
    }
}

/// Keeps a scope pushed for its lifetime.
pub struct ScopeGuard<'s> {
    stack: &'s mut GrammarStack,
}

impl Deref for ScopeGuard<'_> {
    type Target = GrammarStack;

    fn deref(&self) -> &GrammarStack {
        self.stack
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut GrammarStack {
        self.stack
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}
