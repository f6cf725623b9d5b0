/*!
Backtracking phrase matcher
===========================

The grammar is not fixed: every visible [`GrammarSymbol`] on the [`GrammarStack`] is a
production, and user code adds symbols while it is being parsed.  Instead of committing to
one path, every parse function returns **all** ways it can consume the upcoming tokens as a
list of [`Match`]es (`cursor after the match`, `expression produced`).  Callers extend each
alternative independently; an alternative that cannot continue is pruned.  Only the
statement layer picks a winner, by requiring the whole line to be consumed.

Grammar (as seen from the token stream)
---------------------------------------

```text
statement      → <sentence or block symbol>                         ; whole line
expression     → exp5 ( "or" exp5 )*
exp5           → exp4 ( "and" exp4 )*
exp4           → exp3 ( ( "<" | ">" | "<=" | ">=" | "=" | "<>" ) exp3 )*
exp3           → exp2 ( "&" exp2 )*
exp2           → exp1 ( ( "+" | "-" ) exp1 )*
exp1           → primitive ( ( "*" | "/" | "\" | "%" ) primitive )*
primitive      → short ( <phrase whose first slot is a primitive, minus that slot> )*
short          → LITERAL | ( "+" | "-" | "not" ) primitive | "(" expression ")"
               | <value form or phrase symbol>
list           → "(" ( expression ( "," expression )* )? ")"
argument       → IDENTIFIER+                                        ; every prefix
assignable     → <mutable value form> | argument
type           → <type symbol>
```

Every binary level keeps all intermediate results, so `a + b * c` yields `a`, `a + b` and
`a + (b * c)`; the statement layer keeps only completions that reach the end of the line.

Complexity
----------

| Phase                      | Cost                  | Notes                                          |
|----------------------------|-----------------------|------------------------------------------------|
| Symbol match               | O(alternatives)       | Frontier grows with every ambiguous slot.      |
| Whole statement            | exponential worst case| Pathological grammars are accepted; memoised   |
|                            |                       | primitive/expression results per cursor keep   |
|                            |                       | ordinary statements close to polynomial.       |

Scope mutation
--------------

Matching never touches the stack.  `<assignable>` and `<argument>` slots only produce
`NewDeclaration` nodes; [`parse_statement`] registers the new names of the winning parse
after selection, so discarded alternatives leave nothing behind.

Logging Policy
--------------

| Location                      | Level   | Purpose                                   |
|-------------------------------|---------|-------------------------------------------|
| `parse_statement`             | `info`  | Statement selection and declarations.     |
| symbol attempts, pruning      | `debug` | Which symbol was tried and where it died. |
*/

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info};

use crate::error::{CodeError, ErrorKind};
use crate::expression::{
    classify_assignable_targets, Assignables, BinaryOperator, Expression, SymbolName,
    UnaryOperator,
};
use crate::grammar::{same_word, FragmentKind, GrammarSymbol, SymbolClass};
use crate::stack::{GrammarStack, SymbolId};
use crate::token::{Position, Token, TokenType};

/// One way a parse function consumed tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    /// Index of the first token after the match.
    pub cursor: usize,
    pub expression: Expression<'a>,
}

/// Every alternative found, or the most informative failure when there is none.
pub type Outcome<'a> = std::result::Result<Vec<Match<'a>>, CodeError>;

/// Persistent list of slot expressions filled so far for one in‑progress match.
/// Branches that split after a shared prefix share its links.
struct ExpressionLink<'a> {
    expression: Expression<'a>,
    previous: Chain<'a>,
}

type Chain<'a> = Option<Rc<ExpressionLink<'a>>>;

fn link<'a>(previous: &Chain<'a>, expression: Expression<'a>) -> Chain<'a> {
    Some(Rc::new(ExpressionLink {
        expression,
        previous: previous.clone(),
    }))
}

fn unlink<'a>(chain: &Chain<'a>) -> Vec<Expression<'a>> {
    let mut expressions = Vec::new();
    let mut current = chain.as_deref();

    while let Some(node) = current {
        expressions.push(node.expression.clone());
        current = node.previous.as_deref();
    }

    expressions.reverse();
    expressions
}

/// A frontier element: where one candidate parse of a symbol stands.
struct Branch<'a> {
    cursor: usize,
    chain: Chain<'a>,
}

/// Visible symbols sorted by the parse context that may start them.
struct Candidates {
    types: Vec<SymbolId>,
    values: Vec<SymbolId>,
    left_recursive: Vec<SymbolId>,
    holders: Vec<SymbolId>,
    statements: Vec<SymbolId>,
}

impl Candidates {
    fn new(stack: &GrammarStack) -> Self {
        let select = |mask: SymbolClass, keep: fn(&GrammarSymbol) -> bool| -> Vec<SymbolId> {
            stack
                .visible(mask)
                .into_iter()
                .filter(|id| keep(stack.symbol(*id)))
                .collect()
        };

        Self {
            types: select(SymbolClass::TYPE, GrammarSymbol::leads_with_token),
            values: select(SymbolClass::VALUE_FORM | SymbolClass::PHRASE, |symbol| {
                symbol.leads_with_token() || symbol.leading_kind() == Some(FragmentKind::Type)
            }),
            left_recursive: select(SymbolClass::PHRASE, GrammarSymbol::is_left_recursive),
            holders: select(SymbolClass::VALUE_FORM, |symbol| {
                symbol.is_mutable() && symbol.leads_with_token()
            }),
            statements: select(SymbolClass::SENTENCE | SymbolClass::BLOCK, |_| true),
        }
    }
}

fn multiplicative(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::STAR => Some(BinaryOperator::Mul),
        TokenType::SLASH => Some(BinaryOperator::Div),
        TokenType::BACKSLASH => Some(BinaryOperator::IntDiv),
        TokenType::PERCENT => Some(BinaryOperator::Mod),
        _ => None,
    }
}

fn additive(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::PLUS => Some(BinaryOperator::Add),
        TokenType::MINUS => Some(BinaryOperator::Sub),
        _ => None,
    }
}

fn concatenation(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::AMPERSAND => Some(BinaryOperator::Concat),
        _ => None,
    }
}

fn relational(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::LESS => Some(BinaryOperator::LT),
        TokenType::GREATER => Some(BinaryOperator::GT),
        TokenType::LESS_EQUAL => Some(BinaryOperator::LE),
        TokenType::GREATER_EQUAL => Some(BinaryOperator::GE),
        TokenType::EQUAL => Some(BinaryOperator::EQ),
        TokenType::NOT_EQUAL => Some(BinaryOperator::NE),
        _ => None,
    }
}

fn conjunction(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::AND => Some(BinaryOperator::And),
        _ => None,
    }
}

fn disjunction(token_type: &TokenType) -> Option<BinaryOperator> {
    match token_type {
        TokenType::OR => Some(BinaryOperator::Or),
        _ => None,
    }
}

type Level<'s, 'a> = fn(&mut Parser<'s, 'a>, usize) -> Outcome<'a>;

/// Matcher over one statement's tokens against a snapshot of the visible grammar.
pub struct Parser<'s, 'a> {
    stack: &'s GrammarStack,
    tokens: &'a [Token<'a>],
    end_position: Position,
    relaxed: bool,
    candidates: Candidates,
    failure: Option<CodeError>,
    primitives: HashMap<usize, Outcome<'a>>,
    expressions: HashMap<usize, Outcome<'a>>,
}

impl<'s, 'a> Parser<'s, 'a> {
    /// Construct a matcher.  A trailing `EOF` token is ignored.
    pub fn new(stack: &'s GrammarStack, tokens: &'a [Token<'a>]) -> Self {
        let (tokens, end_position) = match tokens.split_last() {
            Some((last, rest)) if last.token_type == TokenType::EOF => (rest, last.position()),
            Some((last, _)) => (tokens, last.end_position()),
            None => (tokens, Position::default()),
        };

        Self {
            stack,
            tokens,
            end_position,
            relaxed: false,
            candidates: Candidates::new(stack),
            failure: None,
            primitives: HashMap::new(),
            expressions: HashMap::new(),
        }
    }

    /// A matcher whose `<assignable>` slots also accept any primitive, so
    /// illegal assignment targets can be reported instead of a bare mismatch.
    fn relaxed(stack: &'s GrammarStack, tokens: &'a [Token<'a>]) -> Self {
        let mut parser = Self::new(stack, tokens);
        parser.relaxed = true;
        parser
    }

    /// Number of tokens the matcher works on.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn position_at(&self, cursor: usize) -> Position {
        self.tokens
            .get(cursor)
            .map_or(self.end_position, Token::position)
    }

    /// Remember a failure of an alternative that was dropped without
    /// failing its caller, so selection can report how far parsing got.
    fn note(&mut self, error: CodeError) {
        error.fold_into(&mut self.failure);
    }

    fn finish(
        &self,
        results: Vec<Match<'a>>,
        error: Option<CodeError>,
        cursor: usize,
        context: &str,
    ) -> Outcome<'a> {
        if !results.is_empty() {
            return Ok(results);
        }

        Err(error.unwrap_or_else(|| {
            CodeError::no_viable_symbol(self.position_at(cursor), context)
        }))
    }

    /// Cheap pre‑check: a leading literal word must spell the next token,
    /// ignoring case as signatures do.
    fn may_start(&self, symbol: &GrammarSymbol, fragment: usize, cursor: usize) -> bool {
        match symbol.fragments().get(fragment) {
            Some(fragment) if fragment.kind() == FragmentKind::Name => {
                match (fragment.identifiers().first(), self.tokens.get(cursor)) {
                    (Some(word), Some(token)) => same_word(word, token.lexeme),
                    _ => false,
                }
            }
            Some(_) => cursor < self.tokens.len(),
            None => true,
        }
    }

    // ───────────────────────── fragments and symbols ─────────────────────────

    /// Match one literal word, case‑insensitively.
    pub fn parse_token(&self, word: &str, cursor: usize) -> Result<usize, CodeError> {
        match self.tokens.get(cursor) {
            Some(token) if same_word(word, token.lexeme) => Ok(cursor + 1),
            _ => Err(CodeError::mismatch(self.position_at(cursor), format!("\"{}\"", word))),
        }
    }

    /// Match one slot fragment, returning every way it can be filled.
    pub fn parse_fragment(&mut self, kind: FragmentKind, cursor: usize) -> Outcome<'a> {
        match kind {
            FragmentKind::Type => self.parse_type(cursor),
            FragmentKind::Primitive => self.parse_primitive(cursor),
            FragmentKind::Expression => self.parse_expression(cursor),
            FragmentKind::List => self.parse_list(cursor),
            FragmentKind::Assignable => self.parse_assignable(cursor),
            FragmentKind::Argument => self.parse_argument(cursor),
            FragmentKind::Name => Err(CodeError::mismatch(
                self.position_at(cursor),
                FragmentKind::Name.placeholder(),
            )),
        }
    }

    fn parse_symbol_step(
        &mut self,
        symbol: &GrammarSymbol,
        fragment: usize,
        branch: Branch<'a>,
        next: &mut Vec<Branch<'a>>,
    ) -> Result<(), CodeError> {
        let fragment = &symbol.fragments()[fragment];

        if fragment.kind() == FragmentKind::Name {
            let mut cursor = branch.cursor;
            for word in fragment.identifiers() {
                cursor = self.parse_token(word, cursor)?;
            }

            next.push(Branch {
                cursor,
                chain: branch.chain,
            });
        } else {
            for found in self.parse_fragment(fragment.kind(), branch.cursor)? {
                next.push(Branch {
                    cursor: found.cursor,
                    chain: link(&branch.chain, found.expression),
                });
            }
        }

        Ok(())
    }

    /// Walk `symbol`'s fragments from `begin`, starting from the slot
    /// expressions already in `chain`.  `position` is where the finished
    /// expression starts.
    pub fn parse_symbol_from(
        &mut self,
        id: SymbolId,
        begin: usize,
        chain: Option<Expression<'a>>,
        cursor: usize,
        position: Position,
    ) -> Outcome<'a> {
        let stack = self.stack;
        let symbol = stack.symbol(id);
        debug!("Trying '{}' from fragment {} at token {}", symbol, begin, cursor);

        let initial: Chain<'a> = match chain {
            Some(expression) => link(&None, expression),
            None => None,
        };
        let mut frontier: Vec<Branch<'a>> = vec![Branch {
            cursor,
            chain: initial,
        }];

        for fragment in begin..symbol.fragments().len() {
            let mut next: Vec<Branch<'a>> = Vec::new();
            let mut error: Option<CodeError> = None;

            for branch in frontier {
                if let Err(e) = self.parse_symbol_step(symbol, fragment, branch, &mut next) {
                    e.fold_into(&mut error);
                }
            }

            if next.is_empty() {
                debug!("'{}' pruned at fragment {}", symbol, fragment);

                return Err(error.unwrap_or_else(|| {
                    CodeError::no_viable_symbol(self.position_at(cursor), symbol.to_string())
                }));
            }

            frontier = next;
        }

        Ok(frontier
            .into_iter()
            .map(|branch| Match {
                cursor: branch.cursor,
                expression: Self::complete(id, symbol, position, &branch.chain),
            })
            .collect())
    }

    /// Match `symbol` from its first fragment.
    pub fn parse_symbol(&mut self, id: SymbolId, cursor: usize) -> Outcome<'a> {
        let position = self.position_at(cursor);
        self.parse_symbol_from(id, 0, None, cursor, position)
    }

    fn complete(
        id: SymbolId,
        symbol: &GrammarSymbol,
        position: Position,
        chain: &Chain<'a>,
    ) -> Expression<'a> {
        let arguments = unlink(chain);
        let reference = Expression::Reference {
            symbol: id,
            position,
        };

        if arguments.is_empty()
            && symbol
                .class()
                .intersects(SymbolClass::TYPE | SymbolClass::VALUE_FORM)
        {
            reference
        } else {
            Expression::Invocation {
                function: Box::new(reference),
                arguments,
            }
        }
    }

    fn parse_candidates(&mut self, ids: &[SymbolId], cursor: usize, context: &str) -> Outcome<'a> {
        let stack = self.stack;
        let mut results: Vec<Match<'a>> = Vec::new();
        let mut error: Option<CodeError> = None;

        for &id in ids {
            if !self.may_start(stack.symbol(id), 0, cursor) {
                continue;
            }

            match self.parse_symbol(id, cursor) {
                Ok(found) => results.extend(found),
                Err(e) => e.fold_into(&mut error),
            }
        }

        self.finish(results, error, cursor, context)
    }

    // ───────────────────────────── slot parsers ──────────────────────────────

    /// `<type>`
    pub fn parse_type(&mut self, cursor: usize) -> Outcome<'a> {
        let ids = self.candidates.types.clone();
        self.parse_candidates(&ids, cursor, "<type>")
    }

    /// Literals, prefix operators, parenthesised expressions and value
    /// symbols that do not lead with a primitive.
    fn parse_short_primitive(&mut self, cursor: usize) -> Outcome<'a> {
        let tokens = self.tokens;
        let Some(token) = tokens.get(cursor) else {
            return Err(CodeError::no_viable_symbol(self.end_position, "<primitive>"));
        };

        let mut results: Vec<Match<'a>> = Vec::new();
        let mut error: Option<CodeError> = None;

        let unary = match token.token_type {
            TokenType::PLUS => Some(UnaryOperator::Positive),
            TokenType::MINUS => Some(UnaryOperator::Negative),
            TokenType::NOT => Some(UnaryOperator::Not),
            _ => None,
        };

        if token.token_type.is_literal() {
            results.push(Match {
                cursor: cursor + 1,
                expression: Expression::Literal(token),
            });
        } else if let Some(op) = unary {
            match self.parse_primitive(cursor + 1) {
                Ok(operands) => results.extend(operands.into_iter().map(|operand| Match {
                    cursor: operand.cursor,
                    expression: Expression::Unary {
                        op,
                        operand: Box::new(operand.expression),
                        position: token.position(),
                    },
                })),
                Err(e) => e.fold_into(&mut error),
            }
        } else if token.token_type == TokenType::LEFT_PAREN {
            match self.parse_expression(cursor + 1) {
                Ok(inner) => {
                    for found in inner {
                        match tokens.get(found.cursor) {
                            Some(close) if close.token_type == TokenType::RIGHT_PAREN => {
                                results.push(Match {
                                    cursor: found.cursor + 1,
                                    expression: found.expression,
                                })
                            }
                            _ => CodeError::mismatch(self.position_at(found.cursor), "\")\"")
                                .fold_into(&mut error),
                        }
                    }
                }
                Err(e) => e.fold_into(&mut error),
            }
        }

        let ids = self.candidates.values.clone();
        match self.parse_candidates(&ids, cursor, "<primitive>") {
            Ok(found) => results.extend(found),
            Err(e) => e.fold_into(&mut error),
        }

        self.finish(results, error, cursor, "<primitive>")
    }

    /// `<primitive>`: a short primitive extended to the left by every phrase
    /// whose first slot it can fill, repeatedly.
    pub fn parse_primitive(&mut self, cursor: usize) -> Outcome<'a> {
        if let Some(outcome) = self.primitives.get(&cursor) {
            return outcome.clone();
        }

        let outcome = self.extend_primitive(cursor);
        self.primitives.insert(cursor, outcome.clone());
        outcome
    }

    fn extend_primitive(&mut self, cursor: usize) -> Outcome<'a> {
        let stack = self.stack;
        let mut results = self.parse_short_primitive(cursor)?;
        let phrases = self.candidates.left_recursive.clone();

        let mut start = 0;
        while start < results.len() {
            let end = results.len();

            for index in start..end {
                let seed = results[index].clone();

                for &id in &phrases {
                    if !self.may_start(stack.symbol(id), 1, seed.cursor) {
                        continue;
                    }

                    let position = seed.expression.position();
                    let extended = self.parse_symbol_from(
                        id,
                        1,
                        Some(seed.expression.clone()),
                        seed.cursor,
                        position,
                    );
                    match extended {
                        Ok(extended) => results.extend(extended),
                        Err(e) => {
                            debug!("Left extension by '{}' failed: {}", stack.symbol(id), e);
                            self.note(e);
                        }
                    }
                }
            }

            start = end;
        }

        Ok(results)
    }

    /// `<list>`: `( expression, ... )`, possibly empty.
    pub fn parse_list(&mut self, cursor: usize) -> Outcome<'a> {
        let tokens = self.tokens;
        match tokens.get(cursor) {
            Some(open) if open.token_type == TokenType::LEFT_PAREN => {}
            _ => return Err(CodeError::mismatch(self.position_at(cursor), "\"(\"")),
        }

        let position = self.position_at(cursor);
        if matches!(tokens.get(cursor + 1), Some(close) if close.token_type == TokenType::RIGHT_PAREN) {
            return Ok(vec![Match {
                cursor: cursor + 2,
                expression: Expression::List {
                    elements: Vec::new(),
                    position,
                },
            }]);
        }

        let mut results: Vec<Match<'a>> = Vec::new();
        let mut error: Option<CodeError> = None;
        let mut pending: Vec<(usize, Vec<Expression<'a>>)> = vec![(cursor + 1, Vec::new())];

        while let Some((at, elements)) = pending.pop() {
            let found = match self.parse_expression(at) {
                Ok(found) => found,
                Err(e) => {
                    e.fold_into(&mut error);
                    continue;
                }
            };

            for element in found {
                let mut elements = elements.clone();
                elements.push(element.expression);

                match tokens.get(element.cursor).map(|token| &token.token_type) {
                    Some(TokenType::COMMA) => pending.push((element.cursor + 1, elements)),
                    Some(TokenType::RIGHT_PAREN) => results.push(Match {
                        cursor: element.cursor + 1,
                        expression: Expression::List { elements, position },
                    }),
                    _ => CodeError::new(
                        self.position_at(element.cursor),
                        ErrorKind::Mismatch {
                            expected: vec!["\",\"".to_owned(), "\")\"".to_owned()],
                        },
                    )
                    .fold_into(&mut error),
                }
            }
        }

        self.finish(results, error, cursor, "<list>")
    }

    /// `<argument>`: every run of one or more identifiers becomes a new name.
    pub fn parse_argument(&mut self, cursor: usize) -> Outcome<'a> {
        let tokens = self.tokens;
        let mut results: Vec<Match<'a>> = Vec::new();
        let mut end = cursor;

        while let Some(token) = tokens.get(end) {
            if token.token_type != TokenType::IDENTIFIER {
                break;
            }
            end += 1;

            results.push(Match {
                cursor: end,
                expression: Expression::NewDeclaration(SymbolName {
                    identifiers: tokens[cursor..end].iter().collect(),
                }),
            });
        }

        if results.is_empty() {
            return Err(CodeError::mismatch(
                self.position_at(cursor),
                FragmentKind::Argument.placeholder(),
            ));
        }

        Ok(results)
    }

    /// `<assignable>`: a visible mutable value form becomes a `Reference`;
    /// any other identifier run becomes a `NewDeclaration`, unless the same
    /// span already reads as a primitive expression.
    pub fn parse_assignable(&mut self, cursor: usize) -> Outcome<'a> {
        let mut results: Vec<Match<'a>> = Vec::new();
        let mut error: Option<CodeError> = None;
        let mut taken: HashSet<usize> = HashSet::new();

        let holders = self.candidates.holders.clone();
        if let Ok(found) = self.parse_candidates(&holders, cursor, "<assignable>") {
            for reference in found {
                taken.insert(reference.cursor);
                results.push(reference);
            }
        }

        match self.parse_primitive(cursor) {
            Ok(found) => {
                taken.extend(found.iter().map(|primitive| primitive.cursor));
                if self.relaxed {
                    results.extend(found);
                }
            }
            Err(e) if self.relaxed => e.fold_into(&mut error),
            Err(_) => {}
        }

        match self.parse_argument(cursor) {
            Ok(found) => results.extend(found.into_iter().filter(|name| !taken.contains(&name.cursor))),
            Err(e) => e.fold_into(&mut error),
        }

        self.finish(results, error, cursor, FragmentKind::Assignable.placeholder())
    }

    // ──────────────────────────── operator chain ─────────────────────────────

    /// Left‑associative chain of `operand`s joined by the operators `operator`
    /// recognises.  Every prefix of the chain stays in the result.
    fn parse_binary(
        &mut self,
        cursor: usize,
        operand: Level<'s, 'a>,
        operator: fn(&TokenType) -> Option<BinaryOperator>,
    ) -> Outcome<'a> {
        let tokens = self.tokens;
        let mut results = operand(self, cursor)?;

        let mut start = 0;
        while start < results.len() {
            let end = results.len();

            for index in start..end {
                let at = results[index].cursor;
                let Some(op) = tokens.get(at).and_then(|token| operator(&token.token_type)) else {
                    continue;
                };

                let rights = match operand(self, at + 1) {
                    Ok(rights) => rights,
                    Err(e) => {
                        self.note(e);
                        continue;
                    }
                };

                let left = results[index].expression.clone();
                for right in rights {
                    results.push(Match {
                        cursor: right.cursor,
                        expression: Expression::Binary {
                            op,
                            left: Box::new(left.clone()),
                            right: Box::new(right.expression),
                        },
                    });
                }
            }

            start = end;
        }

        Ok(results)
    }

    fn parse_exp1(&mut self, cursor: usize) -> Outcome<'a> {
        self.parse_binary(cursor, Self::parse_primitive, multiplicative)
    }

    fn parse_exp2(&mut self, cursor: usize) -> Outcome<'a> {
        self.parse_binary(cursor, Self::parse_exp1, additive)
    }

    fn parse_exp3(&mut self, cursor: usize) -> Outcome<'a> {
        self.parse_binary(cursor, Self::parse_exp2, concatenation)
    }

    fn parse_exp4(&mut self, cursor: usize) -> Outcome<'a> {
        self.parse_binary(cursor, Self::parse_exp3, relational)
    }

    fn parse_exp5(&mut self, cursor: usize) -> Outcome<'a> {
        self.parse_binary(cursor, Self::parse_exp4, conjunction)
    }

    /// `<expression>`
    pub fn parse_expression(&mut self, cursor: usize) -> Outcome<'a> {
        if let Some(outcome) = self.expressions.get(&cursor) {
            return outcome.clone();
        }

        let outcome = self.parse_binary(cursor, Self::parse_exp5, disjunction);
        self.expressions.insert(cursor, outcome.clone());
        outcome
    }

    // ────────────────────────────── statements ───────────────────────────────

    /// Every sentence or block symbol matched from the first token.
    pub fn parse_sentences(&mut self) -> Outcome<'a> {
        let ids = self.candidates.statements.clone();
        self.parse_candidates(&ids, 0, "<sentence>")
    }

    fn with_failure(&self, error: CodeError) -> CodeError {
        match &self.failure {
            Some(failure) => error.fold(failure.clone()),
            None => error,
        }
    }

    /// Keep the alternatives that consume every token.  One distinct tree
    /// wins; more is an ambiguity naming each of them.
    pub fn select(&self, outcome: Outcome<'a>) -> Result<Expression<'a>, CodeError> {
        let mut complete: Vec<Expression<'a>> = Vec::new();
        let mut furthest = 0;

        let found = outcome.map_err(|e| self.with_failure(e))?;
        for found in found {
            if found.cursor == self.tokens.len() {
                if !complete.contains(&found.expression) {
                    complete.push(found.expression);
                }
            } else {
                furthest = furthest.max(found.cursor);
            }
        }

        match complete.len() {
            0 => Err(self.with_failure(CodeError::mismatch(
                self.position_at(furthest),
                "end of line",
            ))),
            1 => Ok(complete.remove(0)),
            _ => Err(CodeError::new(
                self.position_at(0),
                ErrorKind::Ambiguous {
                    alternatives: complete
                        .iter()
                        .map(|expression| expression.to_log(self.stack))
                        .collect(),
                },
            )),
        }
    }

    /// The first illegal assignment target among the whole‑line completions
    /// of a relaxed parse.
    fn illegal_assignable(&mut self) -> Option<CodeError> {
        let stack = self.stack;
        let end = self.tokens.len();
        let found = self.parse_sentences().ok()?;

        found
            .iter()
            .filter(|candidate| candidate.cursor == end)
            .find_map(|candidate| {
                let targets = candidate
                    .expression
                    .slot_arguments(stack, FragmentKind::Assignable);

                classify_assignable_targets(targets, stack)
                    .err()
                    .map(|illegal| {
                        CodeError::new(
                            illegal.position(),
                            ErrorKind::IllegalAssignable {
                                expression: illegal.to_log(stack),
                            },
                        )
                    })
            })
    }
}

/// Parse one line as a statement and register the names it declares in the
/// innermost scope.
pub fn parse_statement<'a>(
    stack: &mut GrammarStack,
    tokens: &'a [Token<'a>],
) -> Result<Expression<'a>, CodeError> {
    let selected = {
        let mut parser = Parser::new(stack, tokens);
        let outcome = parser.parse_sentences();
        parser.select(outcome)
    };

    let statement = match selected {
        Ok(statement) => statement,
        Err(error) if matches!(error.kind, ErrorKind::Ambiguous { .. }) => return Err(error),
        Err(error) => {
            let illegal = Parser::relaxed(stack, tokens).illegal_assignable();
            return Err(illegal.unwrap_or(error));
        }
    };

    info!("Selected statement {}", statement.to_log(stack));

    declare_new_assignables(stack, &statement);

    Ok(statement)
}

/// Parse a whole token slice as one `<expression>`.
pub fn parse_expression<'a>(
    stack: &GrammarStack,
    tokens: &'a [Token<'a>],
) -> Result<Expression<'a>, CodeError> {
    let mut parser = Parser::new(stack, tokens);
    let outcome = parser.parse_expression(0);
    parser.select(outcome)
}

fn declare_new_assignables(stack: &mut GrammarStack, statement: &Expression<'_>) {
    let mut found = Assignables::default();
    statement.collect_new_assignable(stack, &mut found);

    let mut symbols: Vec<GrammarSymbol> = Vec::new();
    for expression in found.new_assignables {
        if let Expression::NewDeclaration(name) = expression {
            let symbol = name.to_symbol();
            if !symbols.iter().any(|other| other.signature() == symbol.signature()) {
                symbols.push(symbol);
            }
        }
    }

    for symbol in symbols {
        info!("Declaring new name '{}'", symbol);
        stack.declare(symbol);
    }
}
