//! Expression trees produced by the matcher.
//!
//! Every node exclusively owns its children.  Grammar symbols are not owned by the tree;
//! `Reference` nodes carry a [`SymbolId`] handle into the [`GrammarStack`] arena, so the
//! operations that need symbol text (rendering, assignable collection, lowering) take the
//! stack as an argument.

use serde::Serialize;

use crate::grammar::{FragmentKind, GrammarSymbol};
use crate::stack::{GrammarStack, SymbolId};
use crate::token::{Position, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOperator {
    Positive,
    Negative,
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Positive => "+",
            UnaryOperator::Negative => "-",
            UnaryOperator::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOperator {
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    LT,
    GT,
    LE,
    GE,
    EQ,
    NE,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Concat => "&",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::IntDiv => "\\",
            BinaryOperator::Mod => "%",
            BinaryOperator::LT => "<",
            BinaryOperator::GT => ">",
            BinaryOperator::LE => "<=",
            BinaryOperator::GE => ">=",
            BinaryOperator::EQ => "=",
            BinaryOperator::NE => "<>",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

/// The words of a name introduced by an `<assignable>` or `<argument>` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolName<'a> {
    pub identifiers: Vec<&'a Token<'a>>,
}

impl<'a> SymbolName<'a> {
    pub fn text(&self) -> String {
        self.identifiers
            .iter()
            .map(|token| token.lexeme)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn position(&self) -> Position {
        self.identifiers
            .first()
            .map(|token| token.position())
            .unwrap_or_default()
    }

    /// The variable symbol this name declares.
    pub fn to_symbol(&self) -> GrammarSymbol {
        GrammarSymbol::variable(&self.text())
    }
}

/// A node of the parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression<'a> {
    /// Numbers and strings.
    Literal(&'a Token<'a>),

    /// A name created by an `<assignable>` or `<argument>` slot.
    NewDeclaration(SymbolName<'a>),

    /// A visible grammar symbol used as a value, a type, or an invoked function.
    Reference { symbol: SymbolId, position: Position },

    Invocation {
        function: Box<Expression<'a>>,
        arguments: Vec<Expression<'a>>,
    },

    List {
        elements: Vec<Expression<'a>>,
        position: Position,
    },

    Unary {
        op: UnaryOperator,
        operand: Box<Expression<'a>>,
        position: Position,
    },

    Binary {
        op: BinaryOperator,
        left: Box<Expression<'a>>,
        right: Box<Expression<'a>>,
    },
}

/// What a statement declares or mutates, as gathered by
/// [`Expression::collect_new_assignable`].
#[derive(Debug, Default)]
pub struct Assignables<'e, 'a> {
    pub new_assignables: Vec<&'e Expression<'a>>,
    pub new_arguments: Vec<&'e Expression<'a>>,
    pub modified_assignables: Vec<&'e Expression<'a>>,
}

impl<'a> Expression<'a> {
    /// Source position of the first token this node covers.
    pub fn position(&self) -> Position {
        match self {
            Expression::Literal(token) => token.position(),
            Expression::NewDeclaration(name) => name.position(),
            Expression::Reference { position, .. }
            | Expression::List { position, .. }
            | Expression::Unary { position, .. } => *position,
            Expression::Invocation { function, .. } => function.position(),
            Expression::Binary { left, .. } => left.position(),
        }
    }

    /// The symbol an invocation calls, or the symbol a reference names.
    pub fn symbol(&self) -> Option<SymbolId> {
        match self {
            Expression::Reference { symbol, .. } => Some(*symbol),
            Expression::Invocation { function, .. } => function.symbol(),
            _ => None,
        }
    }

    /// Sort sub‑nodes into new names, new block arguments and mutated names.
    ///
    /// Slot kinds come from the invoked symbol: a `NewDeclaration` in an
    /// `<assignable>` slot is a new assignable, a `Reference` there is a
    /// modification, and a `NewDeclaration` in an `<argument>` slot is a new
    /// argument.  Everything else is searched recursively.
    pub fn collect_new_assignable<'e>(
        &'e self,
        stack: &GrammarStack,
        found: &mut Assignables<'e, 'a>,
    ) {
        match self {
            Expression::Literal(_) | Expression::Reference { .. } => {}

            Expression::NewDeclaration(_) => found.new_assignables.push(self),

            Expression::Invocation {
                function,
                arguments,
            } => {
                let Some(id) = function.symbol() else {
                    function.collect_new_assignable(stack, found);
                    for argument in arguments {
                        argument.collect_new_assignable(stack, found);
                    }
                    return;
                };

                for (fragment, argument) in stack.symbol(id).slots().zip(arguments) {
                    match (fragment.kind(), argument) {
                        (FragmentKind::Assignable, Expression::NewDeclaration(_)) => {
                            found.new_assignables.push(argument)
                        }
                        (FragmentKind::Assignable, Expression::Reference { .. }) => {
                            found.modified_assignables.push(argument)
                        }
                        (FragmentKind::Argument, Expression::NewDeclaration(_)) => {
                            found.new_arguments.push(argument)
                        }
                        _ => argument.collect_new_assignable(stack, found),
                    }
                }
            }

            Expression::List { elements, .. } => {
                for element in elements {
                    element.collect_new_assignable(stack, found);
                }
            }

            Expression::Unary { operand, .. } => operand.collect_new_assignable(stack, found),

            Expression::Binary { left, right, .. } => {
                left.collect_new_assignable(stack, found);
                right.collect_new_assignable(stack, found);
            }
        }
    }

    /// Arguments filling this invocation's own slots of `kind`.
    pub fn slot_arguments(&self, stack: &GrammarStack, kind: FragmentKind) -> Vec<&Expression<'a>> {
        match self {
            Expression::Invocation {
                function,
                arguments,
            } => match function.symbol() {
                Some(id) => stack
                    .symbol(id)
                    .slots()
                    .zip(arguments)
                    .filter(|(fragment, _)| fragment.kind() == kind)
                    .map(|(_, argument)| argument)
                    .collect(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Names a block header declares for its body.
    pub fn block_arguments(&self, stack: &GrammarStack) -> Vec<&SymbolName<'a>> {
        self.slot_arguments(stack, FragmentKind::Argument)
            .into_iter()
            .filter_map(|argument| match argument {
                Expression::NewDeclaration(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

/// Check expressions meant as assignment targets.
///
/// Each target must be a `Reference` to a mutable symbol or a `NewDeclaration`.
/// Returns how many targets there are, or the first one that is neither.
pub fn classify_assignable_targets<'e, 'a: 'e, I>(
    targets: I,
    stack: &GrammarStack,
) -> Result<usize, &'e Expression<'a>>
where
    I: IntoIterator<Item = &'e Expression<'a>>,
{
    let mut count = 0;
    for target in targets {
        let legal = match target {
            Expression::NewDeclaration(_) => true,
            Expression::Reference { symbol, .. } => stack.symbol(*symbol).is_mutable(),
            _ => false,
        };

        if !legal {
            return Err(target);
        }
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{SymbolClass, SymbolTarget};
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use crate::stack::GrammarScope;
    use crate::token::TokenType;

    /// Builtins, a `total` variable and `copy <assignable> into <assignable> naming <argument>`.
    fn stack() -> GrammarStack {
        let copy = GrammarSymbol::from_pattern(
            SymbolClass::SENTENCE,
            SymbolTarget::Custom,
            "copy <assignable> into <assignable> naming <argument>",
        )
        .unwrap();

        let mut stack = GrammarStack::with_predefined();
        stack.push(
            GrammarScope::new()
                .with(GrammarSymbol::variable("total"))
                .with(copy),
        );
        stack
    }

    fn statement<'a>(stack: &GrammarStack, tokens: &'a [Token<'a>]) -> Expression<'a> {
        let mut parser = Parser::new(stack, tokens);
        let outcome = parser.parse_sentences();
        parser.select(outcome).unwrap()
    }

    fn logs(stack: &GrammarStack, expressions: &[&Expression<'_>]) -> Vec<String> {
        expressions.iter().map(|e| e.to_log(stack)).collect()
    }

    #[test]
    fn collect_sorts_slots_by_kind() {
        let stack = stack();
        let tokens = Scanner::tokenize(b"copy x into total naming item").unwrap();
        let copy = statement(&stack, &tokens);

        let mut found = Assignables::default();
        copy.collect_new_assignable(&stack, &mut found);

        assert_eq!(logs(&stack, &found.new_assignables), ["$(x)"]);
        assert_eq!(logs(&stack, &found.modified_assignables), ["total"]);
        assert_eq!(logs(&stack, &found.new_arguments), ["$(item)"]);
    }

    #[test]
    fn collect_searches_nested_expressions() {
        let stack = stack();
        let tokens = Scanner::tokenize(b"set y to total + 1").unwrap();
        let set = statement(&stack, &tokens);

        let mut found = Assignables::default();
        set.collect_new_assignable(&stack, &mut found);

        assert_eq!(logs(&stack, &found.new_assignables), ["$(y)"]);
        assert!(found.modified_assignables.is_empty());
        assert!(found.new_arguments.is_empty());
    }

    #[test]
    fn classify_counts_legal_targets() {
        let stack = stack();
        let tokens = Scanner::tokenize(b"copy x into total naming item").unwrap();
        let copy = statement(&stack, &tokens);

        let targets = copy.slot_arguments(&stack, FragmentKind::Assignable);

        assert_eq!(classify_assignable_targets(targets, &stack), Ok(2));
        assert_eq!(classify_assignable_targets(Vec::new(), &stack), Ok(0));
    }

    #[test]
    fn classify_reports_the_first_illegal_target() {
        let stack = stack();
        let total = stack.lookup("n(total)").unwrap();
        let truth = stack.lookup("n(true)").unwrap();
        let one = Token::new(TokenType::INTEGER(1), "1", 1, 9);

        let legal = Expression::Reference {
            symbol: total,
            position: Position::new(1, 1),
        };
        let constant = Expression::Reference {
            symbol: truth,
            position: Position::new(1, 5),
        };
        let literal = Expression::Literal(&one);

        let targets = [&legal, &constant, &literal];
        assert_eq!(classify_assignable_targets(targets, &stack), Err(&constant));
        assert_eq!(classify_assignable_targets([&legal, &literal], &stack), Err(&literal));
    }
}
