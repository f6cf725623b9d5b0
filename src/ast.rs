//! Hand‑off from expression trees to a downstream lowering stage.
//!
//! The matcher knows nothing about the target representation.  A backend implements
//! [`AstGenerator`], one method per node shape, and [`Expression::generate_ast`] walks the
//! tree bottom‑up calling it.  Each call returns an [`AstResult`]: the lowered node plus
//! any auxiliary declarations the backend had to synthesise for it (for instance the
//! continuation lambda a `call continuation` statement needs).  Auxiliaries of children
//! are carried upward ahead of the parent's own.

use crate::expression::{BinaryOperator, Expression, SymbolName, UnaryOperator};
use crate::grammar::GrammarSymbol;
use crate::stack::{GrammarStack, SymbolId};
use crate::token::{Position, Token};

/// A lowered node and the extra declarations it requires.
#[derive(Debug, Clone, PartialEq)]
pub struct AstResult<N> {
    pub value: N,
    pub auxiliary: Vec<N>,
}

impl<N> AstResult<N> {
    pub fn new(value: N) -> Self {
        Self {
            value,
            auxiliary: Vec::new(),
        }
    }

    pub fn with_auxiliary(mut self, declaration: N) -> Self {
        self.auxiliary.push(declaration);
        self
    }
}

impl<N> From<N> for AstResult<N> {
    fn from(value: N) -> Self {
        Self::new(value)
    }
}

/// Downstream lowering backend.
///
/// `Scope` resolves names, `Declaration` is the enclosing declaration being generated
/// and `Module` the owning module.  The tree never inspects any of them.
pub trait AstGenerator {
    type Node;
    type Scope;
    type Declaration;
    type Module;
    type Error;

    fn literal(
        &mut self,
        token: &Token<'_>,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    fn new_declaration(
        &mut self,
        name: &SymbolName<'_>,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    /// A symbol used by value or as a type.
    fn reference(
        &mut self,
        id: SymbolId,
        symbol: &GrammarSymbol,
        position: Position,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    /// A symbol applied to its lowered slot arguments, in slot order.
    fn invoke(
        &mut self,
        id: SymbolId,
        symbol: &GrammarSymbol,
        arguments: Vec<Self::Node>,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    /// An invocation whose callee is a computed expression rather than a symbol.
    fn apply(
        &mut self,
        function: Self::Node,
        arguments: Vec<Self::Node>,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    fn list(
        &mut self,
        elements: Vec<Self::Node>,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    fn unary(
        &mut self,
        op: UnaryOperator,
        operand: Self::Node,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;

    fn binary(
        &mut self,
        op: BinaryOperator,
        left: Self::Node,
        right: Self::Node,
        scope: &Self::Scope,
        declaration: &Self::Declaration,
        module: &Self::Module,
    ) -> Result<AstResult<Self::Node>, Self::Error>;
}

impl<'a> Expression<'a> {
    /// Lower this tree through `generator`.
    pub fn generate_ast<G: AstGenerator>(
        &self,
        stack: &GrammarStack,
        generator: &mut G,
        scope: &G::Scope,
        declaration: &G::Declaration,
        module: &G::Module,
    ) -> Result<AstResult<G::Node>, G::Error> {
        let mut auxiliary: Vec<G::Node> = Vec::new();

        let mut lower = |expr: &Expression<'_>, generator: &mut G| -> Result<G::Node, G::Error> {
            let result = expr.generate_ast(stack, generator, scope, declaration, module)?;
            auxiliary.extend(result.auxiliary);
            Ok(result.value)
        };

        let mut result = match self {
            Expression::Literal(token) => generator.literal(token, scope, declaration, module)?,

            Expression::NewDeclaration(name) => {
                generator.new_declaration(name, scope, declaration, module)?
            }

            Expression::Reference { symbol, position } => generator.reference(
                *symbol,
                stack.symbol(*symbol),
                *position,
                scope,
                declaration,
                module,
            )?,

            Expression::Invocation {
                function,
                arguments,
            } => {
                let mut lowered = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    lowered.push(lower(argument, generator)?);
                }

                match function.as_ref() {
                    Expression::Reference { symbol, .. } => generator.invoke(
                        *symbol,
                        stack.symbol(*symbol),
                        lowered,
                        scope,
                        declaration,
                        module,
                    )?,
                    other => {
                        let function = lower(other, generator)?;
                        generator.apply(function, lowered, scope, declaration, module)?
                    }
                }
            }

            Expression::List { elements, .. } => {
                let mut lowered = Vec::with_capacity(elements.len());
                for element in elements {
                    lowered.push(lower(element, generator)?);
                }
                generator.list(lowered, scope, declaration, module)?
            }

            Expression::Unary { op, operand, .. } => {
                let operand = lower(operand, generator)?;
                generator.unary(*op, operand, scope, declaration, module)?
            }

            Expression::Binary { op, left, right } => {
                let left = lower(left, generator)?;
                let right = lower(right, generator)?;
                generator.binary(*op, left, right, scope, declaration, module)?
            }
        };

        auxiliary.append(&mut result.auxiliary);
        result.auxiliary = auxiliary;

        Ok(result)
    }
}
