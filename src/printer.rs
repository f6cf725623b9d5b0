use crate::expression::Expression;
use crate::grammar::{FragmentKind, SymbolClass};
use crate::stack::GrammarStack;

/// Renders expression trees in two forms.
///
/// * **log** form is unambiguous and meant for diagnostics and tests:
///   `[sum from <expression> to <expression>](1, (x + 2))`, `$(new name)`, `{1, 2}`.
/// * **code** form is parseable source: feeding it back through the matcher
///   with the same grammar reproduces the same log form.
pub struct ExpressionPrinter<'s> {
    stack: &'s GrammarStack,
}

impl<'s> ExpressionPrinter<'s> {
    pub fn new(stack: &'s GrammarStack) -> Self {
        Self { stack }
    }

    pub fn log(&self, expr: &Expression<'_>) -> String {
        match expr {
            // ── leaves ──────────────────────────────────────────────────
            Expression::Literal(token) => token.lexeme.into(),

            Expression::NewDeclaration(name) => format!("$({})", name.text()),

            Expression::Reference { symbol, .. } => self.stack.symbol(*symbol).to_string(),

            // ── invocation ──────────────────────────────────────────────
            Expression::Invocation {
                function,
                arguments,
            } => {
                let mut s = match function.as_ref() {
                    Expression::Reference { symbol, .. } => {
                        format!("[{}](", self.stack.symbol(*symbol))
                    }
                    other => format!("{}(", self.log(other)),
                };
                s.push_str(&self.join(arguments, |e| self.log(e)));
                s.push(')');
                s
            }

            Expression::List { elements, .. } => {
                format!("{{{}}}", self.join(elements, |e| self.log(e)))
            }

            // ── operators ───────────────────────────────────────────────
            Expression::Unary { op, operand, .. } => self.unary(op.symbol(), &self.log(operand)),

            Expression::Binary { op, left, right } => {
                format!("({} {} {})", self.log(left), op.symbol(), self.log(right))
            }
        }
    }

    pub fn code(&self, expr: &Expression<'_>) -> String {
        match expr {
            Expression::Literal(token) => token.lexeme.into(),

            Expression::NewDeclaration(name) => name.text(),

            Expression::Reference { symbol, .. } => self.stack.symbol(*symbol).to_string(),

            Expression::Invocation {
                function,
                arguments,
            } => {
                let Some(id) = function.symbol() else {
                    return format!(
                        "{} with ({})",
                        self.code(function),
                        self.join(arguments, |e| self.code(e))
                    );
                };

                let symbol = self.stack.symbol(id);
                let mut arguments = arguments.iter();
                let mut parts: Vec<String> = Vec::with_capacity(symbol.fragments().len());

                for fragment in symbol.fragments() {
                    match fragment.kind() {
                        FragmentKind::Name => parts.push(fragment.identifiers().join(" ")),
                        _ => {
                            if let Some(argument) = arguments.next() {
                                parts.push(self.code(argument));
                            }
                        }
                    }
                }

                let s = parts.join(" ");
                if symbol
                    .class()
                    .intersects(SymbolClass::PHRASE | SymbolClass::VALUE_FORM)
                {
                    format!("({})", s)
                } else {
                    s
                }
            }

            Expression::List { elements, .. } => {
                format!("({})", self.join(elements, |e| self.code(e)))
            }

            Expression::Unary { op, operand, .. } => self.unary(op.symbol(), &self.code(operand)),

            Expression::Binary { op, left, right } => {
                format!("({} {} {})", self.code(left), op.symbol(), self.code(right))
            }
        }
    }

    fn unary(&self, op: &str, operand: &str) -> String {
        // words need a separating space, punctuators must not get one
        if op.chars().all(char::is_alphabetic) {
            format!("({} {})", op, operand)
        } else {
            format!("({}{})", op, operand)
        }
    }

    fn join<'e, 'a: 'e, F>(&self, exprs: &'e [Expression<'a>], render: F) -> String
    where
        F: Fn(&'e Expression<'a>) -> String,
    {
        exprs.iter().map(render).collect::<Vec<_>>().join(", ")
    }
}

impl<'a> Expression<'a> {
    /// Diagnostic rendering; see [`ExpressionPrinter::log`].
    pub fn to_log(&self, stack: &GrammarStack) -> String {
        ExpressionPrinter::new(stack).log(self)
    }

    /// Source rendering; see [`ExpressionPrinter::code`].
    pub fn to_code(&self, stack: &GrammarStack) -> String {
        ExpressionPrinter::new(stack).code(self)
    }
}
