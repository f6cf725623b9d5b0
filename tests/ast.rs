#[cfg(test)]
mod ast_tests {
    use phrasal::ast::{AstGenerator, AstResult};
    use phrasal::expression::{BinaryOperator, SymbolName, UnaryOperator};
    use phrasal::grammar::{GrammarSymbol, SymbolTarget};
    use phrasal::parser::parse_statement;
    use phrasal::scanner::Scanner;
    use phrasal::stack::{GrammarScope, GrammarStack, SymbolId};
    use phrasal::token::{Position, Token};
    use pretty_assertions::assert_eq;

    /// Lowers to prefix strings; continuation‑shaped targets get a lambda.
    #[derive(Default)]
    struct Prefix {
        lambdas: usize,
    }

    type Lowered = Result<AstResult<String>, String>;

    impl AstGenerator for Prefix {
        type Node = String;
        type Scope = ();
        type Declaration = ();
        type Module = ();
        type Error = String;

        fn literal(&mut self, token: &Token<'_>, _: &(), _: &(), _: &()) -> Lowered {
            if token.lexeme == "0" {
                return Err(format!("zero at {}", token.position()));
            }
            Ok(token.lexeme.to_owned().into())
        }

        fn new_declaration(&mut self, name: &SymbolName<'_>, _: &(), _: &(), _: &()) -> Lowered {
            Ok(format!("new:{}", name.text()).into())
        }

        fn reference(
            &mut self,
            _: SymbolId,
            symbol: &GrammarSymbol,
            _: Position,
            _: &(),
            _: &(),
            _: &(),
        ) -> Lowered {
            Ok(symbol.to_string().into())
        }

        fn invoke(
            &mut self,
            _: SymbolId,
            symbol: &GrammarSymbol,
            arguments: Vec<String>,
            _: &(),
            _: &(),
            _: &(),
        ) -> Lowered {
            let result = AstResult::new(format!("({} {})", symbol.signature(), arguments.join(" ")));

            match symbol.target() {
                SymbolTarget::CallContinuation | SymbolTarget::Invoke => {
                    let lambda = format!("lambda{}", self.lambdas);
                    self.lambdas += 1;
                    Ok(result.with_auxiliary(lambda))
                }
                _ => Ok(result),
            }
        }

        fn apply(&mut self, function: String, arguments: Vec<String>, _: &(), _: &(), _: &()) -> Lowered {
            Ok(format!("(apply {} {})", function, arguments.join(" ")).into())
        }

        fn list(&mut self, elements: Vec<String>, _: &(), _: &(), _: &()) -> Lowered {
            Ok(format!("(list {})", elements.join(" ")).into())
        }

        fn unary(&mut self, op: UnaryOperator, operand: String, _: &(), _: &(), _: &()) -> Lowered {
            Ok(format!("({} {})", op.symbol(), operand).into())
        }

        fn binary(
            &mut self,
            op: BinaryOperator,
            left: String,
            right: String,
            _: &(),
            _: &(),
            _: &(),
        ) -> Lowered {
            Ok(format!("({} {} {})", op.symbol(), left, right).into())
        }
    }

    fn lower(stack: &mut GrammarStack, source: &str) -> Lowered {
        let tokens = Scanner::tokenize(source.as_bytes()).unwrap();
        let statement = parse_statement(stack, &tokens).unwrap();
        statement.generate_ast(stack, &mut Prefix::default(), &(), &(), &())
    }

    fn stack_with(names: &[&str]) -> GrammarStack {
        let mut stack = GrammarStack::with_predefined();
        let mut scope = GrammarScope::new();
        for name in names {
            scope.add(GrammarSymbol::variable(name));
        }
        stack.push(scope);
        stack
    }

    #[test]
    fn lowers_bottom_up_in_slot_order() {
        let mut stack = stack_with(&[]);

        let result = lower(&mut stack, "set x to -1 + 2 * 3").unwrap();

        assert_eq!(result.value, "(n(set)an(to)e new:x (+ (- 1) (* 2 3)))");
        assert!(result.auxiliary.is_empty());
    }

    #[test]
    fn continuation_lambdas_bubble_up_children_first() {
        let mut stack = stack_with(&["k", "f"]);

        let result = lower(&mut stack, "call continuation k with (invoke f, 2)").unwrap();

        assert_eq!(
            result.value,
            "(n(call continuation)en(with)l k (list (n(invoke)p f) 2))"
        );
        assert_eq!(result.auxiliary, vec!["lambda0", "lambda1"]);
    }

    #[test]
    fn backend_errors_propagate() {
        let mut stack = stack_with(&["k"]);

        let err = lower(&mut stack, "call k + (1 - 0)").unwrap_err();

        assert_eq!(err, "zero at line 1, column 15");
    }
}
