#[cfg(test)]
mod parser_tests {
    use phrasal::error::{CodeError, ErrorKind};
    use phrasal::grammar::{GrammarSymbol, SymbolClass, SymbolTarget};
    use phrasal::parser::{parse_expression, parse_statement};
    use phrasal::scanner::Scanner;
    use phrasal::stack::{GrammarScope, GrammarStack};
    use phrasal::token::{Position, Token};
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        Scanner::tokenize(source.as_bytes()).unwrap()
    }

    /// Builtins plus a scope holding the variables `a`, `b`, `c` and `o`.
    fn stack_with_variables() -> GrammarStack {
        let mut stack = GrammarStack::with_predefined();
        stack.push(
            GrammarScope::new()
                .with(GrammarSymbol::variable("a"))
                .with(GrammarSymbol::variable("b"))
                .with(GrammarSymbol::variable("c"))
                .with(GrammarSymbol::variable("o")),
        );
        stack
    }

    fn expression_log(stack: &GrammarStack, source: &str) -> String {
        let tokens = tokens(source);
        match parse_expression(stack, &tokens) {
            Ok(expression) => expression.to_log(stack),
            Err(e) => panic!("failed to parse {:?}: {}", source, e),
        }
    }

    fn statement_log(stack: &mut GrammarStack, source: &str) -> String {
        let tokens = tokens(source);
        match parse_statement(stack, &tokens) {
            Ok(statement) => statement.to_log(stack),
            Err(e) => panic!("failed to parse {:?}: {}", source, e),
        }
    }

    fn statement_error(stack: &mut GrammarStack, source: &str) -> CodeError {
        let tokens = tokens(source);
        match parse_statement(stack, &tokens) {
            Ok(statement) => panic!("{:?} parsed as {}", source, statement.to_log(stack)),
            Err(e) => e,
        }
    }

    // ───────────────────────────── operator chain ─────────────────────────────

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let stack = stack_with_variables();

        assert_eq!(expression_log(&stack, "a + b * c"), "(a + (b * c))");
        assert_eq!(expression_log(&stack, "a * b + c"), "((a * b) + c)");
        assert_eq!(expression_log(&stack, "1 + 2 * 3"), "(1 + (2 * 3))");
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let stack = stack_with_variables();

        assert_eq!(expression_log(&stack, "a - b - c"), "((a - b) - c)");
        assert_eq!(expression_log(&stack, "a / b % c"), "((a / b) % c)");
        assert_eq!(expression_log(&stack, "a < b = c"), "((a < b) = c)");
    }

    #[test]
    fn six_levels_of_precedence() {
        let stack = stack_with_variables();

        assert_eq!(
            expression_log(&stack, "a + 1 <= b * 2"),
            "((a + 1) <= (b * 2))"
        );
        assert_eq!(
            expression_log(&stack, "a & b + c"),
            "(a & (b + c))"
        );
        assert_eq!(
            expression_log(&stack, "a or b and c <> 1"),
            "(a or (b and (c <> 1)))"
        );
        assert_eq!(expression_log(&stack, "a \\ 2 & \"x\""), "((a \\ 2) & \"x\")");
    }

    #[test]
    fn unary_operators_bind_to_one_primitive() {
        let stack = stack_with_variables();

        assert_eq!(
            expression_log(&stack, "not a and b or c"),
            "(((not a) and b) or c)"
        );
        assert_eq!(expression_log(&stack, "-a * b"), "((-a) * b)");
        assert_eq!(expression_log(&stack, "a - -1"), "(a - (-1))");
        assert_eq!(expression_log(&stack, "+(a + b)"), "(+(a + b))");
    }

    #[test]
    fn parentheses_override_precedence() {
        let stack = stack_with_variables();

        assert_eq!(expression_log(&stack, "(a + b) * c"), "((a + b) * c)");
    }

    #[test]
    fn dangling_operator_reports_the_furthest_failure() {
        let stack = stack_with_variables();
        let tokens = tokens("1 +");

        let err = parse_expression(&stack, &tokens).unwrap_err();

        assert_eq!(err.position, Position::new(1, 4));
        assert_eq!(
            err.kind,
            ErrorKind::NoViableSymbol {
                expected: vec!["<primitive>".to_owned()]
            }
        );
    }

    // ───────────────────────────── phrases ──────────────────────────────

    #[test]
    fn builtin_values_and_types() {
        let stack = stack_with_variables();

        assert_eq!(expression_log(&stack, "true"), "true");
        assert_eq!(expression_log(&stack, "the result + 1"), "(the result + 1)");
        assert_eq!(expression_log(&stack, "new integer"), "[new <type>](integer)");
        assert_eq!(
            expression_log(&stack, "new object of (1, \"two\")"),
            "[new <type> of <list>](object, {1, \"two\"})"
        );
        assert_eq!(
            expression_log(&stack, "length of array a + 1"),
            "([length of array <primitive>](a) + 1)"
        );
    }

    #[test]
    fn left_extension_uses_the_parsed_primitive_as_first_slot() {
        let stack = stack_with_variables();

        assert_eq!(
            expression_log(&stack, "a is integer"),
            "[<primitive> is <type>](a, integer)"
        );
        assert_eq!(
            expression_log(&stack, "a is not string or b"),
            "([<primitive> is not <type>](a, string) or b)"
        );
        assert_eq!(
            expression_log(&stack, "(field x of o) is object"),
            "[<primitive> is <type>]([field <argument> of <primitive>]($(x), o), object)"
        );
    }

    #[test]
    fn left_extension_inside_a_trailing_slot_is_ambiguous() {
        let stack = stack_with_variables();
        let tokens = tokens("field x of o is object");

        let err = parse_expression(&stack, &tokens).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::Ambiguous {
                alternatives: vec![
                    "[field <argument> of <primitive>]($(x), [<primitive> is <type>](o, object))"
                        .to_owned(),
                    "[<primitive> is <type>]([field <argument> of <primitive>]($(x), o), object)"
                        .to_owned(),
                ]
            }
        );
    }

    #[test]
    fn left_extension_keeps_the_seed_position() {
        let stack = stack_with_variables();
        let tokens = tokens("1 + b is integer");

        let expression = parse_expression(&stack, &tokens).unwrap();

        assert_eq!(
            expression.to_log(&stack),
            "(1 + [<primitive> is <type>](b, integer))"
        );
        match expression {
            phrasal::expression::Expression::Binary { right, .. } => {
                assert_eq!(right.position(), Position::new(1, 5));
            }
            other => panic!("expected a binary expression, got {:?}", other),
        }
    }

    #[test]
    fn user_phrases_take_part_in_expressions() {
        let mut stack = stack_with_variables();
        stack.push(GrammarScope::new().with(
            GrammarSymbol::from_pattern(
                SymbolClass::PHRASE,
                SymbolTarget::Custom,
                "sum from <expression> to <expression>",
            )
            .unwrap(),
        ));

        assert_eq!(
            expression_log(&stack, "2 * sum from 1 to a"),
            "(2 * [sum from <expression> to <expression>](1, a))"
        );
        assert_eq!(
            expression_log(&stack, "(sum from 1 to a) + 1"),
            "([sum from <expression> to <expression>](1, a) + 1)"
        );

        // the trailing slot may or may not swallow "+ 1"
        let tokens = tokens("2 * sum from 1 to a + 1");
        let err = parse_expression(&stack, &tokens).unwrap_err();
        assert!(
            matches!(&err.kind, ErrorKind::Ambiguous { alternatives } if alternatives.len() == 2),
            "unexpected error {}",
            err
        );
    }

    // ───────────────────────────── statements ───────────────────────────────

    #[test]
    fn assignment_to_an_unbound_name_declares_it_once() {
        let mut stack = GrammarStack::with_predefined();
        stack.push(GrammarScope::new());

        assert_eq!(
            statement_log(&mut stack, "set x to 1"),
            "[set <assignable> to <expression>]($(x), 1)"
        );

        let x = stack.lookup("n(x)").expect("x is declared");
        assert!(stack.symbol(x).is_mutable());
        let values = stack.visible(SymbolClass::VALUE_FORM).len();

        assert_eq!(
            statement_log(&mut stack, "set x to x + 2"),
            "[set <assignable> to <expression>](x, (x + 2))"
        );
        assert_eq!(stack.lookup("n(x)"), Some(x));
        assert_eq!(stack.visible(SymbolClass::VALUE_FORM).len(), values);
    }

    #[test]
    fn assignable_can_reuse_the_result() {
        let mut stack = GrammarStack::with_predefined();

        assert_eq!(
            statement_log(&mut stack, "set the result to 3"),
            "[set <assignable> to <expression>](the result, 3)"
        );
    }

    #[test]
    fn field_assignment_is_not_read_as_a_new_variable() {
        let mut stack = stack_with_variables();

        assert_eq!(
            statement_log(&mut stack, "set field x of o to 1"),
            "[set field <argument> of <expression> to <expression>]($(x), o, 1)"
        );
        assert_eq!(stack.lookup("n(field x of o)"), None);
        assert_eq!(stack.lookup("n(x)"), None);
    }

    #[test]
    fn assigning_to_a_literal_is_illegal() {
        let mut stack = GrammarStack::with_predefined();

        let err = statement_error(&mut stack, "set 1 to 2");

        assert_eq!(err.position, Position::new(1, 5));
        assert_eq!(
            err.kind,
            ErrorKind::IllegalAssignable {
                expression: "1".to_owned()
            }
        );
        assert_eq!(err.to_string(), "[line 1, column 5] Error: 1 cannot be assigned to");
    }

    #[test]
    fn assignable_reuses_a_name_spelled_in_another_case() {
        let mut stack = GrammarStack::with_predefined();
        stack.push(GrammarScope::new());

        assert_eq!(
            statement_log(&mut stack, "set Total to 1"),
            "[set <assignable> to <expression>]($(Total), 1)"
        );
        let total = stack.lookup("n(total)").expect("Total is declared");
        let values = stack.visible(SymbolClass::VALUE_FORM).len();

        assert_eq!(
            statement_log(&mut stack, "set total to 2"),
            "[set <assignable> to <expression>](Total, 2)"
        );
        assert_eq!(stack.lookup("n(total)"), Some(total));
        assert_eq!(stack.visible(SymbolClass::VALUE_FORM).len(), values);

        assert_eq!(
            statement_log(&mut stack, "set y to Total"),
            "[set <assignable> to <expression>]($(y), Total)"
        );
    }

    #[test]
    fn capitalised_sentence_words_still_match() {
        let mut stack = GrammarStack::with_predefined();

        let err = statement_error(&mut stack, "Set 1 to 2");

        assert_eq!(err.position, Position::new(1, 5));
        assert_eq!(
            err.kind,
            ErrorKind::IllegalAssignable {
                expression: "1".to_owned()
            }
        );
    }

    #[test]
    fn assigning_to_a_constant_is_illegal() {
        let mut stack = GrammarStack::with_predefined();

        let err = statement_error(&mut stack, "set true to 2");

        assert_eq!(
            err.kind,
            ErrorKind::IllegalAssignable {
                expression: "true".to_owned()
            }
        );
    }

    #[test]
    fn one_word_difference_selects_without_ambiguity() {
        let mut stack = GrammarStack::with_predefined();
        stack.push(
            GrammarScope::new()
                .with(
                    GrammarSymbol::from_pattern(
                        SymbolClass::SENTENCE,
                        SymbolTarget::Custom,
                        "say <argument> loudly <argument>",
                    )
                    .unwrap(),
                )
                .with(
                    GrammarSymbol::from_pattern(
                        SymbolClass::SENTENCE,
                        SymbolTarget::Custom,
                        "say <argument> quietly <argument>",
                    )
                    .unwrap(),
                ),
        );

        assert_eq!(
            statement_log(&mut stack, "say a loudly b"),
            "[say <argument> loudly <argument>]($(a), $(b))"
        );
        assert_eq!(
            statement_log(&mut stack, "say a quietly b"),
            "[say <argument> quietly <argument>]($(a), $(b))"
        );

        let err = statement_error(&mut stack, "say a loudly b quietly c");
        assert_eq!(err.position, Position::new(1, 1));
        assert_eq!(
            err.kind,
            ErrorKind::Ambiguous {
                alternatives: vec![
                    "[say <argument> loudly <argument>]($(a), $(b quietly c))".to_owned(),
                    "[say <argument> quietly <argument>]($(a loudly b), $(c))".to_owned(),
                ]
            }
        );
    }

    #[test]
    fn rejected_statements_declare_nothing() {
        let mut stack = GrammarStack::with_predefined();
        stack.push(GrammarScope::new());

        statement_error(&mut stack, "set y to 1 +");

        assert_eq!(stack.lookup("n(y)"), None);
    }

    #[test]
    fn unknown_statement_reports_the_first_word() {
        let mut stack = GrammarStack::with_predefined();

        let err = statement_error(&mut stack, "frobnicate 1");

        assert_eq!(err.position, Position::new(1, 1));
        assert!(matches!(err.kind, ErrorKind::NoViableSymbol { .. }));
    }

    #[test]
    fn block_arguments_live_in_the_block_scope() {
        let mut stack = GrammarStack::with_predefined();
        stack.push(GrammarScope::new().with(
            GrammarSymbol::from_pattern(
                SymbolClass::BLOCK,
                SymbolTarget::Custom,
                "repeat with <argument> from <expression> to <expression>",
            )
            .unwrap(),
        ));

        let header_tokens = tokens("repeat with i from 1 to 10");
        let header = parse_statement(&mut stack, &header_tokens).unwrap();
        assert_eq!(
            header.to_log(&stack),
            "[repeat with <argument> from <expression> to <expression>]($(i), 1, 10)"
        );
        assert_eq!(stack.lookup("n(i)"), None);

        stack.push_block(&header);

        assert!(stack.lookup("n(i)").is_some());
        assert_eq!(
            statement_log(&mut stack, "set total to i * 2"),
            "[set <assignable> to <expression>]($(total), (i * 2))"
        );
        assert_eq!(
            statement_log(&mut stack, "set i to i + 1"),
            "[set <assignable> to <expression>](i, (i + 1))"
        );

        stack.pop();

        assert_eq!(stack.lookup("n(i)"), None);
        assert_eq!(stack.lookup("n(total)"), None);
    }

    #[test]
    fn block_guard_pops_on_drop() {
        let mut stack = GrammarStack::with_predefined();
        let depth = stack.depth();

        let header_tokens = tokens("select 1");
        let header = parse_statement(&mut stack, &header_tokens).unwrap();
        assert_eq!(header.to_log(&stack), "[select <expression>](1)");

        {
            let mut body = stack.block(&header);
            assert_eq!(body.depth(), depth + 1);

            let case_tokens = tokens("case 1");
            let case = parse_statement(&mut body, &case_tokens).unwrap();
            assert_eq!(case.to_log(&body), "[case <expression>](1)");
        }

        assert_eq!(stack.depth(), depth);
    }
}
