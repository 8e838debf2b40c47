//! The two interpretation backends: a register-machine bytecode
//! interpreter (`bytecode`) and a tree-walking reference oracle (`tree`),
//! sharing the same heap model for arrays, structs, and pointer targets.

mod heap;

pub mod bytecode;
pub mod tree;

#[cfg(test)]
mod cross_check {
    use seen_ir::{generate, optimize};
    use seen_parser::parse_program;

    fn both_backends_agree(src: &str) {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

        let tree_result = crate::tree::interpret(&parsed.program).expect("tree interpretation should succeed");

        let ir = optimize(generate(&parsed.program));
        let bytecode_result = crate::bytecode::interpret(&ir).expect("bytecode interpretation should succeed");

        assert_eq!(tree_result, bytecode_result, "ast and bytecode interpreters disagree for: {src}");
    }

    #[test]
    fn backends_agree_on_while_loop_sum() {
        both_backends_agree("let sum = 0; let i = 0; while (i < 10) { sum = sum + i; i = i + 1; } return sum;");
    }

    #[test]
    fn backends_agree_on_fibonacci() {
        both_backends_agree(
            "fn fib(n) { if (n < 2) { return n; } else { return fib(n - 1) + fib(n - 2); } } return fib(10);",
        );
    }

    #[test]
    fn backends_agree_on_tail_recursive_accumulator() {
        both_backends_agree(
            "fn sum_down(n, acc) { if (n < 1) { return acc; } else { return sum_down(n - 1, acc + n); } } return sum_down(10000, 0);",
        );
    }

    #[test]
    fn backends_agree_on_pointer_write_through() {
        both_backends_agree("let x = 1; let p = &x; x = 2; return *p;");
    }

    #[test]
    fn backends_agree_on_struct_literal_access() {
        both_backends_agree("let point = struct { x: 40, y: 2 }; return point.x + point.y;");
    }

    #[test]
    fn backends_agree_on_forward_function_reference() {
        both_backends_agree("fn main_entry() { return helper(20, 22); } fn helper(a, b) { return a + b; } return main_entry();");
    }

    #[test]
    fn backends_agree_on_nested_block_shadowing() {
        both_backends_agree("let x = 1; if (1) { let x = 2; } return x;");
    }

    #[test]
    fn backends_agree_when_program_ends_in_a_bare_expression() {
        both_backends_agree("let point = struct { x: 40, y: 2 }; point.x + point.y;");
    }

    proptest::proptest! {
        #[test]
        fn backends_agree_on_arbitrary_straight_line_arithmetic(
            literals in proptest::collection::vec(0u64..1000, 2..6),
            op_choices in proptest::collection::vec(
                proptest::prelude::prop_oneof![
                    proptest::prelude::Just("+"),
                    proptest::prelude::Just("-"),
                    proptest::prelude::Just("*"),
                    proptest::prelude::Just("<"),
                    proptest::prelude::Just(">"),
                    proptest::prelude::Just("=="),
                    proptest::prelude::Just("!="),
                    proptest::prelude::Just("<="),
                    proptest::prelude::Just(">="),
                ],
                5,
            ),
        ) {
            let mut src = String::new();
            for (i, lit) in literals.iter().enumerate() {
                src += &format!("let x{i} = {lit}; ");
            }
            let mut expr = "x0".to_string();
            for i in 1..literals.len() {
                let op = &op_choices[(i - 1) % op_choices.len()];
                expr = format!("({expr} {op} x{i})");
            }
            src += &format!("return {expr};");

            let tokens = seen_lexer::lex(&src, 0).tokens;
            let parsed = parse_program(tokens);
            proptest::prop_assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

            let tree_result = crate::tree::interpret(&parsed.program).expect("tree interpretation should succeed");
            let ir = optimize(generate(&parsed.program));
            let bytecode_result = crate::bytecode::interpret(&ir).expect("bytecode interpretation should succeed");

            proptest::prop_assert_eq!(tree_result, bytecode_result);
        }
    }
}
