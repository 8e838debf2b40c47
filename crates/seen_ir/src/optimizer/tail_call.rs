//! Pass 5: tail-call optimization.
//!
//! Within a single block, a `Call dst,target,args,params` immediately
//! followed by `Return dst` (reading exactly that call's own result, and
//! nothing else in between) is a tail call: the caller's frame has no
//! remaining work once the callee returns, so the two instructions
//! collapse into one `TailCall`. The interpreter reuses the current
//! frame for a `TailCall` rather than pushing a new one, which is what
//! keeps deep tail recursion from overflowing the frame stack.

use crate::ir::{Instruction, Program};

pub fn run(mut program: Program) -> Program {
    for block in program.blocks.iter_mut() {
        let mut idx = 0;
        while idx + 1 < block.instructions.len() {
            let is_tail_pair = matches!(
                (&block.instructions[idx], &block.instructions[idx + 1]),
                (Instruction::Call { dst: call_dst, .. }, Instruction::Return { src })
                    if call_dst == src
            );
            if is_tail_pair {
                if let Instruction::Call { target, args, params, .. } = block.instructions[idx].clone() {
                    block.instructions[idx] = Instruction::TailCall { target, args, params };
                    block.instructions.remove(idx + 1);
                    continue;
                }
            }
            idx += 1;
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::ir::Instruction;
    use seen_parser::parse_program;

    fn tco(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn converts_call_then_return_into_tail_call() {
        let program = tco(
            "fn down(n) { if (n <= 0) { return 0; } else { return down(n - 1); } } return down(5);",
        );
        let has_tail_call =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::TailCall { .. }));
        assert!(has_tail_call);
    }

    #[test]
    fn does_not_convert_when_result_is_used_after_the_call() {
        let program = tco("fn inc(n) { return n + 1; } return inc(1) + 1;");
        let tail_calls = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| matches!(i, Instruction::TailCall { .. }))
            .count();
        assert_eq!(tail_calls, 0);
    }
}
