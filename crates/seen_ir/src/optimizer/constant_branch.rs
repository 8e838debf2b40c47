//! Pass 8: constant-condition simplification.
//!
//! A second, purely local sweep for `JumpConditional`s whose condition
//! became a known constant only after earlier passes ran (compare
//! fusion and tail-call conversion can expose new ones that the global
//! copy-propagation pass, which already ran, no longer gets a chance to
//! see). Tracks constants per block the same way aggregate folding does.

use crate::ir::{Instruction, Program, Register, Value};
use hashbrown::HashMap;

pub fn run(mut program: Program) -> Program {
    for block in program.blocks.iter_mut() {
        let mut constants: HashMap<Register, Value> = HashMap::new();
        for instr in block.instructions.iter_mut() {
            if let Instruction::JumpConditional { cond, if_true, if_false } = *instr {
                if let Some(&v) = constants.get(&cond) {
                    *instr = Instruction::Jump { target: if v != 0 { if_true } else { if_false } };
                    continue;
                }
            }
            match instr {
                Instruction::Load { dst, imm } => {
                    constants.insert(*dst, *imm);
                }
                Instruction::Move { dst, src } => match constants.get(src).copied() {
                    Some(v) => {
                        constants.insert(*dst, v);
                    }
                    None => {
                        constants.remove(dst);
                    }
                },
                _ => {
                    if let Some(dst) = instr.destination() {
                        constants.remove(&dst);
                    }
                }
            }
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn simplified(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn replaces_constant_condition_with_unconditional_jump() {
        let program = simplified("let flag = 1; if (flag) { return 1; } else { return 0; }");
        let has_conditional =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::JumpConditional { .. }));
        assert!(!has_conditional);
    }

    #[test]
    fn leaves_non_constant_condition_alone() {
        let program = simplified("fn f(n) { if (n) { return 1; } else { return 0; } } return f(2);");
        let has_conditional =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::JumpConditional { .. }));
        assert!(has_conditional);
    }
}
