//! Pass 7: compare-branch fusion.
//!
//! `EqualImmediate`/`GreaterThanImmediate`/`LessThanOrEqual` feeding a
//! `JumpConditional` that is their only reader collapse into the
//! matching fused branch instruction, dropping the intermediate
//! boolean register entirely.

use crate::ir::{Instruction, Program, Register};
use hashbrown::HashMap;

fn usage_counts(program: &Program) -> HashMap<Register, u32> {
    let mut counts = HashMap::new();
    for block in &program.blocks {
        for instr in &block.instructions {
            for r in instr.sources() {
                *counts.entry(r).or_insert(0) += 1;
            }
        }
    }
    counts
}

pub fn run(mut program: Program) -> Program {
    let counts = usage_counts(&program);
    for block in program.blocks.iter_mut() {
        let mut idx = 0;
        while idx + 1 < block.instructions.len() {
            let fused = fuse_pair(&block.instructions[idx], &block.instructions[idx + 1], &counts);
            if let Some(f) = fused {
                block.instructions[idx] = f;
                block.instructions.remove(idx + 1);
                continue;
            }
            idx += 1;
        }
    }
    program
}

fn fuse_pair(first: &Instruction, second: &Instruction, counts: &HashMap<Register, u32>) -> Option<Instruction> {
    let Instruction::JumpConditional { cond, if_true, if_false } = *second else {
        return None;
    };
    let dst = first.destination()?;
    if dst != cond || counts.get(&dst).copied().unwrap_or(0) != 1 {
        return None;
    }
    match *first {
        Instruction::EqualImmediate { src, imm, .. } => {
            Some(Instruction::JumpEqualImmediate { src, imm, if_true, if_false })
        }
        Instruction::GreaterThanImmediate { src, imm, .. } => {
            Some(Instruction::JumpGreaterThanImmediate { src, imm, if_true, if_false })
        }
        Instruction::LessThanOrEqual { lhs, rhs, .. } => {
            Some(Instruction::JumpLessThanOrEqual { lhs, rhs, if_true, if_false })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn fused(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn fuses_less_than_or_equal_into_conditional_jump() {
        let program = fused("let n = 3; if (n <= 5) { return 1; } else { return 0; }");
        let has_fused =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::JumpLessThanOrEqual { .. }));
        assert!(has_fused);
    }

    #[test]
    fn does_not_fuse_when_condition_register_is_reused() {
        let program = fused("let n = 3; let c = n <= 5; if (c) { return c; } else { return 0; }");
        let has_fused =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::JumpLessThanOrEqual { .. }));
        assert!(!has_fused);
    }
}
