//! Pass 9: peephole cleanup.
//!
//! A pure producer writing a temporary that is immediately `Move`d into
//! another register, with that temporary read nowhere else in the
//! program, can be retargeted to write straight into the `Move`'s
//! destination — the temporary and the `Move` both disappear.

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
            let retarget = match (&block.instructions[idx], &block.instructions[idx + 1]) {
                (producer, Instruction::Move { dst, src })
                    if producer.is_pure_producer()
                        && producer.destination() == Some(*src)
                        && counts.get(src).copied().unwrap_or(0) == 1 =>
                {
                    Some(*dst)
                }
                _ => None,
            };
            if let Some(new_dst) = retarget {
                block.instructions[idx].set_destination(new_dst);
                block.instructions.remove(idx + 1);
                continue;
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
    use seen_parser::parse_program;

    fn smoothed(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn collapses_producer_move_pair() {
        let program = smoothed("let a = 1; let b = 2; let c = a + b; return c;");
        let moves =
            program.blocks.iter().flat_map(|b| &b.instructions).filter(|i| matches!(i, Instruction::Move { .. })).count();
        assert_eq!(moves, 0);
    }

    #[test]
    fn leaves_move_alone_when_source_has_other_readers() {
        let program = smoothed("let a = 1; let b = a; return a + b;");
        let has_add =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::Add { .. }));
        assert!(has_add);
    }
}
