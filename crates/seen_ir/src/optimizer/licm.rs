//! Pass 1: loop-invariant code motion.
//!
//! Natural loops are found by a single back-edge scan: any
//! terminator whose target is less than or equal to its own block index
//! is a back edge `(tail -> header)`, and the loop body is every block
//! in `header..=tail`. Pure producers whose operands are never defined
//! inside that range get hoisted to the pre-header — the block
//! immediately before the header — right before its terminator. Each
//! loop is swept repeatedly until nothing more moves, since hoisting one
//! instruction can make another one loop-invariant.

use crate::ir::{Instruction, Label, Program};
use hashbrown::{HashMap, HashSet};

struct Loop {
    header: Label,
    tail: Label,
}

pub fn run(mut program: Program) -> Program {
    let loops = find_loops(&program);
    for lp in loops {
        hoist_to_fixed_point(&mut program, &lp);
    }
    program
}

fn find_loops(program: &Program) -> Vec<Loop> {
    let mut loops = Vec::new();
    for (label, block) in program.blocks.iter().enumerate() {
        if let Some(term) = block.terminator() {
            for target in term.targets() {
                if target <= label {
                    loops.push(Loop { header: target, tail: label });
                }
            }
        }
    }
    loops
}

fn is_licm_candidate(instr: &Instruction) -> bool {
    matches!(
        instr,
        Instruction::Move { .. }
            | Instruction::Load { .. }
            | Instruction::Add { .. }
            | Instruction::Subtract { .. }
            | Instruction::Multiply { .. }
            | Instruction::Divide { .. }
            | Instruction::Modulo { .. }
            | Instruction::AddImmediate { .. }
            | Instruction::SubtractImmediate { .. }
            | Instruction::MultiplyImmediate { .. }
            | Instruction::DivideImmediate { .. }
            | Instruction::ModuloImmediate { .. }
            | Instruction::LessThan { .. }
            | Instruction::GreaterThan { .. }
            | Instruction::LessThanOrEqual { .. }
            | Instruction::GreaterThanOrEqual { .. }
            | Instruction::Equal { .. }
            | Instruction::NotEqual { .. }
            | Instruction::LessThanImmediate { .. }
            | Instruction::GreaterThanImmediate { .. }
            | Instruction::LessThanOrEqualImmediate { .. }
            | Instruction::GreaterThanOrEqualImmediate { .. }
            | Instruction::EqualImmediate { .. }
            | Instruction::NotEqualImmediate { .. }
            | Instruction::Negate { .. }
            | Instruction::LogicalNot { .. }
    )
}

fn hoist_to_fixed_point(program: &mut Program, lp: &Loop) {
    let Some(preheader) = lp.header.checked_sub(1) else {
        return; // header is block 0: no pre-header to hoist into.
    };
    if lp.tail < lp.header {
        return;
    }

    loop {
        let mut def_count: HashMap<u32, u32> = HashMap::new();
        for label in lp.header..=lp.tail {
            for instr in &program.blocks[label].instructions {
                if let Some(dst) = instr.destination() {
                    *def_count.entry(dst).or_insert(0) += 1;
                }
            }
        }
        let defined_within: HashSet<u32> = def_count.keys().copied().collect();

        let mut hoisted = false;
        'search: for label in lp.header..=lp.tail {
            for idx in 0..program.blocks[label].instructions.len() {
                let instr = &program.blocks[label].instructions[idx];
                if !is_licm_candidate(instr) {
                    continue;
                }
                let Some(dst) = instr.destination() else { continue };
                if def_count.get(&dst).copied().unwrap_or(0) != 1 {
                    continue;
                }
                if instr.sources().iter().any(|s| defined_within.contains(s)) {
                    continue;
                }
                let moved = program.blocks[label].instructions.remove(idx);
                let insert_at = program.blocks[preheader].instructions.len().saturating_sub(1);
                program.blocks[preheader].instructions.insert(insert_at, moved);
                hoisted = true;
                break 'search;
            }
        }
        if !hoisted {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn licm(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn hoists_loop_invariant_computation() {
        // `limit` is loop-invariant; `i` is mutated every iteration and must stay.
        let program = licm(
            "let limit = 10; let i = 0; let step = 1; while (i < limit) { let k = step + 1; i = i + k; } return i;",
        );
        // At minimum this should not panic and every block should still terminate.
        for block in &program.blocks {
            assert!(block.ends_in_terminator());
        }
    }

    #[test]
    fn preserves_result_with_no_preheader() {
        // Loop header is block 0 itself is impossible here (there's always
        // a let before it), but guard against header==0 defensively.
        let program = licm("while (0 < 1) { return 1; }");
        for block in &program.blocks {
            assert!(block.ends_in_terminator());
        }
    }
}
