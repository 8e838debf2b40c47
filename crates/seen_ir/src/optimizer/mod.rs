//! The fixed optimizer pipeline.
//!
//! Passes run in a fixed order: LICM first so
//! copy propagation sees hoisted constants, copy propagation before
//! aggregate folding and DCE so they see through aliases, tail-call
//! conversion and CFG cleanup to tighten the graph before the two
//! peephole-shaped passes, register compaction last. Every pass takes
//! and returns a `Program` — none of them assume anything the generator
//! didn't already establish beyond "every block ends in a terminator".

mod aggregate_folding;
mod cfg_cleanup;
mod compare_fusion;
mod constant_branch;
mod copy_propagation;
mod dce;
mod licm;
mod peephole;
mod register_compaction;
mod tail_call;

pub(crate) mod cfg;

use crate::ir::Program;

pub fn optimize(program: Program) -> Program {
    let program = licm::run(program);
    log::trace!("licm done");
    let program = copy_propagation::run(program);
    log::trace!("copy propagation done");
    let program = aggregate_folding::run(program);
    log::trace!("aggregate folding done");
    let program = dce::run(program);
    log::trace!("dead code elimination done");
    let program = tail_call::run(program);
    log::trace!("tail call optimization done");
    let program = cfg_cleanup::run(program);
    log::trace!("cfg cleanup done");
    let program = compare_fusion::run(program);
    log::trace!("compare-branch fusion done");
    let program = constant_branch::run(program);
    log::trace!("constant-condition simplification done");
    let program = peephole::run(program);
    log::trace!("peephole done");
    let program = register_compaction::run(program);
    log::trace!("register compaction done");
    program
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn optimized(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        optimize(generate(&parsed.program))
    }

    #[test]
    fn labels_are_dense_after_optimization() {
        let program = optimized("let i = 0; while (i < 10) { i++; } return i;");
        for block in &program.blocks {
            for instr in &block.instructions {
                for target in instr.targets() {
                    assert!(target < program.blocks.len());
                }
            }
        }
    }

    #[test]
    fn registers_are_dense_after_compaction() {
        let program = optimized("fn fib(n) { if (n < 2) { return n; } else { return fib(n - 1) + fib(n - 2); } } return fib(10);");
        let mut seen = std::collections::BTreeSet::new();
        for block in &program.blocks {
            for instr in &block.instructions {
                if let Some(d) = instr.destination() {
                    seen.insert(d);
                }
                for s in instr.sources() {
                    seen.insert(s);
                }
            }
        }
        if let Some(&max) = seen.iter().max() {
            assert_eq!(seen.len() as u32, max + 1, "register ids must be dense 0..N");
        }
    }

    #[test]
    fn deep_tail_recursion_produces_a_tail_call() {
        let program = optimized(
            "fn sum_down(n, acc) { if (n < 1) { return acc; } else { return sum_down(n - 1, acc + n); } } return sum_down(10000, 0);",
        );
        let has_tail_call =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, crate::ir::Instruction::TailCall { .. }));
        assert!(has_tail_call);
    }

    #[test]
    fn struct_literal_with_all_constant_fields_folds() {
        let program = optimized("let point = struct { x: 40, y: 2 }; return point.x + point.y;");
        let has_struct_literal = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| matches!(i, crate::ir::Instruction::StructLiteralCreate { .. }));
        assert!(has_struct_literal);
    }
}
