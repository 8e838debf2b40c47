//! Pass 6: control-flow graph cleanup.
//!
//! Three sweeps, in order:
//! 1. Trim anything after a block's first terminator — earlier passes can
//!    leave unreachable tail instructions behind a folded `Jump`.
//! 2. Resolve trampoline chains: a block containing nothing but an
//!    unconditional `Jump` is skipped over by rewriting every other
//!    block's targets to point past it, with a visited-set to stop at a
//!    cycle instead of looping forever.
//! 3. Drop every block unreachable from block 0, then renumber the
//!    survivors densely and rewrite every remaining target.

use crate::ir::{Label, Program};
use crate::optimizer::cfg::reachable_from_entry;
use hashbrown::HashMap;

pub fn run(mut program: Program) -> Program {
    trim_post_terminator(&mut program);
    collapse_trampolines(&mut program);
    prune_and_renumber(&mut program);
    program
}

fn trim_post_terminator(program: &mut Program) {
    for block in program.blocks.iter_mut() {
        if let Some(pos) = block.instructions.iter().position(|i| i.is_terminator()) {
            block.instructions.truncate(pos + 1);
        }
    }
}

fn trampoline_target(program: &Program, label: Label) -> Option<Label> {
    let block = &program.blocks[label];
    if block.instructions.len() == 1 {
        if let crate::ir::Instruction::Jump { target } = block.instructions[0] {
            return Some(target);
        }
    }
    None
}

fn resolve_trampoline(program: &Program, mut label: Label) -> Label {
    let mut visited = hashbrown::HashSet::new();
    while visited.insert(label) {
        match trampoline_target(program, label) {
            Some(next) if next != label => label = next,
            _ => break,
        }
    }
    label
}

fn collapse_trampolines(program: &mut Program) {
    let resolved: Vec<Label> = (0..program.blocks.len()).map(|l| resolve_trampoline(program, l)).collect();
    for block in program.blocks.iter_mut() {
        if let Some(term) = block.instructions.last_mut() {
            term.map_targets(|t| resolved[t]);
        }
    }
}

fn prune_and_renumber(program: &mut Program) {
    let reachable = reachable_from_entry(program);
    let mut remap: HashMap<Label, Label> = HashMap::new();
    let mut kept = Vec::new();
    for (label, block) in program.blocks.drain(..).enumerate() {
        if reachable[label] {
            remap.insert(label, kept.len());
            kept.push(block);
        }
    }
    for block in kept.iter_mut() {
        if let Some(term) = block.instructions.last_mut() {
            term.map_targets(|t| *remap.get(&t).expect("cleanup: target of a live block must survive pruning"));
        }
    }
    program.blocks = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn cleaned(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn labels_are_dense_and_every_target_in_range() {
        let program = cleaned("let i = 0; while (i < 10) { i = i + 1; } return i;");
        let n = program.blocks.len();
        for block in &program.blocks {
            if let Some(term) = block.terminator() {
                for t in term.targets() {
                    assert!(t < n);
                }
            }
        }
    }

    #[test]
    fn unreachable_block_is_removed() {
        let program = cleaned("return 1;");
        for block in &program.blocks {
            assert!(block.ends_in_terminator());
        }
    }

    #[test]
    fn is_idempotent() {
        let once = cleaned("let i = 0; while (i < 3) { i = i + 1; } return i;");
        let twice = run(once.clone());
        assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));
    }

    proptest::proptest! {
        #[test]
        fn is_idempotent_and_dense_for_an_arbitrary_loop_bound(bound in 1u64..20) {
            let src = format!("let i = 0; while (i < {bound}) {{ i = i + 1; }} return i;");
            let once = cleaned(&src);
            let twice = run(once.clone());
            proptest::prop_assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));

            let n = once.blocks.len();
            for block in &once.blocks {
                proptest::prop_assert!(block.ends_in_terminator());
                if let Some(term) = block.terminator() {
                    for t in term.targets() {
                        proptest::prop_assert!(t < n);
                    }
                }
            }
        }
    }
}
