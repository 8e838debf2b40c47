//! Pass 10: register compaction.
//!
//! Earlier passes leave gaps in the register numbering (dead producers
//! removed, trampolines collapsed). This collects every register
//! referenced anywhere — as a destination or as a source — sorts it,
//! and renumbers the set densely from zero, rewriting every operand.
//! A program with no gaps maps to itself, so this is idempotent.

use crate::ir::{Program, Register};
use hashbrown::HashMap;
use std::collections::BTreeSet;

pub fn run(mut program: Program) -> Program {
    let mut used: BTreeSet<Register> = BTreeSet::new();
    for block in &program.blocks {
        for instr in &block.instructions {
            used.extend(instr.sources());
            if let Some(d) = instr.destination() {
                used.insert(d);
            }
        }
    }

    let remap: HashMap<Register, Register> = used.into_iter().enumerate().map(|(i, r)| (r, i as Register)).collect();

    for block in program.blocks.iter_mut() {
        for instr in block.instructions.iter_mut() {
            instr.map_sources(|r| *remap.get(&r).unwrap_or(&r));
            if let Some(d) = instr.destination() {
                instr.set_destination(*remap.get(&d).unwrap_or(&d));
            }
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::optimizer::dce;
    use seen_parser::parse_program;

    fn compacted(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(dce::run(generate(&parsed.program)))
    }

    fn max_register(program: &Program) -> Option<Register> {
        program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .flat_map(|i| {
                let mut rs = i.sources();
                rs.extend(i.destination());
                rs
            })
            .max()
    }

    #[test]
    fn registers_are_dense_after_compaction() {
        let program = compacted("let a = 1; let b = 2; let c = 3; return a + c;");
        let used: BTreeSet<Register> = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .flat_map(|i| {
                let mut rs = i.sources();
                rs.extend(i.destination());
                rs
            })
            .collect();
        let count = used.len() as u32;
        if let Some(max) = max_register(&program) {
            assert_eq!(max + 1, count);
        }
    }

    #[test]
    fn is_idempotent() {
        let once = compacted("let a = 1; let b = 2; return a + b;");
        let twice = run(once.clone());
        assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));
    }

    proptest::proptest! {
        #[test]
        fn is_idempotent_and_dense_for_an_arbitrary_number_of_bindings(
            literals in proptest::collection::vec(0u64..1000, 1..10),
        ) {
            let mut src = String::new();
            for (i, lit) in literals.iter().enumerate() {
                src += &format!("let x{i} = {lit}; ");
            }
            let sum = (0..literals.len()).map(|i| format!("x{i}")).collect::<Vec<_>>().join(" + ");
            src += &format!("return {sum};");

            let once = compacted(&src);
            let twice = run(once.clone());
            proptest::prop_assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));

            let used: BTreeSet<Register> = once
                .blocks
                .iter()
                .flat_map(|b| &b.instructions)
                .flat_map(|i| {
                    let mut rs = i.sources();
                    rs.extend(i.destination());
                    rs
                })
                .collect();
            if let Some(max) = max_register(&once) {
                proptest::prop_assert_eq!(max + 1, used.len() as u32);
            }
        }
    }
}
