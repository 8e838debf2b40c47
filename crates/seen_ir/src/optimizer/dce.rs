//! Pass 4: global dead-code elimination.
//!
//! A register is live if it is read anywhere in the program, its address
//! is ever taken (a pointer may observe it even with no direct reader),
//! or it is itself the destination of an `AddressOf`/`LoadIndirect` —
//! those two are kept regardless of whether their own result is read,
//! since a pointer handle can be compared for identity with no further
//! use of the register holding it, and a `LoadIndirect` can trap on a
//! dangling handle; either effect would silently disappear if the
//! instruction were pruned for having an "unused" destination. Anything
//! else's definition is dead, unless the instruction is a terminator or
//! otherwise side-effecting — `Instruction::has_side_effect` already
//! covers every terminator plus `ArrayStore`/`Call`/`TailCall`. Iterated
//! to a fixed point: removing one dead producer can make one of its own
//! operands dead in turn, and the idempotence law in the test plan
//! requires a single `run` to reach that fixed point on its own.

use crate::ir::Program;
use crate::optimizer::cfg::{address_taken_registers, all_used_registers, pointer_producer_destinations};

pub fn run(mut program: Program) -> Program {
    loop {
        let mut live = all_used_registers(&program);
        live.extend(address_taken_registers(&program));
        live.extend(pointer_producer_destinations(&program));

        let mut changed = false;
        for block in program.blocks.iter_mut() {
            let before = block.instructions.len();
            block.instructions.retain(|instr| {
                if instr.has_side_effect() {
                    return true;
                }
                match instr.destination() {
                    Some(d) => live.contains(&d),
                    None => true,
                }
            });
            if block.instructions.len() != before {
                changed = true;
            }
        }
        if !changed {
            break;
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

    fn eliminated(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn removes_unused_computation() {
        let program = eliminated("let x = 1 + 2; return 0;");
        let has_add =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::AddImmediate { .. } | Instruction::Add { .. }));
        assert!(!has_add);
    }

    #[test]
    fn keeps_instructions_whose_address_is_taken() {
        let program = eliminated("let x = 1; let p = &x; return 0;");
        let has_address_of =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::AddressOf { .. }));
        assert!(has_address_of);
    }

    #[test]
    fn keeps_address_of_even_when_its_own_pointer_is_never_read() {
        // `&x` here is a bare expression statement: its result register is
        // never moved anywhere or read by anything. A liveness pass that
        // only protects `AddressOf.src` (so `x` stays live) but not the
        // `AddressOf`'s own destination would prune the instruction itself.
        let program = eliminated("let x = 1; &x; return 0;");
        let has_address_of =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::AddressOf { .. }));
        assert!(has_address_of, "AddressOf must survive even with an unread destination");
    }

    #[test]
    fn is_idempotent() {
        let once = eliminated("let x = 1; let y = 2; return 0;");
        let twice = run(once.clone());
        assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));
    }

    proptest::proptest! {
        #[test]
        fn is_idempotent_on_an_arbitrary_number_of_unused_bindings(
            literals in proptest::collection::vec(0u64..1000, 0..10),
        ) {
            let mut src = String::new();
            for (i, lit) in literals.iter().enumerate() {
                src += &format!("let x{i} = {lit} + {lit}; ");
            }
            src += "return 0;";

            let once = eliminated(&src);
            let twice = run(once.clone());
            proptest::prop_assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));

            let has_add = once
                .blocks
                .iter()
                .flat_map(|b| &b.instructions)
                .any(|i| matches!(i, Instruction::AddImmediate { .. } | Instruction::Add { .. }));
            proptest::prop_assert!(!has_add, "every unused binding's arithmetic should be pruned");
        }
    }
}
