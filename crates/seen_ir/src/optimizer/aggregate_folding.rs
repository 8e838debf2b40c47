//! Pass 3: aggregate literal folding.
//!
//! Purely local to each block: a running map of "registers known to
//! currently hold a constant", seeded by `Load` and carried through
//! `Move`. When every element/field register feeding an `ArrayCreate`
//! or `StructCreate` is known constant, the instruction becomes its
//! `*LiteralCreate` counterpart; an `ArrayLoad` with a known-constant
//! index becomes `ArrayLoadImmediate`.

use crate::ir::{Instruction, Program, Register, Value};
use hashbrown::HashMap;

pub fn run(mut program: Program) -> Program {
    for block in program.blocks.iter_mut() {
        let mut constants: HashMap<Register, Value> = HashMap::new();
        for instr in block.instructions.iter_mut() {
            try_fold(instr, &constants);
            update_constants(instr, &mut constants);
        }
    }
    program
}

fn try_fold(instr: &mut Instruction, constants: &HashMap<Register, Value>) {
    match instr {
        Instruction::ArrayCreate { dst, elements } => {
            if let Some(values) = elements.iter().map(|e| constants.get(e).copied()).collect::<Option<Vec<_>>>() {
                *instr = Instruction::ArrayLiteralCreate { dst: *dst, elements: values };
            }
        }
        Instruction::StructCreate { dst, fields } => {
            if let Some(values) = fields
                .iter()
                .map(|(name, r)| constants.get(r).copied().map(|v| (name.clone(), v)))
                .collect::<Option<Vec<_>>>()
            {
                *instr = Instruction::StructLiteralCreate { dst: *dst, fields: values };
            }
        }
        Instruction::ArrayLoad { dst, array, index } => {
            if let Some(&k) = constants.get(index) {
                *instr = Instruction::ArrayLoadImmediate { dst: *dst, array: *array, index: k };
            }
        }
        _ => {}
    }
}

fn update_constants(instr: &Instruction, constants: &mut HashMap<Register, Value>) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::optimizer::copy_propagation;
    use seen_parser::parse_program;

    fn folded(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        let ir = copy_propagation::run(generate(&parsed.program));
        run(ir)
    }

    #[test]
    fn struct_literal_with_constant_fields_folds() {
        let program = folded("let point = struct { x: 40, y: 2 }; return point.x + point.y;");
        let has_literal =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::StructLiteralCreate { .. }));
        assert!(has_literal);
    }

    #[test]
    fn array_literal_with_constant_elements_folds() {
        let program = folded("let a = [1, 2, 3]; return a[0];");
        let has_literal =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::ArrayLiteralCreate { .. }));
        assert!(has_literal);
    }

    #[test]
    fn array_with_non_constant_element_does_not_fold() {
        let program = folded("let x = side(); let a = [x, 2]; return a[0]; fn side() { return 7; }");
        let has_literal =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::ArrayLiteralCreate { .. }));
        assert!(!has_literal);
    }
}
