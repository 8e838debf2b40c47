//! Small shared control-flow helpers used by several passes.

use crate::ir::{Label, Program};

/// `predecessors[l]` lists every block with an edge into `l`.
pub(crate) fn predecessors(program: &Program) -> Vec<Vec<Label>> {
    let mut preds = vec![Vec::new(); program.blocks.len()];
    for (label, block) in program.blocks.iter().enumerate() {
        if let Some(term) = block.terminator() {
            for target in term.targets() {
                if target < preds.len() {
                    preds[target].push(label);
                }
            }
        }
    }
    preds
}

/// Blocks reachable from block 0 by following terminator targets.
pub(crate) fn reachable_from_entry(program: &Program) -> Vec<bool> {
    let mut seen = vec![false; program.blocks.len()];
    if program.blocks.is_empty() {
        return seen;
    }
    let mut stack = vec![0usize];
    seen[0] = true;
    while let Some(label) = stack.pop() {
        if let Some(term) = program.blocks[label].terminator() {
            for target in term.targets() {
                if target < seen.len() && !seen[target] {
                    seen[target] = true;
                    stack.push(target);
                }
            }
        }
    }
    seen
}

/// Every register read anywhere in the program (operands of every
/// instruction in every block, including control and store instructions).
pub(crate) fn all_used_registers(program: &Program) -> std::collections::BTreeSet<u32> {
    let mut used = std::collections::BTreeSet::new();
    for block in &program.blocks {
        for instr in &block.instructions {
            used.extend(instr.sources());
        }
    }
    used
}

/// Registers whose address is taken anywhere (`AddressOf.src`) — these
/// must be treated as live even if nothing else reads them, because a
/// pointer may still observe writes to them.
pub(crate) fn address_taken_registers(program: &Program) -> std::collections::BTreeSet<u32> {
    use crate::ir::Instruction;
    let mut taken = std::collections::BTreeSet::new();
    for block in &program.blocks {
        for instr in &block.instructions {
            if let Instruction::AddressOf { src, .. } = instr {
                taken.insert(*src);
            }
        }
    }
    taken
}

/// Destinations of `AddressOf`/`LoadIndirect` instructions — kept live
/// unconditionally even when nothing reads them. A pointer handle may be
/// compared for identity with no other use of its register, and a
/// `LoadIndirect` may trap on a dangling handle; removing either because
/// its result looks unused would change what the program observes.
pub(crate) fn pointer_producer_destinations(program: &Program) -> std::collections::BTreeSet<u32> {
    use crate::ir::Instruction;
    let mut regs = std::collections::BTreeSet::new();
    for block in &program.blocks {
        for instr in &block.instructions {
            match instr {
                Instruction::AddressOf { dst, .. } | Instruction::LoadIndirect { dst, .. } => {
                    regs.insert(*dst);
                }
                _ => {}
            }
        }
    }
    regs
}
