//! Pass 2: global forward copy/constant propagation.
//!
//! A forward dataflow over each register: either it is known to alias
//! another register, or it is known to hold a constant. The meet of two
//! predecessors keeps only facts that are identical on both paths — a
//! standard "must" dataflow analysis. Once the
//! per-block `IN` facts reach a fixed point, a second sweep actually
//! rewrites operands (following alias chains to their root), folds
//! `JumpConditional`s whose condition resolved to a constant into a
//! plain `Jump`, and drops trivial `Move dst,dst`.
//!
//! `AddressOf.src` is never substituted — the optimizer must preserve
//! pointee identity, not whatever register currently happens to alias it.

use crate::ir::{Instruction, Label, Program, Register, Value};
use crate::optimizer::cfg::predecessors;
use hashbrown::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fact {
    Alias(Register),
    Constant(Value),
}

type Facts = HashMap<Register, Fact>;

pub fn run(mut program: Program) -> Program {
    let preds = predecessors(&program);
    let n = program.blocks.len();
    let mut out: Vec<Facts> = vec![Facts::new(); n];
    let mut visited = vec![false; n];

    let mut changed = true;
    while changed {
        changed = false;
        for label in 0..n {
            let mut facts = meet_predecessors(&preds[label], &out, &visited);
            for instr in &program.blocks[label].instructions {
                transfer(&mut facts, instr);
            }
            if !visited[label] || facts != out[label] {
                out[label] = facts;
                visited[label] = true;
                changed = true;
            }
        }
    }

    for label in 0..n {
        let mut facts = meet_predecessors(&preds[label], &out, &visited);
        let mut idx = 0;
        while idx < program.blocks[label].instructions.len() {
            let instr = program.blocks[label].instructions[idx].clone();

            if let Instruction::JumpConditional { cond, if_true, if_false } = instr {
                if let Some(v) = constant_value(&facts, cond) {
                    let folded = Instruction::Jump { target: if v != 0 { if_true } else { if_false } };
                    transfer(&mut facts, &folded);
                    program.blocks[label].instructions[idx] = folded;
                    idx += 1;
                    continue;
                }
            }

            let mut rewritten = instr;
            rewritten.map_sources(|r| resolve(&facts, r));

            if let Instruction::Move { dst, src } = rewritten {
                if dst == src {
                    program.blocks[label].instructions.remove(idx);
                    continue;
                }
            }

            transfer(&mut facts, &rewritten);
            program.blocks[label].instructions[idx] = rewritten;
            idx += 1;
        }
    }

    program
}

fn meet_predecessors(preds: &[Label], out: &[Facts], visited: &[bool]) -> Facts {
    let mut candidates = preds.iter().copied().filter(|&p| visited[p]);
    let Some(first) = candidates.next() else { return Facts::new() };
    let mut result = out[first].clone();
    for p in candidates {
        result = meet(&result, &out[p]);
    }
    result
}

fn meet(a: &Facts, b: &Facts) -> Facts {
    let mut result = Facts::new();
    for (k, v) in a {
        if b.get(k) == Some(v) {
            result.insert(*k, v.clone());
        }
    }
    result
}

/// Remove `reg`'s own fact and, transitively, every other register whose
/// recorded fact was "aliases `reg`" — their claim is now stale.
fn invalidate(facts: &mut Facts, reg: Register) {
    facts.remove(&reg);
    let dependents: Vec<Register> =
        facts.iter().filter(|(_, f)| matches!(f, Fact::Alias(a) if *a == reg)).map(|(k, _)| *k).collect();
    for d in dependents {
        invalidate(facts, d);
    }
}

fn transfer(facts: &mut Facts, instr: &Instruction) {
    match instr {
        Instruction::Move { dst, src } => {
            let fact = Fact::Alias(*src);
            invalidate(facts, *dst);
            facts.insert(*dst, fact);
        }
        Instruction::Load { dst, imm } => {
            invalidate(facts, *dst);
            facts.insert(*dst, Fact::Constant(*imm));
        }
        _ => {
            if let Some(dst) = instr.destination() {
                invalidate(facts, dst);
            }
        }
    }
}

fn resolve(facts: &Facts, mut r: Register) -> Register {
    let mut steps = 0;
    while let Some(Fact::Alias(a)) = facts.get(&r) {
        r = *a;
        steps += 1;
        if steps > facts.len() + 1 {
            break; // defensive cycle guard; should be unreachable
        }
    }
    r
}

fn constant_value(facts: &Facts, r: Register) -> Option<Value> {
    let root = resolve(facts, r);
    match facts.get(&root) {
        Some(Fact::Constant(v)) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use seen_parser::parse_program;

    fn propagate(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        run(generate(&parsed.program))
    }

    #[test]
    fn removes_trivial_self_move_chain() {
        let program = propagate("let x = 1; let y = x; return y;");
        let moves: Vec<_> = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| matches!(i, Instruction::Move { dst, src } if dst == src))
            .collect();
        assert!(moves.is_empty());
    }

    #[test]
    fn folds_constant_branch_condition() {
        let program = propagate("let x = 1; if (x) { return 1; } else { return 2; }");
        let has_conditional =
            program.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::JumpConditional { .. }));
        assert!(!has_conditional);
    }

    #[test]
    fn is_idempotent() {
        let once = propagate("let x = 1; let y = x; let z = y + 1; return z;");
        let twice = run(once.clone());
        assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));
    }

    proptest::proptest! {
        #[test]
        fn is_idempotent_on_arbitrary_length_alias_chains(chain_len in 2usize..10, literal in 0u64..1000) {
            let mut src = format!("let x0 = {literal}; ");
            for i in 1..chain_len {
                src += &format!("let x{i} = x{}; ", i - 1);
            }
            src += &format!("return x{};", chain_len - 1);

            let once = propagate(&src);
            let twice = run(once.clone());
            proptest::prop_assert_eq!(format!("{:?}", once.blocks), format!("{:?}", twice.blocks));
        }
    }

    #[test]
    fn does_not_substitute_through_address_of() {
        let program = propagate("let x = 1; let p = &x; x = 2; return *p;");
        let address_of_sources: Vec<_> = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| match i {
                Instruction::AddressOf { src, .. } => Some(*src),
                _ => None,
            })
            .collect();
        assert_eq!(address_of_sources.len(), 1);
    }
}
