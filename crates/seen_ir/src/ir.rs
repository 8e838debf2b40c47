//! Register-machine intermediate representation.
//!
//! A program lowers to a flat vector of [`BasicBlock`]s. Block 0 is the
//! entry. Registers and labels are both plain integers — there is no
//! nominal type layered over them, matching the tagged-variant, no
//! virtual-dispatch style the rest of the toolchain uses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every scalar, boolean (0/1), array/struct/pointer handle is this type.
pub type Value = u64;

/// A storage slot within the current call frame.
pub type Register = u32;

/// An index into the block vector.
pub type Label = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // --- data ---
    Move { dst: Register, src: Register },
    Load { dst: Register, imm: Value },

    // --- arithmetic, register-register ---
    Add { dst: Register, lhs: Register, rhs: Register },
    Subtract { dst: Register, lhs: Register, rhs: Register },
    Multiply { dst: Register, lhs: Register, rhs: Register },
    Divide { dst: Register, lhs: Register, rhs: Register },
    Modulo { dst: Register, lhs: Register, rhs: Register },

    // --- arithmetic, immediate: dst := src op imm ---
    AddImmediate { dst: Register, src: Register, imm: Value },
    SubtractImmediate { dst: Register, src: Register, imm: Value },
    MultiplyImmediate { dst: Register, src: Register, imm: Value },
    DivideImmediate { dst: Register, src: Register, imm: Value },
    ModuloImmediate { dst: Register, src: Register, imm: Value },

    // --- comparison, register-register (result is 0 or 1) ---
    LessThan { dst: Register, lhs: Register, rhs: Register },
    GreaterThan { dst: Register, lhs: Register, rhs: Register },
    LessThanOrEqual { dst: Register, lhs: Register, rhs: Register },
    GreaterThanOrEqual { dst: Register, lhs: Register, rhs: Register },
    Equal { dst: Register, lhs: Register, rhs: Register },
    NotEqual { dst: Register, lhs: Register, rhs: Register },

    // --- comparison, immediate ---
    LessThanImmediate { dst: Register, src: Register, imm: Value },
    GreaterThanImmediate { dst: Register, src: Register, imm: Value },
    LessThanOrEqualImmediate { dst: Register, src: Register, imm: Value },
    GreaterThanOrEqualImmediate { dst: Register, src: Register, imm: Value },
    EqualImmediate { dst: Register, src: Register, imm: Value },
    NotEqualImmediate { dst: Register, src: Register, imm: Value },

    // --- unary ---
    Negate { dst: Register, src: Register },
    LogicalNot { dst: Register, src: Register },

    // --- control ---
    Jump { target: Label },
    JumpConditional { cond: Register, if_true: Label, if_false: Label },

    // fused compare-branches, produced by the peephole/fusion passes
    JumpEqualImmediate { src: Register, imm: Value, if_true: Label, if_false: Label },
    JumpGreaterThanImmediate { src: Register, imm: Value, if_true: Label, if_false: Label },
    JumpLessThanOrEqual { lhs: Register, rhs: Register, if_true: Label, if_false: Label },

    // --- call / return ---
    Call { dst: Register, target: Label, args: Vec<Register>, params: Vec<Register> },
    TailCall { target: Label, args: Vec<Register>, params: Vec<Register> },
    Return { src: Register },

    // --- aggregates ---
    ArrayCreate { dst: Register, elements: Vec<Register> },
    ArrayLiteralCreate { dst: Register, elements: Vec<Value> },
    ArrayLoad { dst: Register, array: Register, index: Register },
    ArrayLoadImmediate { dst: Register, array: Register, index: Value },
    ArrayStore { array: Register, index: Register, value: Register },
    StructCreate { dst: Register, fields: Vec<(String, Register)> },
    StructLiteralCreate { dst: Register, fields: Vec<(String, Value)> },
    StructLoad { dst: Register, object: Register, field: String },

    // --- pointers ---
    AddressOf { dst: Register, src: Register },
    LoadIndirect { dst: Register, ptr: Register },
}

impl Instruction {
    /// True for instructions that transfer control out of their block.
    /// `Call` is deliberately excluded: it returns control to the next
    /// instruction in the same block once the callee returns.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. }
                | Instruction::JumpConditional { .. }
                | Instruction::JumpEqualImmediate { .. }
                | Instruction::JumpGreaterThanImmediate { .. }
                | Instruction::JumpLessThanOrEqual { .. }
                | Instruction::Return { .. }
                | Instruction::TailCall { .. }
        )
    }

    /// True for instructions whose effect is observed through something
    /// other than their destination register — removing them changes
    /// behavior even if nothing reads their `dst`.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Instruction::ArrayStore { .. }
                | Instruction::Call { .. }
                | Instruction::TailCall { .. }
                | Instruction::Return { .. }
                | Instruction::Jump { .. }
                | Instruction::JumpConditional { .. }
                | Instruction::JumpEqualImmediate { .. }
                | Instruction::JumpGreaterThanImmediate { .. }
                | Instruction::JumpLessThanOrEqual { .. }
        )
    }

    /// The register this instruction defines, if any.
    pub fn destination(&self) -> Option<Register> {
        use Instruction::*;
        match *self {
            Move { dst, .. }
            | Load { dst, .. }
            | Add { dst, .. }
            | Subtract { dst, .. }
            | Multiply { dst, .. }
            | Divide { dst, .. }
            | Modulo { dst, .. }
            | AddImmediate { dst, .. }
            | SubtractImmediate { dst, .. }
            | MultiplyImmediate { dst, .. }
            | DivideImmediate { dst, .. }
            | ModuloImmediate { dst, .. }
            | LessThan { dst, .. }
            | GreaterThan { dst, .. }
            | LessThanOrEqual { dst, .. }
            | GreaterThanOrEqual { dst, .. }
            | Equal { dst, .. }
            | NotEqual { dst, .. }
            | LessThanImmediate { dst, .. }
            | GreaterThanImmediate { dst, .. }
            | LessThanOrEqualImmediate { dst, .. }
            | GreaterThanOrEqualImmediate { dst, .. }
            | EqualImmediate { dst, .. }
            | NotEqualImmediate { dst, .. }
            | Negate { dst, .. }
            | LogicalNot { dst, .. }
            | Call { dst, .. }
            | ArrayCreate { dst, .. }
            | ArrayLiteralCreate { dst, .. }
            | ArrayLoad { dst, .. }
            | ArrayLoadImmediate { dst, .. }
            | StructCreate { dst, .. }
            | StructLiteralCreate { dst, .. }
            | StructLoad { dst, .. }
            | AddressOf { dst, .. }
            | LoadIndirect { dst, .. } => Some(dst),

            ArrayStore { .. }
            | Jump { .. }
            | JumpConditional { .. }
            | JumpEqualImmediate { .. }
            | JumpGreaterThanImmediate { .. }
            | JumpLessThanOrEqual { .. }
            | TailCall { .. }
            | Return { .. } => None,
        }
    }

    /// Overwrite the register this instruction defines, if it defines one.
    /// Used by the peephole pass to retarget a producer directly into the
    /// register a trailing `Move` would otherwise have copied it to.
    pub fn set_destination(&mut self, reg: Register) {
        use Instruction::*;
        match self {
            Move { dst, .. }
            | Load { dst, .. }
            | Add { dst, .. }
            | Subtract { dst, .. }
            | Multiply { dst, .. }
            | Divide { dst, .. }
            | Modulo { dst, .. }
            | AddImmediate { dst, .. }
            | SubtractImmediate { dst, .. }
            | MultiplyImmediate { dst, .. }
            | DivideImmediate { dst, .. }
            | ModuloImmediate { dst, .. }
            | LessThan { dst, .. }
            | GreaterThan { dst, .. }
            | LessThanOrEqual { dst, .. }
            | GreaterThanOrEqual { dst, .. }
            | Equal { dst, .. }
            | NotEqual { dst, .. }
            | LessThanImmediate { dst, .. }
            | GreaterThanImmediate { dst, .. }
            | LessThanOrEqualImmediate { dst, .. }
            | GreaterThanOrEqualImmediate { dst, .. }
            | EqualImmediate { dst, .. }
            | NotEqualImmediate { dst, .. }
            | Negate { dst, .. }
            | LogicalNot { dst, .. }
            | Call { dst, .. }
            | ArrayCreate { dst, .. }
            | ArrayLiteralCreate { dst, .. }
            | ArrayLoad { dst, .. }
            | ArrayLoadImmediate { dst, .. }
            | StructCreate { dst, .. }
            | StructLiteralCreate { dst, .. }
            | StructLoad { dst, .. }
            | AddressOf { dst, .. }
            | LoadIndirect { dst, .. } => *dst = reg,

            ArrayStore { .. }
            | Jump { .. }
            | JumpConditional { .. }
            | JumpEqualImmediate { .. }
            | JumpGreaterThanImmediate { .. }
            | JumpLessThanOrEqual { .. }
            | TailCall { .. }
            | Return { .. } => {}
        }
    }

    /// All registers this instruction reads, in no particular order.
    pub fn sources(&self) -> Vec<Register> {
        use Instruction::*;
        match self {
            Move { src, .. } => vec![*src],
            Load { .. } => vec![],
            Add { lhs, rhs, .. }
            | Subtract { lhs, rhs, .. }
            | Multiply { lhs, rhs, .. }
            | Divide { lhs, rhs, .. }
            | Modulo { lhs, rhs, .. }
            | LessThan { lhs, rhs, .. }
            | GreaterThan { lhs, rhs, .. }
            | LessThanOrEqual { lhs, rhs, .. }
            | GreaterThanOrEqual { lhs, rhs, .. }
            | Equal { lhs, rhs, .. }
            | NotEqual { lhs, rhs, .. } => vec![*lhs, *rhs],
            AddImmediate { src, .. }
            | SubtractImmediate { src, .. }
            | MultiplyImmediate { src, .. }
            | DivideImmediate { src, .. }
            | ModuloImmediate { src, .. }
            | LessThanImmediate { src, .. }
            | GreaterThanImmediate { src, .. }
            | LessThanOrEqualImmediate { src, .. }
            | GreaterThanOrEqualImmediate { src, .. }
            | EqualImmediate { src, .. }
            | NotEqualImmediate { src, .. }
            | Negate { src, .. }
            | LogicalNot { src, .. } => vec![*src],
            Jump { .. } => vec![],
            JumpConditional { cond, .. } => vec![*cond],
            JumpEqualImmediate { src, .. } | JumpGreaterThanImmediate { src, .. } => vec![*src],
            JumpLessThanOrEqual { lhs, rhs, .. } => vec![*lhs, *rhs],
            Call { args, .. } => args.clone(),
            TailCall { args, .. } => args.clone(),
            Return { src } => vec![*src],
            ArrayCreate { elements, .. } => elements.clone(),
            ArrayLiteralCreate { .. } => vec![],
            ArrayLoad { array, index, .. } => vec![*array, *index],
            ArrayLoadImmediate { array, .. } => vec![*array],
            ArrayStore { array, index, value } => vec![*array, *index, *value],
            StructCreate { fields, .. } => fields.iter().map(|(_, r)| *r).collect(),
            StructLiteralCreate { .. } => vec![],
            StructLoad { object, .. } => vec![*object],
            AddressOf { src, .. } => vec![*src],
            LoadIndirect { ptr, .. } => vec![*ptr],
        }
    }

    /// Rewrite every source register operand in place, leaving the
    /// destination (and any `AddressOf.src`, which names a slot identity
    /// rather than a value to substitute) to the caller's discretion via
    /// [`Instruction::is_address_taken_source`].
    pub fn map_sources(&mut self, mut f: impl FnMut(Register) -> Register) {
        use Instruction::*;
        match self {
            Move { src, .. } => *src = f(*src),
            Load { .. } => {}
            Add { lhs, rhs, .. }
            | Subtract { lhs, rhs, .. }
            | Multiply { lhs, rhs, .. }
            | Divide { lhs, rhs, .. }
            | Modulo { lhs, rhs, .. }
            | LessThan { lhs, rhs, .. }
            | GreaterThan { lhs, rhs, .. }
            | LessThanOrEqual { lhs, rhs, .. }
            | GreaterThanOrEqual { lhs, rhs, .. }
            | Equal { lhs, rhs, .. }
            | NotEqual { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            AddImmediate { src, .. }
            | SubtractImmediate { src, .. }
            | MultiplyImmediate { src, .. }
            | DivideImmediate { src, .. }
            | ModuloImmediate { src, .. }
            | LessThanImmediate { src, .. }
            | GreaterThanImmediate { src, .. }
            | LessThanOrEqualImmediate { src, .. }
            | GreaterThanOrEqualImmediate { src, .. }
            | EqualImmediate { src, .. }
            | NotEqualImmediate { src, .. }
            | LogicalNot { src, .. }
            | Negate { src, .. } => *src = f(*src),
            Jump { .. } => {}
            JumpConditional { cond, .. } => *cond = f(*cond),
            JumpEqualImmediate { src, .. } | JumpGreaterThanImmediate { src, .. } => *src = f(*src),
            JumpLessThanOrEqual { lhs, rhs, .. } => {
                *lhs = f(*lhs);
                *rhs = f(*rhs);
            }
            Call { args, .. } | TailCall { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            Return { src } => *src = f(*src),
            ArrayCreate { elements, .. } => {
                for e in elements.iter_mut() {
                    *e = f(*e);
                }
            }
            ArrayLiteralCreate { .. } => {}
            ArrayLoad { array, index, .. } => {
                *array = f(*array);
                *index = f(*index);
            }
            ArrayLoadImmediate { array, .. } => *array = f(*array),
            ArrayStore { array, index, value } => {
                *array = f(*array);
                *index = f(*index);
                *value = f(*value);
            }
            StructCreate { fields, .. } => {
                for (_, r) in fields.iter_mut() {
                    *r = f(*r);
                }
            }
            StructLiteralCreate { .. } => {}
            StructLoad { object, .. } => *object = f(*object),
            AddressOf { .. } => {
                // `src` names a slot identity, never substituted.
            }
            LoadIndirect { ptr, .. } => *ptr = f(*ptr),
        }
    }

    /// Every register this instruction's destination could alias (for
    /// `Move`, the source) — used by copy-propagation invalidation.
    pub fn move_source(&self) -> Option<Register> {
        match self {
            Instruction::Move { src, .. } => Some(*src),
            _ => None,
        }
    }

    /// Constant destination value, for `Load` and the all-immediate
    /// producers the peephole/copy-prop passes track as known constants.
    pub fn constant_value(&self) -> Option<Value> {
        match self {
            Instruction::Load { imm, .. } => Some(*imm),
            _ => None,
        }
    }

    /// Every label this instruction can transfer control to.
    pub fn targets(&self) -> Vec<Label> {
        use Instruction::*;
        match self {
            Jump { target } => vec![*target],
            JumpConditional { if_true, if_false, .. } => vec![*if_true, *if_false],
            JumpEqualImmediate { if_true, if_false, .. }
            | JumpGreaterThanImmediate { if_true, if_false, .. }
            | JumpLessThanOrEqual { if_true, if_false, .. } => vec![*if_true, *if_false],
            Call { target, .. } => vec![*target],
            TailCall { target, .. } => vec![*target],
            _ => vec![],
        }
    }

    /// Rewrite every label this instruction references.
    pub fn map_targets(&mut self, mut f: impl FnMut(Label) -> Label) {
        use Instruction::*;
        match self {
            Jump { target } => *target = f(*target),
            JumpConditional { if_true, if_false, .. } => {
                *if_true = f(*if_true);
                *if_false = f(*if_false);
            }
            JumpEqualImmediate { if_true, if_false, .. }
            | JumpGreaterThanImmediate { if_true, if_false, .. }
            | JumpLessThanOrEqual { if_true, if_false, .. } => {
                *if_true = f(*if_true);
                *if_false = f(*if_false);
            }
            Call { target, .. } => *target = f(*target),
            TailCall { target, .. } => *target = f(*target),
            _ => {}
        }
    }

    /// True for instructions that are pure producers: no observable
    /// effect beyond writing `dst`, safe to hoist (LICM) or eliminate
    /// (DCE) when that write is unused.
    pub fn is_pure_producer(&self) -> bool {
        self.destination().is_some() && !self.has_side_effect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn ends_in_terminator(&self) -> bool {
        self.terminator().is_some()
    }
}

/// The block vector a generated or optimized program is represented as.
/// Block 0 is always the entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub blocks: Vec<BasicBlock>,
}

impl Program {
    pub fn new() -> Self {
        Self { blocks: vec![BasicBlock::new()] }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, block) in self.blocks.iter().enumerate() {
            writeln!(f, "block {label}:")?;
            for instr in &block.instructions {
                writeln!(f, "    {instr:?}")?;
            }
        }
        Ok(())
    }
}
