//! Lowers an AST to the register-machine IR.
//!
//! Built around a counter-based allocator and a forward-reference patch
//! table: `allocate` hands out a fresh register, `current` names the
//! last one allocated, and a call to a not-yet-declared function is
//! recorded in a pending table and patched once the declaration is
//! reached. Register numbering restarts at zero
//! for every function body (including the implicit top-level "main"),
//! which is what lets the bytecode interpreter address a register as
//! `frame_base + register_id`.

use crate::ir::{BasicBlock, Instruction, Label, Program, Register, Value};
use hashbrown::HashMap;
use seen_parser::{BinaryOp, Expr, ExprKind, UnaryOp};

struct PendingCall {
    block: Label,
    index: usize,
}

struct FunctionInfo {
    entry: Label,
    params: Vec<Register>,
}

pub struct Generator {
    blocks: Vec<BasicBlock>,
    current_block: Label,
    next_register: Register,
    current_register: Register,
    /// A stack of scope frames, innermost last — mirrors the checker's
    /// own scope stack so a nested block may shadow an outer variable
    /// without disturbing the outer binding once the block ends.
    variables: Vec<HashMap<String, Register>>,
    functions: HashMap<String, FunctionInfo>,
    pending_calls: HashMap<String, Vec<PendingCall>>,
}

/// Lower a checked program (a top-level `Block`) to IR. The caller must
/// have already run the semantic checker and confirmed no diagnostics
/// were raised — generation assumes every name resolves.
pub fn generate(program: &Expr) -> Program {
    let program = ensure_trailing_return(program);
    let mut generator = Generator::new();
    generator.lower(&program);
    generator.finalize();
    debug_assert!(generator.pending_calls.is_empty(), "unresolved forward call(s) after generation");
    let program = Program { blocks: generator.blocks };
    log::debug!(
        "generated {} block(s), {} function(s)",
        program.blocks.len(),
        generator.functions.len()
    );
    program
}

/// The AST interpreter treats a top-level `Block`'s last statement as the
/// program's value whether or not it says `return` (`tree::Interpreter::eval`,
/// the `Block` arm). The generator has no such fallback: `finalize` only
/// patches a block that fell off the end with `Load r,0; Return r`, so a
/// trailing bare expression would silently lower to a return of `0`
/// instead of its own value. Wrap the top-level block's last statement in
/// a synthetic `Return` before lowering so both backends agree on what a
/// program without an explicit final `return` evaluates to.
fn ensure_trailing_return(program: &Expr) -> std::borrow::Cow<'_, Expr> {
    let ExprKind::Block(statements) = &*program.kind else {
        return std::borrow::Cow::Borrowed(program);
    };
    match statements.last() {
        Some(last) if !matches!(&*last.kind, ExprKind::Return(_)) => {
            let mut statements = statements.clone();
            let tail = statements.pop().expect("just matched Some(last)");
            let tail_span = tail.span;
            statements.push(Expr::new(ExprKind::Return(tail), tail_span));
            std::borrow::Cow::Owned(Expr::new(ExprKind::Block(statements), program.span))
        }
        _ => std::borrow::Cow::Borrowed(program),
    }
}

impl Generator {
    fn new() -> Self {
        Self {
            blocks: vec![BasicBlock::new()],
            current_block: 0,
            next_register: 0,
            current_register: 0,
            variables: vec![HashMap::new()],
            functions: HashMap::new(),
            pending_calls: HashMap::new(),
        }
    }

    // --- register / block plumbing ---

    fn push_scope(&mut self) {
        self.variables.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.variables.pop();
    }

    fn define(&mut self, name: String, slot: Register) {
        self.variables.last_mut().expect("at least one scope is always active").insert(name, slot);
    }

    fn lookup(&self, name: &str) -> Register {
        self.variables
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
            .unwrap_or_else(|| panic!("undefined variable '{name}' reached code generation"))
    }

    fn allocate(&mut self) -> Register {
        let r = self.next_register;
        self.next_register += 1;
        self.current_register = r;
        r
    }

    fn new_block(&mut self) -> Label {
        self.blocks.push(BasicBlock::new());
        self.blocks.len() - 1
    }

    fn switch_to(&mut self, label: Label) {
        self.current_block = label;
    }

    fn emit(&mut self, instr: Instruction) {
        self.blocks[self.current_block].instructions.push(instr);
    }

    fn emit_at(&mut self, block: Label, instr: Instruction) {
        self.blocks[block].instructions.push(instr);
    }

    fn ends_in_terminator(&self, block: Label) -> bool {
        self.blocks[block].ends_in_terminator()
    }

    /// Append a `Jump` to `target` from `block` unless it already ends
    /// in a terminator (e.g. a `return` inside the branch being closed).
    fn close_with_jump(&mut self, block: Label, target: Label) {
        if !self.ends_in_terminator(block) {
            self.emit_at(block, Instruction::Jump { target });
        }
    }

    /// Once every block has been generated, every block lacking a
    /// terminator falls through to the next one; the last block instead
    /// gets a synthesized `return 0`.
    fn finalize(&mut self) {
        let last = self.blocks.len() - 1;
        for label in 0..self.blocks.len() {
            if self.blocks[label].ends_in_terminator() {
                continue;
            }
            if label == last {
                let r = self.allocate();
                self.emit_at(label, Instruction::Load { dst: r, imm: 0 });
                self.emit_at(label, Instruction::Return { src: r });
            } else {
                self.emit_at(label, Instruction::Jump { target: label + 1 });
            }
        }
    }

    // --- lowering ---

    fn lower(&mut self, expr: &Expr) -> Register {
        match &*expr.kind {
            ExprKind::Block(statements) => {
                self.push_scope();
                let mut result = self.current_register;
                for stmt in statements {
                    result = self.lower(stmt);
                }
                self.pop_scope();
                result
            }

            ExprKind::Literal(value) => self.lower_literal(*value),

            ExprKind::Variable(name) => self.lookup(name),

            ExprKind::VariableDeclaration { name, init } => {
                let value_reg = self.lower(init);
                let slot = self.allocate();
                self.emit(Instruction::Move { dst: slot, src: value_reg });
                self.define(name.clone(), slot);
                slot
            }

            ExprKind::Assignment { name, value } => {
                let value_reg = self.lower(value);
                let slot = self.lookup(name);
                self.emit(Instruction::Move { dst: slot, src: value_reg });
                self.current_register = slot;
                slot
            }

            ExprKind::Increment(inner) => {
                let ExprKind::Variable(name) = &*inner.kind else {
                    panic!("parser guarantees Increment operand is a Variable");
                };
                let slot = self.lookup(name);
                self.emit(Instruction::AddImmediate { dst: slot, src: slot, imm: 1 });
                self.current_register = slot;
                slot
            }

            ExprKind::FunctionDeclaration { name, params, body } => {
                self.lower_function_declaration(name, params, body);
                self.current_register
            }

            ExprKind::FunctionCall { name, args } => self.lower_call(name, args),

            ExprKind::Return(value) => {
                let r = self.lower(value);
                self.emit(Instruction::Return { src: r });
                r
            }

            ExprKind::IfElse { condition, then_branch, else_branch } => {
                self.lower_if_else(condition, then_branch, else_branch)
            }

            ExprKind::While { condition, body } => self.lower_while(condition, body),

            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right),

            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),

            ExprKind::ArrayLiteral(elements) => {
                let regs: Vec<Register> = elements.iter().map(|e| self.lower(e)).collect();
                let dst = self.allocate();
                self.emit(Instruction::ArrayCreate { dst, elements: regs });
                dst
            }

            ExprKind::Index { array, index } => {
                let array_reg = self.lower(array);
                let index_reg = self.lower(index);
                let dst = self.allocate();
                self.emit(Instruction::ArrayLoad { dst, array: array_reg, index: index_reg });
                dst
            }

            ExprKind::IndexAssignment { array, index, value } => {
                let array_reg = self.lower(array);
                let index_reg = self.lower(index);
                let value_reg = self.lower(value);
                self.emit(Instruction::ArrayStore { array: array_reg, index: index_reg, value: value_reg });
                self.current_register = value_reg;
                value_reg
            }

            ExprKind::StructLiteral(fields) => {
                let regs: Vec<(String, Register)> =
                    fields.iter().map(|(name, value)| (name.clone(), self.lower(value))).collect();
                let dst = self.allocate();
                self.emit(Instruction::StructCreate { dst, fields: regs });
                dst
            }

            ExprKind::FieldAccess { object, field } => {
                let object_reg = self.lower(object);
                let dst = self.allocate();
                self.emit(Instruction::StructLoad { dst, object: object_reg, field: field.clone() });
                dst
            }
        }
    }

    fn lower_literal(&mut self, value: Value) -> Register {
        let dst = self.allocate();
        self.emit(Instruction::Load { dst, imm: value });
        dst
    }

    fn lower_function_declaration(&mut self, name: &str, params: &[String], body: &Expr) {
        let over_block = self.current_block;
        let jump_index = self.blocks[over_block].instructions.len();
        // Placeholder, patched once the after-block is known.
        self.emit(Instruction::Jump { target: Label::MAX });

        let entry = self.new_block();

        let saved_registers = self.next_register;
        let saved_current = self.current_register;
        let saved_variables = std::mem::replace(&mut self.variables, vec![HashMap::new()]);
        self.next_register = 0;
        self.current_register = 0;
        self.switch_to(entry);

        let mut param_regs = Vec::with_capacity(params.len());
        for param in params {
            let r = self.allocate();
            self.define(param.clone(), r);
            param_regs.push(r);
        }

        self.lower(body);
        let body_end = self.current_block;
        if !self.ends_in_terminator(body_end) {
            let r = self.allocate();
            self.emit_at(body_end, Instruction::Load { dst: r, imm: 0 });
            self.emit_at(body_end, Instruction::Return { src: r });
        }

        self.functions.insert(name.to_string(), FunctionInfo { entry, params: param_regs.clone() });

        if let Some(pending) = self.pending_calls.remove(name) {
            for call in pending {
                let Instruction::Call { dst, args, .. } = self.blocks[call.block].instructions[call.index].clone()
                else {
                    unreachable!("pending_calls only records Call instructions");
                };
                self.blocks[call.block].instructions[call.index] =
                    Instruction::Call { dst, target: entry, args, params: param_regs.clone() };
            }
        }

        self.variables = saved_variables;
        self.next_register = saved_registers;
        self.current_register = saved_current;

        let after = self.new_block();
        self.blocks[over_block].instructions[jump_index] = Instruction::Jump { target: after };
        self.switch_to(after);
    }

    fn lower_call(&mut self, name: &str, args: &[Expr]) -> Register {
        let arg_regs: Vec<Register> = args.iter().map(|a| self.lower(a)).collect();
        let dst = self.allocate();
        match self.functions.get(name) {
            Some(info) => {
                self.emit(Instruction::Call {
                    dst,
                    target: info.entry,
                    args: arg_regs,
                    params: info.params.clone(),
                });
            }
            None => {
                let block = self.current_block;
                let index = self.blocks[block].instructions.len();
                self.emit(Instruction::Call { dst, target: Label::MAX, args: arg_regs, params: Vec::new() });
                self.pending_calls.entry(name.to_string()).or_default().push(PendingCall { block, index });
            }
        }
        dst
    }

    fn lower_if_else(&mut self, condition: &Expr, then_branch: &Expr, else_branch: &Expr) -> Register {
        let head = self.current_block;
        let cond_reg = self.lower(condition);
        let head_end = self.current_block;

        let then_label = self.new_block();
        let else_label = self.new_block();
        self.emit_at(head_end, Instruction::JumpConditional { cond: cond_reg, if_true: then_label, if_false: else_label });
        let _ = head;

        self.switch_to(then_label);
        self.lower(then_branch);
        let then_end = self.current_block;

        self.switch_to(else_label);
        self.lower(else_branch);
        let else_end = self.current_block;

        let end_label = self.new_block();
        self.close_with_jump(then_end, end_label);
        self.close_with_jump(else_end, end_label);
        self.switch_to(end_label);
        self.current_register
    }

    fn lower_while(&mut self, condition: &Expr, body: &Expr) -> Register {
        let cond_label = self.new_block();
        self.switch_to(cond_label);
        let cond_reg = self.lower(condition);
        let cond_end = self.current_block;

        let body_label = self.new_block();
        let end_label = self.new_block();
        self.emit_at(cond_end, Instruction::JumpConditional { cond: cond_reg, if_true: body_label, if_false: end_label });

        self.switch_to(body_label);
        self.lower(body);
        let body_end = self.current_block;
        self.close_with_jump(body_end, cond_label);

        self.switch_to(end_label);
        self.current_register
    }

    fn lower_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Register {
        match op {
            BinaryOp::LogicalAnd => return self.lower_logical_and(left, right),
            BinaryOp::LogicalOr => return self.lower_logical_or(left, right),
            _ => {}
        }

        let (left, right) = if op.is_commutative() && is_literal(left) && !is_literal(right) {
            (right, left)
        } else {
            (left, right)
        };

        let immediate_eligible = matches!(
            op,
            BinaryOp::Add
                | BinaryOp::Multiply
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Subtract
                | BinaryOp::Divide
                | BinaryOp::Modulo
                | BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThanOrEqual
        );

        if immediate_eligible {
            if let ExprKind::Literal(imm) = &*right.kind {
                let src = self.lower(left);
                let dst = self.allocate();
                self.emit(immediate_instruction(op, dst, src, *imm));
                return dst;
            }
        }

        let lhs = self.lower(left);
        let rhs = self.lower(right);
        let dst = self.allocate();
        self.emit(register_instruction(op, dst, lhs, rhs));
        dst
    }

    /// `a && b`, short-circuited: if `a` is falsy, the result is 0
    /// without evaluating `b`; otherwise the result is `b != 0`.
    fn lower_logical_and(&mut self, left: &Expr, right: &Expr) -> Register {
        let dst = self.allocate();
        let lhs_reg = self.lower(left);
        let head_end = self.current_block;
        let rhs_label = self.new_block();
        let false_label = self.new_block();
        let end_label = self.new_block();
        self.emit_at(head_end, Instruction::JumpConditional { cond: lhs_reg, if_true: rhs_label, if_false: false_label });

        self.switch_to(rhs_label);
        let rhs_reg = self.lower(right);
        let rhs_end = self.current_block;
        self.emit_at(rhs_end, Instruction::NotEqualImmediate { dst, src: rhs_reg, imm: 0 });
        self.close_with_jump(rhs_end, end_label);

        self.switch_to(false_label);
        self.emit(Instruction::Load { dst, imm: 0 });
        self.close_with_jump(false_label, end_label);

        self.switch_to(end_label);
        self.current_register = dst;
        dst
    }

    /// `a || b`, short-circuited: if `a` is truthy, the result is 1
    /// without evaluating `b`; otherwise the result is `b != 0`.
    fn lower_logical_or(&mut self, left: &Expr, right: &Expr) -> Register {
        let dst = self.allocate();
        let lhs_reg = self.lower(left);
        let head_end = self.current_block;
        let true_label = self.new_block();
        let rhs_label = self.new_block();
        let end_label = self.new_block();
        self.emit_at(head_end, Instruction::JumpConditional { cond: lhs_reg, if_true: true_label, if_false: rhs_label });

        self.switch_to(true_label);
        self.emit(Instruction::Load { dst, imm: 1 });
        self.close_with_jump(true_label, end_label);

        self.switch_to(rhs_label);
        let rhs_reg = self.lower(right);
        let rhs_end = self.current_block;
        self.emit_at(rhs_end, Instruction::NotEqualImmediate { dst, src: rhs_reg, imm: 0 });
        self.close_with_jump(rhs_end, end_label);

        self.switch_to(end_label);
        self.current_register = dst;
        dst
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> Register {
        match op {
            UnaryOp::UnaryPlus => self.lower(operand),
            UnaryOp::Negate => {
                let src = self.lower(operand);
                let dst = self.allocate();
                self.emit(Instruction::Negate { dst, src });
                dst
            }
            UnaryOp::LogicalNot => {
                let src = self.lower(operand);
                let dst = self.allocate();
                self.emit(Instruction::LogicalNot { dst, src });
                dst
            }
            UnaryOp::AddressOf => {
                if let ExprKind::Variable(name) = &*operand.kind {
                    let slot = self.lookup(name);
                    let dst = self.allocate();
                    self.emit(Instruction::AddressOf { dst, src: slot });
                    dst
                } else {
                    let value_reg = self.lower(operand);
                    let snapshot = self.allocate();
                    self.emit(Instruction::Move { dst: snapshot, src: value_reg });
                    let dst = self.allocate();
                    self.emit(Instruction::AddressOf { dst, src: snapshot });
                    dst
                }
            }
            UnaryOp::Dereference => {
                let ptr = self.lower(operand);
                let dst = self.allocate();
                self.emit(Instruction::LoadIndirect { dst, ptr });
                dst
            }
        }
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(&*expr.kind, ExprKind::Literal(_))
}

fn immediate_instruction(op: BinaryOp, dst: Register, src: Register, imm: Value) -> Instruction {
    use Instruction::*;
    match op {
        BinaryOp::Add => AddImmediate { dst, src, imm },
        BinaryOp::Subtract => SubtractImmediate { dst, src, imm },
        BinaryOp::Multiply => MultiplyImmediate { dst, src, imm },
        BinaryOp::Divide => DivideImmediate { dst, src, imm },
        BinaryOp::Modulo => ModuloImmediate { dst, src, imm },
        BinaryOp::LessThan => LessThanImmediate { dst, src, imm },
        BinaryOp::GreaterThan => GreaterThanImmediate { dst, src, imm },
        BinaryOp::LessThanOrEqual => LessThanOrEqualImmediate { dst, src, imm },
        BinaryOp::GreaterThanOrEqual => GreaterThanOrEqualImmediate { dst, src, imm },
        BinaryOp::Equal => EqualImmediate { dst, src, imm },
        BinaryOp::NotEqual => NotEqualImmediate { dst, src, imm },
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!("handled by lower_logical_*"),
    }
}

fn register_instruction(op: BinaryOp, dst: Register, lhs: Register, rhs: Register) -> Instruction {
    use Instruction::*;
    match op {
        BinaryOp::Add => Add { dst, lhs, rhs },
        BinaryOp::Subtract => Subtract { dst, lhs, rhs },
        BinaryOp::Multiply => Multiply { dst, lhs, rhs },
        BinaryOp::Divide => Divide { dst, lhs, rhs },
        BinaryOp::Modulo => Modulo { dst, lhs, rhs },
        BinaryOp::LessThan => LessThan { dst, lhs, rhs },
        BinaryOp::GreaterThan => GreaterThan { dst, lhs, rhs },
        BinaryOp::LessThanOrEqual => LessThanOrEqual { dst, lhs, rhs },
        BinaryOp::GreaterThanOrEqual => GreaterThanOrEqual { dst, lhs, rhs },
        BinaryOp::Equal => Equal { dst, lhs, rhs },
        BinaryOp::NotEqual => NotEqual { dst, lhs, rhs },
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!("handled by lower_logical_*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seen_parser::parse_program;

    fn gen(src: &str) -> Program {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        generate(&parsed.program)
    }

    #[test]
    fn every_block_ends_in_a_terminator() {
        let program = gen("let i = 0; while (i < 10) { i++; } return i;");
        for block in &program.blocks {
            assert!(block.ends_in_terminator(), "{:?}", block);
        }
    }

    #[test]
    fn empty_program_returns_zero() {
        let program = gen("");
        assert!(matches!(
            program.blocks[0].instructions.last(),
            Some(Instruction::Return { .. })
        ));
    }

    #[test]
    fn forward_reference_is_patched() {
        let program = gen("fn main() { return helper(1); } fn helper(a) { return a; }");
        let has_unpatched = program
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .any(|i| matches!(i, Instruction::Call { target, .. } if *target == Label::MAX));
        assert!(!has_unpatched);
    }

    #[test]
    fn commutative_literal_canonicalizes_to_immediate_slot() {
        let a = gen("let x = 0; return 1 + x;");
        let b = gen("let x = 0; return x + 1;");
        let has_add_immediate = |p: &Program| {
            p.blocks.iter().flat_map(|b| &b.instructions).any(|i| matches!(i, Instruction::AddImmediate { .. }))
        };
        assert!(has_add_immediate(&a));
        assert!(has_add_immediate(&b));
    }

    proptest::proptest! {
        #[test]
        fn commutative_operators_canonicalize_the_same_way_regardless_of_literal_position(
            literal in 0u64..1000,
            op in proptest::prelude::prop_oneof![
                proptest::prelude::Just("+"),
                proptest::prelude::Just("*"),
                proptest::prelude::Just("=="),
                proptest::prelude::Just("!="),
            ],
        ) {
            let literal_first = gen(&format!("let x = 0; return {literal} {op} x;"));
            let variable_first = gen(&format!("let x = 0; return x {op} {literal};"));
            proptest::prop_assert_eq!(
                format!("{:?}", literal_first.blocks),
                format!("{:?}", variable_first.blocks),
            );
        }
    }

    #[test]
    fn trailing_bare_expression_is_wrapped_in_a_return() {
        let program = gen("let point = struct { x: 40, y: 2 }; point.x + point.y;");
        let last_block = program.blocks.last().expect("at least one block");
        assert!(matches!(last_block.instructions.last(), Some(Instruction::Return { .. })));
    }
}
