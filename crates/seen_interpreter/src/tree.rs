//! Tree-walking reference interpreter. Used as the correctness oracle
//! the bytecode interpreter is checked against: same heap model (arrays,
//! structs, pointer targets), same 64-bit wrapping arithmetic, same
//! fatal-trap treatment of division/modulo by zero, observably identical
//! on terminating programs.
//!
//! Function declarations are global, not lexically scoped — gathered in
//! one upfront walk exactly as the checker's own `collect_functions`
//! does. Variable scoping, on the other hand, *is* lexical: each `Block`
//! opens a fresh frame, shadowing an outer binding only for its own
//! extent, matching the checker's `push_scope`/`pop_scope` pair. A
//! variable binding is an `Rc<RefCell<Value>>` cell rather than a bare
//! `Value` so that `&x` can hand out a live reference to the same
//! storage — the same write-through semantics the bytecode interpreter
//! gets from `(frame_base, register)` indirection, without inventing a
//! second addressing scheme just for the oracle.

use hashbrown::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

use seen_common::RuntimeError;
use seen_parser::{BinaryOp, Expr, ExprKind, UnaryOp};

use crate::heap::Heap;

pub type Value = u64;

type Cell = Rc<RefCell<Value>>;

#[derive(Clone)]
struct PointerTarget(Cell);

struct Function<'a> {
    params: &'a [String],
    body: &'a Expr,
}

type Scope = HashMap<String, Cell>;

pub struct Interpreter<'a> {
    functions: HashMap<String, Function<'a>>,
    scopes: Vec<Scope>,
    heap: Heap<PointerTarget>,
}

/// Result of evaluating a statement: either a plain value, or a signal
/// that a `return` was hit and everything enclosing it should unwind
/// without evaluating the rest of the block/loop.
enum Flow {
    Value(Value),
    Return(Value),
}

impl<'a> Interpreter<'a> {
    pub fn new() -> Self {
        Self { functions: HashMap::new(), scopes: vec![Scope::new()], heap: Heap::new() }
    }

    pub fn interpret(&mut self, program: &'a Expr) -> Result<Value, RuntimeError> {
        self.functions.clear();
        self.scopes = vec![Scope::new()];
        self.heap.clear();
        self.collect_functions(program);
        match self.eval(program)? {
            Flow::Value(v) => Ok(v),
            Flow::Return(v) => Ok(v),
        }
    }

    fn collect_functions(&mut self, expr: &'a Expr) {
        match &*expr.kind {
            ExprKind::FunctionDeclaration { name, params, body } => {
                self.functions.insert(name.clone(), Function { params, body });
                self.collect_functions(body);
            }
            ExprKind::Block(statements) => statements.iter().for_each(|s| self.collect_functions(s)),
            ExprKind::IfElse { condition, then_branch, else_branch } => {
                self.collect_functions(condition);
                self.collect_functions(then_branch);
                self.collect_functions(else_branch);
            }
            ExprKind::While { condition, body } => {
                self.collect_functions(condition);
                self.collect_functions(body);
            }
            ExprKind::VariableDeclaration { init, .. } => self.collect_functions(init),
            ExprKind::Assignment { value, .. } => self.collect_functions(value),
            ExprKind::Increment(inner) => self.collect_functions(inner),
            ExprKind::FunctionCall { args, .. } => args.iter().for_each(|a| self.collect_functions(a)),
            ExprKind::Return(value) => self.collect_functions(value),
            ExprKind::Binary { left, right, .. } => {
                self.collect_functions(left);
                self.collect_functions(right);
            }
            ExprKind::Unary { operand, .. } => self.collect_functions(operand),
            ExprKind::ArrayLiteral(elements) => elements.iter().for_each(|e| self.collect_functions(e)),
            ExprKind::Index { array, index } => {
                self.collect_functions(array);
                self.collect_functions(index);
            }
            ExprKind::IndexAssignment { array, index, value } => {
                self.collect_functions(array);
                self.collect_functions(index);
                self.collect_functions(value);
            }
            ExprKind::StructLiteral(fields) => fields.iter().for_each(|(_, v)| self.collect_functions(v)),
            ExprKind::FieldAccess { object, .. } => self.collect_functions(object),
            ExprKind::Literal(_) | ExprKind::Variable(_) => {}
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: String, value: Value) {
        self.scopes.last_mut().expect("at least one scope is always active").insert(name, Rc::new(RefCell::new(value)));
    }

    fn cell(&self, name: &str) -> Cell {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .unwrap_or_else(|| panic!("undefined variable '{name}' reached interpretation"))
    }

    fn eval(&mut self, expr: &'a Expr) -> Result<Flow, RuntimeError> {
        match &*expr.kind {
            ExprKind::Block(statements) => {
                self.push_scope();
                let mut result = 0;
                for stmt in statements {
                    match self.eval(stmt)? {
                        Flow::Value(v) => result = v,
                        Flow::Return(v) => {
                            self.pop_scope();
                            return Ok(Flow::Return(v));
                        }
                    }
                }
                self.pop_scope();
                Ok(Flow::Value(result))
            }

            ExprKind::Literal(value) => Ok(Flow::Value(*value)),

            ExprKind::Variable(name) => Ok(Flow::Value(*self.cell(name).borrow())),

            ExprKind::VariableDeclaration { name, init } => {
                let value = self.eval_value(init)?;
                self.define(name.clone(), value);
                Ok(Flow::Value(value))
            }

            ExprKind::Assignment { name, value } => {
                let v = self.eval_value(value)?;
                *self.cell(name).borrow_mut() = v;
                Ok(Flow::Value(v))
            }

            ExprKind::Increment(inner) => {
                let ExprKind::Variable(name) = &*inner.kind else {
                    panic!("parser guarantees Increment operand is a Variable");
                };
                let cell = self.cell(name);
                let v = cell.borrow().wrapping_add(1);
                *cell.borrow_mut() = v;
                Ok(Flow::Value(v))
            }

            ExprKind::FunctionDeclaration { .. } => Ok(Flow::Value(0)),

            ExprKind::FunctionCall { name, args } => Ok(Flow::Value(self.call(name, args)?)),

            ExprKind::Return(value) => Ok(Flow::Return(self.eval_value(value)?)),

            ExprKind::IfElse { condition, then_branch, else_branch } => {
                if self.eval_value(condition)? != 0 {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }

            ExprKind::While { condition, body } => {
                let mut result = 0;
                while self.eval_value(condition)? != 0 {
                    match self.eval(body)? {
                        Flow::Value(v) => result = v,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                    }
                }
                Ok(Flow::Value(result))
            }

            ExprKind::Binary { op, left, right } => Ok(Flow::Value(self.eval_binary(*op, left, right)?)),

            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),

            ExprKind::ArrayLiteral(elements) => {
                let values = elements.iter().map(|e| self.eval_value(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(Flow::Value(self.heap.alloc_array(values)))
            }

            ExprKind::Index { array, index } => {
                let array_id = self.eval_value(array)?;
                let index_value = self.eval_value(index)?;
                Ok(Flow::Value(self.heap.array_element(array_id, index_value)?))
            }

            ExprKind::IndexAssignment { array, index, value } => {
                let array_id = self.eval_value(array)?;
                let index_value = self.eval_value(index)?;
                let v = self.eval_value(value)?;
                self.heap.set_array_element(array_id, index_value, v)?;
                Ok(Flow::Value(v))
            }

            ExprKind::StructLiteral(fields) => {
                let map: HashMap<String, Value> = fields
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.eval_value(value)?)))
                    .collect::<Result<_, RuntimeError>>()?;
                Ok(Flow::Value(self.heap.alloc_struct(map)))
            }

            ExprKind::FieldAccess { object, field } => {
                let object_id = self.eval_value(object)?;
                Ok(Flow::Value(self.heap.struct_field(object_id, field)?))
            }
        }
    }

    fn eval_value(&mut self, expr: &'a Expr) -> Result<Value, RuntimeError> {
        match self.eval(expr)? {
            Flow::Value(v) => Ok(v),
            Flow::Return(v) => Ok(v),
        }
    }

    fn call(&mut self, name: &str, args: &'a [Expr]) -> Result<Value, RuntimeError> {
        let values = args.iter().map(|a| self.eval_value(a)).collect::<Result<Vec<_>, _>>()?;
        let function = self
            .functions
            .get(name)
            .map(|f| (f.params, f.body))
            .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.to_string() })?;
        let (params, body) = function;

        let saved_scopes = std::mem::replace(&mut self.scopes, vec![Scope::new()]);
        for (param, value) in params.iter().zip(values) {
            self.define(param.clone(), value);
        }
        let result = match self.eval(body)? {
            Flow::Value(v) => v,
            Flow::Return(v) => v,
        };
        self.scopes = saved_scopes;
        Ok(result)
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &'a Expr, right: &'a Expr) -> Result<Value, RuntimeError> {
        if op == BinaryOp::LogicalAnd {
            let lhs = self.eval_value(left)?;
            if lhs == 0 {
                return Ok(0);
            }
            return Ok(if self.eval_value(right)? != 0 { 1 } else { 0 });
        }
        if op == BinaryOp::LogicalOr {
            let lhs = self.eval_value(left)?;
            if lhs != 0 {
                return Ok(1);
            }
            return Ok(if self.eval_value(right)? != 0 { 1 } else { 0 });
        }

        let lhs = self.eval_value(left)?;
        let rhs = self.eval_value(right)?;
        match op {
            BinaryOp::Add => Ok(lhs.wrapping_add(rhs)),
            BinaryOp::Subtract => Ok(lhs.wrapping_sub(rhs)),
            BinaryOp::Multiply => Ok(lhs.wrapping_mul(rhs)),
            BinaryOp::Divide => {
                if rhs == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Ok(lhs.wrapping_div(rhs))
            }
            BinaryOp::Modulo => {
                if rhs == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                Ok(lhs.wrapping_rem(rhs))
            }
            BinaryOp::LessThan => Ok((lhs < rhs) as Value),
            BinaryOp::GreaterThan => Ok((lhs > rhs) as Value),
            BinaryOp::LessThanOrEqual => Ok((lhs <= rhs) as Value),
            BinaryOp::GreaterThanOrEqual => Ok((lhs >= rhs) as Value),
            BinaryOp::Equal => Ok((lhs == rhs) as Value),
            BinaryOp::NotEqual => Ok((lhs != rhs) as Value),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!("handled above"),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &'a Expr) -> Result<Flow, RuntimeError> {
        match op {
            UnaryOp::UnaryPlus => self.eval(operand),
            UnaryOp::Negate => {
                let v = self.eval_value(operand)?;
                Ok(Flow::Value((v as i64).wrapping_neg() as u64))
            }
            UnaryOp::LogicalNot => {
                let v = self.eval_value(operand)?;
                Ok(Flow::Value(if v == 0 { 1 } else { 0 }))
            }
            UnaryOp::AddressOf => {
                let cell = if let ExprKind::Variable(name) = &*operand.kind {
                    self.cell(name)
                } else {
                    Rc::new(RefCell::new(self.eval_value(operand)?))
                };
                Ok(Flow::Value(self.heap.alloc_pointer(PointerTarget(cell))))
            }
            UnaryOp::Dereference => {
                let pointer_id = self.eval_value(operand)?;
                let target = self.heap.pointer(pointer_id)?.0.clone();
                let v = *target.borrow();
                Ok(Flow::Value(v))
            }
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience entry point: `interpret(program) -> Value`.
pub fn interpret(program: &Expr) -> Result<Value, RuntimeError> {
    log::trace!("starting tree-walking interpretation");
    Interpreter::new().interpret(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seen_parser::parse_program;

    fn run(src: &str) -> Value {
        let tokens = seen_lexer::lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        interpret(&parsed.program).expect("interpretation should succeed")
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
    fn pointer_write_through_is_observed() {
        assert_eq!(run("let x = 1; let p = &x; x = 2; return *p;"), 2);
    }

    #[test]
    fn struct_literal_fields_are_readable() {
        assert_eq!(run("let point = struct { x: 40, y: 2 }; return point.x + point.y;"), 42);
    }

    #[test]
    fn nested_block_shadowing_does_not_leak_out() {
        assert_eq!(run("let x = 1; if (1) { let x = 2; } return x;"), 1);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let tokens = seen_lexer::lex("return 1 / 0;", 0).tokens;
        let parsed = parse_program(tokens);
        assert_eq!(interpret(&parsed.program), Err(RuntimeError::DivisionByZero));
    }
}
