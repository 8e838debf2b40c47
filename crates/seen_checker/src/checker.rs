//! Structural shape checking.
//!
//! Two passes: first collect every function's signature so a call can
//! resolve a function declared later in the file, then walk the program
//! checking each expression against what it knows about its operands.

use crate::shape::{Shape, ScopeFrame};
use hashbrown::HashMap;
use seen_common::{DiagnosticKind, Diagnostics, SeenResult};
use seen_parser::{BinaryOp, Expr, ExprKind, UnaryOp};

pub struct Checker {
    scopes: Vec<ScopeFrame>,
    functions: HashMap<String, usize>,
    diagnostics: Diagnostics,
}

impl Checker {
    pub fn new() -> Self {
        Self { scopes: vec![ScopeFrame::new()], functions: HashMap::new(), diagnostics: Diagnostics::new() }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn check_program(&mut self, program: &Expr) -> SeenResult<()> {
        self.collect_functions(program);
        log::debug!("collected {} function signature(s)", self.functions.len());
        self.check_expr(program);
        Ok(())
    }

    // --- pass 1: signatures ---

    fn collect_functions(&mut self, expr: &Expr) {
        match &*expr.kind {
            ExprKind::FunctionDeclaration { name, params, body } => {
                self.functions.insert(name.clone(), params.len());
                self.collect_functions(body);
            }
            ExprKind::Block(stmts) => stmts.iter().for_each(|s| self.collect_functions(s)),
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

    // --- pass 2: shape checking ---

    fn push_scope(&mut self) {
        self.scopes.push(ScopeFrame::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: String, shape: Shape) {
        self.scopes.last_mut().expect("at least one scope is always active").insert(name, shape);
    }

    fn lookup(&self, name: &str) -> Option<&Shape> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Update an existing binding's shape, narrowing `Unknown` toward
    /// whatever was just assigned to it.
    fn assign(&mut self, name: &str, shape: Shape) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = shape;
                return;
            }
        }
    }

    fn expr_name(expr: &Expr) -> String {
        match &*expr.kind {
            ExprKind::Variable(name) => name.clone(),
            _ => "<expression>".to_string(),
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Shape {
        match &*expr.kind {
            ExprKind::Literal(_) => Shape::NonStruct,

            ExprKind::Variable(name) => match self.lookup(name) {
                Some(shape) => shape.clone(),
                None => {
                    self.diagnostics.push(DiagnosticKind::UndefinedVariable { name: name.clone() }, expr.span);
                    Shape::Unknown
                }
            },

            ExprKind::VariableDeclaration { name, init } => {
                let shape = self.check_expr(init);
                self.define(name.clone(), shape);
                Shape::Unknown
            }

            ExprKind::Assignment { name, value } => {
                let value_shape = self.check_expr(value);
                match self.lookup(name).cloned() {
                    None => {
                        self.diagnostics.push(DiagnosticKind::UndefinedVariable { name: name.clone() }, expr.span);
                    }
                    Some(existing) if !existing.compatible_with(&value_shape) => {
                        self.diagnostics.push(
                            DiagnosticKind::TypeMismatch {
                                name: name.clone(),
                                expected: existing.label(),
                                got: value_shape.label(),
                            },
                            expr.span,
                        );
                    }
                    Some(_) => self.assign(name, value_shape.clone()),
                }
                value_shape
            }

            ExprKind::Increment(inner) => {
                let shape = self.check_expr(inner);
                if !shape.compatible_with(&Shape::NonStruct) {
                    self.diagnostics.push(
                        DiagnosticKind::TypeMismatch {
                            name: Self::expr_name(inner),
                            expected: "value",
                            got: shape.label(),
                        },
                        expr.span,
                    );
                }
                Shape::NonStruct
            }

            ExprKind::FunctionDeclaration { name, params, body } => {
                let saved_scopes = std::mem::replace(&mut self.scopes, vec![ScopeFrame::new()]);
                for param in params {
                    self.define(param.clone(), Shape::Unknown);
                }
                self.check_expr(body);
                self.scopes = saved_scopes;
                let shape = Shape::Function { params: params.len() };
                self.define(name.clone(), shape.clone());
                shape
            }

            ExprKind::FunctionCall { name, args } => {
                for arg in args {
                    self.check_expr(arg);
                }
                match self.functions.get(name).copied() {
                    Some(expected) if expected != args.len() => {
                        self.diagnostics.push(
                            DiagnosticKind::WrongArgCount { name: name.clone(), expected, got: args.len() },
                            expr.span,
                        );
                    }
                    Some(_) => {}
                    None => match self.lookup(name).cloned() {
                        Some(shape) if !matches!(shape, Shape::Function { .. } | Shape::Unknown) => {
                            self.diagnostics.push(
                                DiagnosticKind::NotCallable { name: name.clone(), kind: shape.label() },
                                expr.span,
                            );
                        }
                        _ => {
                            self.diagnostics
                                .push(DiagnosticKind::UndefinedFunction { name: name.clone() }, expr.span);
                        }
                    },
                }
                Shape::Unknown
            }

            ExprKind::Return(value) => {
                self.check_expr(value);
                Shape::Unknown
            }

            ExprKind::IfElse { condition, then_branch, else_branch } => {
                self.check_expr(condition);
                self.push_scope();
                self.check_expr(then_branch);
                self.pop_scope();
                self.push_scope();
                self.check_expr(else_branch);
                self.pop_scope();
                Shape::Unknown
            }

            ExprKind::While { condition, body } => {
                self.check_expr(condition);
                self.push_scope();
                self.check_expr(body);
                self.pop_scope();
                Shape::Unknown
            }

            ExprKind::Binary { op, left, right } => {
                let left_shape = self.check_expr(left);
                let right_shape = self.check_expr(right);
                if matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) {
                    return Shape::NonStruct;
                }
                for (shape, operand) in [(&left_shape, left.as_ref()), (&right_shape, right.as_ref())] {
                    if !shape.compatible_with(&Shape::NonStruct) {
                        self.diagnostics.push(
                            DiagnosticKind::TypeMismatch {
                                name: Self::expr_name(operand),
                                expected: "value",
                                got: shape.label(),
                            },
                            expr.span,
                        );
                    }
                }
                Shape::NonStruct
            }

            ExprKind::Unary { op, operand } => {
                let shape = self.check_expr(operand);
                match op {
                    UnaryOp::AddressOf | UnaryOp::Dereference => Shape::NonStruct,
                    _ => {
                        if !shape.compatible_with(&Shape::NonStruct) {
                            self.diagnostics.push(
                                DiagnosticKind::TypeMismatch {
                                    name: Self::expr_name(operand),
                                    expected: "value",
                                    got: shape.label(),
                                },
                                expr.span,
                            );
                        }
                        Shape::NonStruct
                    }
                }
            }

            ExprKind::ArrayLiteral(elements) => {
                for element in elements {
                    self.check_expr(element);
                }
                Shape::Array
            }

            ExprKind::Index { array, index } => {
                let array_shape = self.check_expr(array);
                self.check_expr(index);
                if !array_shape.compatible_with(&Shape::Array) {
                    self.diagnostics.push(
                        DiagnosticKind::NotIndexable { name: Self::expr_name(array) },
                        expr.span,
                    );
                }
                Shape::Unknown
            }

            ExprKind::IndexAssignment { array, index, value } => {
                let array_shape = self.check_expr(array);
                self.check_expr(index);
                let value_shape = self.check_expr(value);
                if !array_shape.compatible_with(&Shape::Array) {
                    self.diagnostics.push(
                        DiagnosticKind::NotIndexable { name: Self::expr_name(array) },
                        expr.span,
                    );
                }
                value_shape
            }

            ExprKind::StructLiteral(fields) => {
                let mut field_names = std::collections::BTreeSet::new();
                for (name, value) in fields {
                    self.check_expr(value);
                    field_names.insert(name.clone());
                }
                Shape::StructLiteral { fields: field_names }
            }

            ExprKind::FieldAccess { object, field } => {
                let object_shape = self.check_expr(object);
                match object_shape {
                    Shape::StructLiteral { fields } if fields.iter().any(|f| f == field) => Shape::Unknown,
                    Shape::StructLiteral { .. } => {
                        self.diagnostics.push(DiagnosticKind::UndefinedField { field: field.clone() }, expr.span);
                        Shape::Unknown
                    }
                    Shape::Unknown => Shape::Unknown,
                    other => {
                        self.diagnostics.push(
                            DiagnosticKind::NotAStruct { name: Self::expr_name(object) },
                            expr.span,
                        );
                        let _ = other;
                        Shape::Unknown
                    }
                }
            }

            ExprKind::Block(statements) => {
                self.push_scope();
                for statement in statements {
                    self.check_expr(statement);
                }
                self.pop_scope();
                Shape::Unknown
            }
        }
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seen_lexer::lex;
    use seen_parser::parse_program;

    fn check(src: &str) -> Diagnostics {
        let tokens = lex(src, 0).tokens;
        let parsed = parse_program(tokens);
        assert!(parsed.diagnostics.is_empty());
        let mut checker = Checker::new();
        checker.check_program(&parsed.program).unwrap();
        checker.diagnostics
    }

    #[test]
    fn flags_undefined_variable() {
        let diags = check("return x;");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn resolves_forward_referenced_function() {
        let diags = check("fn main() { return helper(1); } fn helper(a) { return a; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn flags_wrong_arg_count() {
        let diags = check("fn add(a, b) { return a + b; } fn main() { return add(1); }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn flags_indexing_a_struct() {
        let diags = check("let s = struct { x: 1 }; return s[0];");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn flags_undefined_field() {
        let diags = check("let s = struct { x: 1 }; return s.y;");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn function_bodies_do_not_capture_outer_scope() {
        let diags = check("let x = 1; fn f() { return x; }");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn calling_a_non_function_variable_reports_not_callable() {
        let diags = check("let x = 1; return x();");
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags.iter().next().unwrap().kind, DiagnosticKind::NotCallable { .. }));
    }

    #[test]
    fn struct_shape_compatibility_ignores_field_order() {
        let diags = check("let a = struct { x: 1, y: 2 }; a = struct { y: 3, x: 4 };");
        assert!(diags.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn struct_shape_compatibility_ignores_field_order_for_any_permutation(
            field_count in 2usize..=5,
            literals in proptest::collection::vec(0u64..100, 5),
            shuffle_keys in proptest::collection::vec(proptest::prelude::any::<u32>(), 5),
        ) {
            let names = ["a", "b", "c", "d", "e"];
            let order_a: Vec<usize> = (0..field_count).collect();
            let mut order_b = order_a.clone();
            order_b.sort_by_key(|&i| shuffle_keys[i]);

            let literal_fields = |order: &[usize]| {
                order.iter().map(|&i| format!("{}: {}", names[i], literals[i])).collect::<Vec<_>>().join(", ")
            };
            let src = format!(
                "let s = struct {{ {} }}; s = struct {{ {} }};",
                literal_fields(&order_a),
                literal_fields(&order_b),
            );
            let diags = check(&src);
            proptest::prop_assert!(diags.is_empty(), "{:?}: {}", diags, src);
        }
    }
}
