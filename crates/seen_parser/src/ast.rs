//! Abstract syntax tree for the language.
//!
//! Every construct — including `Block`, `While`, and `FunctionDeclaration`
//! — is a variant of the same tagged `ExprKind` union, exactly as laid out
//! by the language's data model: a program is a tree of nodes, a parent
//! exclusively owns its children, and there are no back-edges. `Expr`
//! wraps a `Box<ExprKind>` plus its source `Span`; because the box already
//! provides the one level of indirection self-referential trees need,
//! `ExprKind`'s own fields hold `Expr` by value rather than `Box<Expr>`.

use seen_common::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: Box<ExprKind>,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind: Box::new(kind), span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprKind {
    Block(Vec<Expr>),
    Literal(u64),
    Variable(String),
    VariableDeclaration { name: String, init: Expr },
    Assignment { name: String, value: Expr },
    /// The operand is always a `Variable` — enforced by the parser.
    Increment(Expr),
    FunctionDeclaration { name: String, params: Vec<String>, body: Expr },
    FunctionCall { name: String, args: Vec<Expr> },
    Return(Expr),
    IfElse { condition: Expr, then_branch: Expr, else_branch: Expr },
    While { condition: Expr, body: Expr },
    Binary { op: BinaryOp, left: Expr, right: Expr },
    Unary { op: UnaryOp, operand: Expr },
    ArrayLiteral(Vec<Expr>),
    Index { array: Expr, index: Expr },
    IndexAssignment { array: Expr, index: Expr, value: Expr },
    StructLiteral(Vec<(String, Expr)>),
    FieldAccess { object: Expr, field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    /// Operators whose operands may be swapped without changing meaning;
    /// used by the IR generator to canonicalize a literal into the
    /// immediate slot.
    pub fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Multiply | BinaryOp::Equal | BinaryOp::NotEqual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    UnaryPlus,
    LogicalNot,
    AddressOf,
    Dereference,
}

/// Shortcut for building an empty `Block` used when an `else` branch is
/// absent, per the data model ("else-block (empty block if absent)").
pub fn empty_block(span: Span) -> Expr {
    Expr::new(ExprKind::Block(Vec::new()), span)
}
