//! Structural shapes.
//!
//! This is not a type system: there are no declared types, no inference
//! variables, no unification. A `Shape` is what the checker has managed
//! to observe about a value from how it was constructed, and two shapes
//! are compatible only if neither could ever be mistaken for the other.

use hashbrown::HashMap;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Nothing observed yet — a function parameter, for instance. Compatible
    /// with anything, since committing to more would be a guess.
    Unknown,
    /// An integer, or the result of an arithmetic/comparison/logical
    /// expression. Rough stand-in for "anything that isn't a struct or array".
    NonStruct,
    /// A literal `struct { a: .., b: .. }`, tagged with its field-name set.
    /// A set, not an order-sensitive vector: `struct { x: 1, y: 2 }` and
    /// `struct { y: 2, x: 1 }` are the same shape.
    StructLiteral { fields: BTreeSet<String> },
    Array,
    Function { params: usize },
}

impl Shape {
    pub fn label(&self) -> &'static str {
        match self {
            Shape::Unknown => "unknown",
            Shape::NonStruct => "value",
            Shape::StructLiteral { .. } => "struct",
            Shape::Array => "array",
            Shape::Function { .. } => "function",
        }
    }

    /// Two shapes disagree only when both are committed to something and
    /// that something differs — `Unknown` never conflicts.
    pub fn compatible_with(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Unknown, _) | (_, Shape::Unknown) => true,
            (Shape::NonStruct, Shape::NonStruct) => true,
            (Shape::Array, Shape::Array) => true,
            (Shape::Function { params: a }, Shape::Function { params: b }) => a == b,
            (Shape::StructLiteral { fields: a }, Shape::StructLiteral { fields: b }) => a == b,
            _ => false,
        }
    }
}

/// One lexical scope's variable bindings.
pub type ScopeFrame = HashMap<String, Shape>;
