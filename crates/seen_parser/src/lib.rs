//! AST definitions and recursive-descent parser for the language.
//!
//! Operator precedence climbing, multi-error recovery via placeholder
//! substitution and resynchronization, exposed through
//! `parse_program`/`parse_expression`.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{parse_expression, parse_program, ParseOutcome};
