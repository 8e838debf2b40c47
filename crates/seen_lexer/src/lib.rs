//! Lexical analyzer for the language.
//!
//! The core toolchain (parser, checker, IR generator, optimizer, bytecode
//! interpreter) consumes a token stream from this crate but is otherwise
//! indifferent to how it was produced.

pub mod lexer;
pub mod token;

pub use lexer::{lex, LexOutcome};
pub use token::{Token, TokenType};
