//! Structured diagnostics for the language toolchain.
//!
//! Every problem the lexer, parser, or semantic checker can report is a
//! `DiagnosticKind` discriminant, never an interpolated string — callers
//! (the CLI, tests) decide how to render a kind into text.

use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One diagnosed problem, tagged with the source span it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

/// The diagnostic taxonomy: lexical, syntactic, and semantic problems.
/// Runtime (fatal) problems are a separate type, `RuntimeError`, because
/// they abort an in-progress interpretation rather than accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    // --- Lexical ---
    UnexpectedChar { found: char },

    // --- Syntactic ---
    ExpectedSemicolon,
    ExpectedEquals,
    ExpectedOpeningParenthesis,
    ExpectedClosingParenthesis,
    ExpectedClosingSquareBracket,
    ExpectedBlockOpeningBrace,
    ExpectedBlockClosingBrace,
    ExpectedPrimaryExpression,
    ExpectedIdentifier,
    ExpectedVariable,
    ExpectedStructFieldName,
    ExpectedStructFieldColon,
    ExpectedStructLiteralBrace,
    ExpectedLetVariableName,
    ExpectedFunctionIdentifier,
    InvalidNumericLiteral,
    InvalidAssignmentTarget,
    ExpectedEndOfExpression,

    // --- Semantic ---
    UndefinedVariable { name: String },
    UndefinedFunction { name: String },
    WrongArgCount { name: String, expected: usize, got: usize },
    NotAStruct { name: String },
    UndefinedField { field: String },
    NotCallable { name: String, kind: &'static str },
    NotIndexable { name: String },
    TypeMismatch { name: String, expected: &'static str, got: &'static str },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DiagnosticKind::*;
        match self {
            UnexpectedChar { found } => write!(f, "unexpected character '{found}'"),
            ExpectedSemicolon => write!(f, "expected ';'"),
            ExpectedEquals => write!(f, "expected '='"),
            ExpectedOpeningParenthesis => write!(f, "expected '('"),
            ExpectedClosingParenthesis => write!(f, "expected ')'"),
            ExpectedClosingSquareBracket => write!(f, "expected ']'"),
            ExpectedBlockOpeningBrace => write!(f, "expected '{{'"),
            ExpectedBlockClosingBrace => write!(f, "expected '}}'"),
            ExpectedPrimaryExpression => write!(f, "expected an expression"),
            ExpectedIdentifier => write!(f, "expected an identifier"),
            ExpectedVariable => write!(f, "expected a variable"),
            ExpectedStructFieldName => write!(f, "expected a struct field name"),
            ExpectedStructFieldColon => write!(f, "expected ':' after struct field name"),
            ExpectedStructLiteralBrace => write!(f, "expected '{{' to open a struct literal"),
            ExpectedLetVariableName => write!(f, "expected a variable name after 'let'"),
            ExpectedFunctionIdentifier => write!(f, "expected a function name after 'fn'"),
            InvalidNumericLiteral => write!(f, "invalid numeric literal"),
            InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            ExpectedEndOfExpression => write!(f, "expected end of expression"),
            UndefinedVariable { name } => write!(f, "undefined variable '{name}'"),
            UndefinedFunction { name } => write!(f, "undefined function '{name}'"),
            WrongArgCount { name, expected, got } => write!(
                f,
                "function '{name}' expects {expected} argument(s), got {got}"
            ),
            NotAStruct { name } => write!(f, "'{name}' is not a struct"),
            UndefinedField { field } => write!(f, "undefined field '{field}'"),
            NotCallable { name, kind } => write!(f, "'{name}' is not callable (found {kind})"),
            NotIndexable { name } => write!(f, "'{name}' is not indexable"),
            TypeMismatch { name, expected, got } => write!(
                f,
                "cannot assign {got} to '{name}' which has shape {expected}"
            ),
        }
    }
}

/// An ordered collection of diagnostics accumulated during one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "error: {diagnostic}")?;
        }
        Ok(())
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: DiagnosticKind, span: Span) {
        self.messages.push(Diagnostic::new(kind, span));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.messages
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
