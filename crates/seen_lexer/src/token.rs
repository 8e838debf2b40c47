//! Token definitions for the language.

use seen_common::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a lexical token. Carries its own payload (integer value,
/// identifier text) rather than pairing a bare tag with a separate text
/// slice — the parser never needs to re-lex a token to use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    IntegerLiteral(u64),
    Identifier(String),

    // Keywords
    KeywordLet,
    KeywordWhile,
    KeywordIf,
    KeywordElse,
    KeywordReturn,
    KeywordFn,
    KeywordStruct,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    Ampersand,
    PlusPlus,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,

    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenType::*;
        match self {
            IntegerLiteral(n) => write!(f, "{n}"),
            Identifier(name) => write!(f, "{name}"),
            KeywordLet => write!(f, "let"),
            KeywordWhile => write!(f, "while"),
            KeywordIf => write!(f, "if"),
            KeywordElse => write!(f, "else"),
            KeywordReturn => write!(f, "return"),
            KeywordFn => write!(f, "fn"),
            KeywordStruct => write!(f, "struct"),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Star => write!(f, "*"),
            Slash => write!(f, "/"),
            Percent => write!(f, "%"),
            Assign => write!(f, "="),
            Equal => write!(f, "=="),
            NotEqual => write!(f, "!="),
            Less => write!(f, "<"),
            LessEqual => write!(f, "<="),
            Greater => write!(f, ">"),
            GreaterEqual => write!(f, ">="),
            LogicalAnd => write!(f, "&&"),
            LogicalOr => write!(f, "||"),
            LogicalNot => write!(f, "!"),
            Ampersand => write!(f, "&"),
            PlusPlus => write!(f, "++"),
            LeftParen => write!(f, "("),
            RightParen => write!(f, ")"),
            LeftBrace => write!(f, "{{"),
            RightBrace => write!(f, "}}"),
            LeftBracket => write!(f, "["),
            RightBracket => write!(f, "]"),
            Semicolon => write!(f, ";"),
            Comma => write!(f, ","),
            Colon => write!(f, ":"),
            Dot => write!(f, "."),
            Eof => write!(f, "<eof>"),
        }
    }
}

/// A token paired with the source span it was scanned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenType,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenType, span: Span) -> Self {
        Self { kind, span }
    }
}
