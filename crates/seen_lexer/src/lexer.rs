//! Scanner turning source text into a token stream.

use crate::{Token, TokenType};
use seen_common::{Diagnostics, DiagnosticKind, Position, Span};

/// Result of lexing one source file: the tokens scanned (always ending in
/// `Eof`, even when diagnostics were collected) and any lexical
/// diagnostics. Mirrors the parser's policy of never stopping at the
/// first problem.
pub struct LexOutcome {
    pub tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    offset: u32,
    file_id: u32,
    tokens: Vec<Token>,
    diagnostics: Diagnostics,
}

const KEYWORDS: &[(&str, TokenType)] = &[
    ("let", TokenType::KeywordLet),
    ("while", TokenType::KeywordWhile),
    ("if", TokenType::KeywordIf),
    ("else", TokenType::KeywordElse),
    ("return", TokenType::KeywordReturn),
    ("fn", TokenType::KeywordFn),
    ("struct", TokenType::KeywordStruct),
];

/// Lex `input` (belonging to `file_id`, for multi-file `Span`s) into a
/// token stream, never aborting on a bad character.
pub fn lex(input: &str, file_id: u32) -> LexOutcome {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        offset: 0,
        file_id,
        tokens: Vec::new(),
        diagnostics: Diagnostics::new(),
    };
    lexer.run();
    log::trace!("lexed {} token(s), {} diagnostic(s)", lexer.tokens.len(), lexer.diagnostics.len());
    LexOutcome { tokens: lexer.tokens, diagnostics: lexer.diagnostics }
}

impl Lexer {
    fn run(&mut self) {
        loop {
            self.skip_whitespace_and_comments();
            let start = self.position();
            let Some(c) = self.peek() else {
                self.tokens.push(Token::new(TokenType::Eof, Span::single(start, self.file_id)));
                return;
            };
            if c.is_ascii_digit() {
                self.scan_number(start);
            } else if c.is_alphabetic() || c == '_' {
                self.scan_identifier(start);
            } else {
                self.scan_operator(start);
            }
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        self.offset += c.len_utf8() as u32;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn push(&mut self, kind: TokenType, start: Position) {
        let span = Span::new(start, self.position(), self.file_id);
        self.tokens.push(Token::new(kind, span));
    }

    fn scan_number(&mut self, start: Position) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match text.parse::<u64>() {
            Ok(value) => self.push(TokenType::IntegerLiteral(value), start),
            Err(_) => {
                let span = Span::new(start, self.position(), self.file_id);
                self.diagnostics.push(DiagnosticKind::InvalidNumericLiteral, span);
            }
        }
    }

    fn scan_identifier(&mut self, start: Position) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == text)
            .map(|(_, tok)| tok.clone())
            .unwrap_or(TokenType::Identifier(text));
        self.push(kind, start);
    }

    fn scan_operator(&mut self, start: Position) {
        let c = self.advance().unwrap();
        let kind = match c {
            '+' if self.peek() == Some('+') => {
                self.advance();
                TokenType::PlusPlus
            }
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Percent,
            '=' if self.peek() == Some('=') => {
                self.advance();
                TokenType::Equal
            }
            '=' => TokenType::Assign,
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenType::NotEqual
            }
            '!' => TokenType::LogicalNot,
            '<' if self.peek() == Some('=') => {
                self.advance();
                TokenType::LessEqual
            }
            '<' => TokenType::Less,
            '>' if self.peek() == Some('=') => {
                self.advance();
                TokenType::GreaterEqual
            }
            '>' => TokenType::Greater,
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenType::LogicalAnd
            }
            '&' => TokenType::Ampersand,
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenType::LogicalOr
            }
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            ';' => TokenType::Semicolon,
            ',' => TokenType::Comma,
            ':' => TokenType::Colon,
            '.' => TokenType::Dot,
            other => {
                let span = Span::new(start, self.position(), self.file_id);
                self.diagnostics.push(DiagnosticKind::UnexpectedChar { found: other }, span);
                return;
            }
        };
        self.push(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenType> {
        lex(src, 0).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = 1;"),
            vec![
                TokenType::KeywordLet,
                TokenType::Identifier("x".into()),
                TokenType::Assign,
                TokenType::IntegerLiteral(1),
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn lexes_two_char_operators_greedily() {
        assert_eq!(
            kinds("a <= b && c++"),
            vec![
                TokenType::Identifier("a".into()),
                TokenType::LessEqual,
                TokenType::Identifier("b".into()),
                TokenType::LogicalAnd,
                TokenType::Identifier("c".into()),
                TokenType::PlusPlus,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("1 // comment\n2"),
            vec![TokenType::IntegerLiteral(1), TokenType::IntegerLiteral(2), TokenType::Eof]
        );
    }

    #[test]
    fn reports_unexpected_char_and_keeps_scanning() {
        let out = lex("1 @ 2", 0);
        assert_eq!(out.diagnostics.len(), 1);
        let kinds: Vec<_> = out.tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenType::IntegerLiteral(1), TokenType::IntegerLiteral(2), TokenType::Eof]
        );
    }
}
