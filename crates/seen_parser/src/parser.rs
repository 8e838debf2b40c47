//! Recursive-descent parser with precedence climbing.
//!
//! Errors are structural `DiagnosticKind` values, never strings. On error
//! the parser substitutes a safe `Literal(0)` placeholder and
//! resynchronizes to the next `;`, `}`, or end of input, so a single
//! invocation reports every syntactic problem it finds rather than
//! stopping at the first one.

use crate::ast::{empty_block, BinaryOp, Expr, ExprKind, UnaryOp};
use seen_common::{DiagnosticKind, Diagnostics, Span};
use seen_lexer::{Token, TokenType};

pub struct ParseOutcome {
    pub program: Expr,
    pub diagnostics: Diagnostics,
}

/// Parses a full program: a top-level `Block` of statements.
pub fn parse_program(tokens: Vec<Token>) -> ParseOutcome {
    let mut parser = Parser::new(tokens);
    let program = parser.program();
    log::trace!("parsed program, {} diagnostic(s)", parser.diagnostics.len());
    ParseOutcome { program, diagnostics: parser.diagnostics }
}

/// Parses a single standalone expression (used by the REPL).
pub fn parse_expression(tokens: Vec<Token>) -> ParseOutcome {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_expr();
    ParseOutcome { program, diagnostics: parser.diagnostics }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Diagnostics,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, diagnostics: Diagnostics::new() }
    }

    // --- token stream primitives ---

    fn peek(&self) -> &TokenType {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenType::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenType) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: TokenType) -> bool {
        if self.check(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenType, err: DiagnosticKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.diagnostics.push(err, self.peek_span());
            false
        }
    }

    fn expect_identifier(&mut self) -> Option<String> {
        if let TokenType::Identifier(name) = self.peek().clone() {
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    /// Record a diagnostic, skip tokens up to and including the next
    /// `;` (stopping without consuming at `}` or end of input), and
    /// return a placeholder node so surrounding construction can continue.
    fn error_and_sync(&mut self, err: DiagnosticKind, span: Span) -> Expr {
        self.diagnostics.push(err, span);
        loop {
            match self.peek() {
                TokenType::Eof | TokenType::RightBrace => break,
                TokenType::Semicolon => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        Expr::new(ExprKind::Literal(0), span)
    }

    // --- statements ---

    fn program(&mut self) -> Expr {
        let start = self.peek_span();
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.parse_statement());
        }
        let span = start.combine(self.peek_span());
        Expr::new(ExprKind::Block(statements), span)
    }

    fn parse_block(&mut self) -> Expr {
        let start = self.peek_span();
        if !self.expect(TokenType::LeftBrace, DiagnosticKind::ExpectedBlockOpeningBrace) {
            return Expr::new(ExprKind::Block(Vec::new()), start);
        }
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.at_eof() {
            statements.push(self.parse_statement());
        }
        let end = self.peek_span();
        self.expect(TokenType::RightBrace, DiagnosticKind::ExpectedBlockClosingBrace);
        Expr::new(ExprKind::Block(statements), start.combine(end))
    }

    fn parse_statement(&mut self) -> Expr {
        match self.peek() {
            TokenType::KeywordLet => self.parse_let(),
            TokenType::KeywordFn => self.parse_fn_declaration(),
            TokenType::KeywordIf => self.parse_if(),
            TokenType::KeywordWhile => self.parse_while(),
            TokenType::KeywordReturn => self.parse_return(),
            TokenType::LeftBrace => self.parse_block(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let(&mut self) -> Expr {
        let start = self.advance().span; // 'let'
        let Some(name) = self.expect_identifier() else {
            return self.error_and_sync(DiagnosticKind::ExpectedLetVariableName, self.peek_span());
        };
        self.expect(TokenType::Assign, DiagnosticKind::ExpectedEquals);
        let init = self.parse_expr();
        let end = self.peek_span();
        self.expect(TokenType::Semicolon, DiagnosticKind::ExpectedSemicolon);
        Expr::new(ExprKind::VariableDeclaration { name, init }, start.combine(end))
    }

    fn parse_fn_declaration(&mut self) -> Expr {
        let start = self.advance().span; // 'fn'
        let Some(name) = self.expect_identifier() else {
            return self.error_and_sync(DiagnosticKind::ExpectedFunctionIdentifier, self.peek_span());
        };
        self.expect(TokenType::LeftParen, DiagnosticKind::ExpectedOpeningParenthesis);
        let mut params = Vec::new();
        while !self.check(&TokenType::RightParen) && !self.at_eof() {
            match self.expect_identifier() {
                Some(param) => params.push(param),
                None => {
                    self.diagnostics.push(DiagnosticKind::ExpectedIdentifier, self.peek_span());
                    break;
                }
            }
            if !self.eat(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RightParen, DiagnosticKind::ExpectedClosingParenthesis);
        let body = self.parse_block();
        let span = start.combine(body.span);
        Expr::new(ExprKind::FunctionDeclaration { name, params, body }, span)
    }

    fn parse_if(&mut self) -> Expr {
        let start = self.advance().span; // 'if'
        self.expect(TokenType::LeftParen, DiagnosticKind::ExpectedOpeningParenthesis);
        let condition = self.parse_expr();
        self.expect(TokenType::RightParen, DiagnosticKind::ExpectedClosingParenthesis);
        let then_branch = self.parse_block();
        let else_branch = if self.eat(TokenType::KeywordElse) {
            if self.check(&TokenType::KeywordIf) {
                self.parse_if()
            } else {
                self.parse_block()
            }
        } else {
            empty_block(then_branch.span)
        };
        let span = start.combine(else_branch.span);
        Expr::new(ExprKind::IfElse { condition, then_branch, else_branch }, span)
    }

    fn parse_while(&mut self) -> Expr {
        let start = self.advance().span; // 'while'
        self.expect(TokenType::LeftParen, DiagnosticKind::ExpectedOpeningParenthesis);
        let condition = self.parse_expr();
        self.expect(TokenType::RightParen, DiagnosticKind::ExpectedClosingParenthesis);
        let body = self.parse_block();
        let span = start.combine(body.span);
        Expr::new(ExprKind::While { condition, body }, span)
    }

    fn parse_return(&mut self) -> Expr {
        let start = self.advance().span; // 'return'
        let value = if self.check(&TokenType::Semicolon) {
            Expr::new(ExprKind::Literal(0), start)
        } else {
            self.parse_expr()
        };
        let end = self.peek_span();
        self.expect(TokenType::Semicolon, DiagnosticKind::ExpectedSemicolon);
        Expr::new(ExprKind::Return(value), start.combine(end))
    }

    fn parse_expression_statement(&mut self) -> Expr {
        let expr = self.parse_expr();
        let end = self.peek_span();
        self.expect(TokenType::Semicolon, DiagnosticKind::ExpectedSemicolon);
        let span = expr.span.combine(end);
        Expr::new(*expr.kind, span)
    }

    // --- expressions ---

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let left = self.parse_logical_or();
        if self.check(&TokenType::Assign) {
            self.advance();
            let value = self.parse_assignment();
            let span = left.span.combine(value.span);
            return match *left.kind {
                ExprKind::Variable(name) => Expr::new(ExprKind::Assignment { name, value }, span),
                ExprKind::Index { array, index } => {
                    Expr::new(ExprKind::IndexAssignment { array, index, value }, span)
                }
                _ => {
                    self.diagnostics.push(DiagnosticKind::InvalidAssignmentTarget, span);
                    Expr::new(ExprKind::Literal(0), span)
                }
            };
        }
        left
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut left = self.parse_logical_and();
        while self.check(&TokenType::LogicalOr) {
            self.advance();
            let right = self.parse_logical_and();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op: BinaryOp::LogicalOr, left, right }, span);
        }
        left
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.check(&TokenType::LogicalAnd) {
            self.advance();
            let right = self.parse_equality();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op: BinaryOp::LogicalAnd, left, right }, span);
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        loop {
            let op = match self.peek() {
                TokenType::Equal => BinaryOp::Equal,
                TokenType::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op, left, right }, span);
        }
        left
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            let op = match self.peek() {
                TokenType::Less => BinaryOp::LessThan,
                TokenType::Greater => BinaryOp::GreaterThan,
                TokenType::LessEqual => BinaryOp::LessThanOrEqual,
                TokenType::GreaterEqual => BinaryOp::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op, left, right }, span);
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek() {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op, left, right }, span);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek() {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                TokenType::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary();
            let span = left.span.combine(right.span);
            left = Expr::new(ExprKind::Binary { op, left, right }, span);
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.peek() {
            TokenType::Minus => Some(UnaryOp::Negate),
            TokenType::Plus => Some(UnaryOp::UnaryPlus),
            TokenType::LogicalNot => Some(UnaryOp::LogicalNot),
            TokenType::Ampersand => Some(UnaryOp::AddressOf),
            TokenType::Star => Some(UnaryOp::Dereference),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.parse_unary();
            let span = start.combine(operand.span);
            Expr::new(ExprKind::Unary { op, operand }, span)
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek() {
                TokenType::LeftBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    let end = self.peek_span();
                    self.expect(TokenType::RightBracket, DiagnosticKind::ExpectedClosingSquareBracket);
                    let span = expr.span.combine(end);
                    expr = Expr::new(ExprKind::Index { array: expr, index }, span);
                }
                TokenType::Dot => {
                    self.advance();
                    match self.expect_identifier() {
                        Some(field) => {
                            let span = expr.span.combine(self.previous_span());
                            expr = Expr::new(ExprKind::FieldAccess { object: expr, field }, span);
                        }
                        None => {
                            self.diagnostics.push(DiagnosticKind::ExpectedIdentifier, self.peek_span());
                            break;
                        }
                    }
                }
                TokenType::PlusPlus => {
                    let pp_span = self.advance().span;
                    if matches!(*expr.kind, ExprKind::Variable(_)) {
                        let span = expr.span.combine(pp_span);
                        expr = Expr::new(ExprKind::Increment(expr), span);
                    } else {
                        self.diagnostics.push(DiagnosticKind::ExpectedVariable, expr.span);
                    }
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenType::IntegerLiteral(value) => {
                self.advance();
                Expr::new(ExprKind::Literal(value), span)
            }
            TokenType::Identifier(name) => {
                self.advance();
                if self.check(&TokenType::LeftParen) {
                    self.advance();
                    let args = self.parse_call_arguments();
                    let end = self.peek_span();
                    self.expect(TokenType::RightParen, DiagnosticKind::ExpectedClosingParenthesis);
                    Expr::new(ExprKind::FunctionCall { name, args }, span.combine(end))
                } else {
                    Expr::new(ExprKind::Variable(name), span)
                }
            }
            TokenType::LeftParen => {
                self.advance();
                let mut inner = self.parse_expr();
                let end = self.peek_span();
                self.expect(TokenType::RightParen, DiagnosticKind::ExpectedClosingParenthesis);
                inner.span = span.combine(end);
                inner
            }
            TokenType::LeftBracket => {
                self.advance();
                let elements = self.parse_array_elements();
                let end = self.peek_span();
                self.expect(TokenType::RightBracket, DiagnosticKind::ExpectedClosingSquareBracket);
                Expr::new(ExprKind::ArrayLiteral(elements), span.combine(end))
            }
            TokenType::KeywordStruct => self.parse_struct_literal(span),
            _ => self.error_and_sync(DiagnosticKind::ExpectedPrimaryExpression, span),
        }
    }

    fn parse_call_arguments(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        while !self.check(&TokenType::RightParen) && !self.at_eof() {
            args.push(self.parse_expr());
            if !self.eat(TokenType::Comma) {
                break;
            }
        }
        args
    }

    fn parse_array_elements(&mut self) -> Vec<Expr> {
        let mut elements = Vec::new();
        while !self.check(&TokenType::RightBracket) && !self.at_eof() {
            elements.push(self.parse_expr());
            if !self.eat(TokenType::Comma) {
                break;
            }
        }
        elements
    }

    fn parse_struct_literal(&mut self, start: Span) -> Expr {
        self.advance(); // 'struct'
        if !self.expect(TokenType::LeftBrace, DiagnosticKind::ExpectedStructLiteralBrace) {
            return Expr::new(ExprKind::StructLiteral(Vec::new()), start);
        }
        let mut fields = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.at_eof() {
            let Some(name) = self.expect_identifier() else {
                self.diagnostics.push(DiagnosticKind::ExpectedStructFieldName, self.peek_span());
                break;
            };
            self.expect(TokenType::Colon, DiagnosticKind::ExpectedStructFieldColon);
            let value = self.parse_expr();
            fields.push((name, value));
            if !self.eat(TokenType::Comma) {
                break;
            }
        }
        let end = self.peek_span();
        self.expect(TokenType::RightBrace, DiagnosticKind::ExpectedBlockClosingBrace);
        Expr::new(ExprKind::StructLiteral(fields), start.combine(end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seen_lexer::lex;

    fn parse(src: &str) -> ParseOutcome {
        let lexed = lex(src, 0);
        assert!(lexed.diagnostics.is_empty(), "unexpected lex errors");
        parse_program(lexed.tokens)
    }

    #[test]
    fn parses_let_and_while() {
        let out = parse("let i = 0; while (i < 10) { i++; } return i;");
        assert!(out.diagnostics.is_empty());
        match *out.program.kind {
            ExprKind::Block(ref stmts) => assert_eq!(stmts.len(), 3),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn assignment_is_right_associative_and_binds_loosely() {
        let out = parse("x = y = 1;");
        assert!(out.diagnostics.is_empty());
        let ExprKind::Block(stmts) = *out.program.kind else { panic!("expected block") };
        match *stmts[0].kind.clone() {
            ExprKind::Assignment { name, value } => {
                assert_eq!(name, "x");
                assert!(matches!(*value.kind, ExprKind::Assignment { .. }));
            }
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn reports_multiple_errors_in_one_pass() {
        let out = parse("let = 1; let y 2;");
        assert!(out.diagnostics.len() >= 2);
    }

    #[test]
    fn struct_literal_and_field_access() {
        let out = parse("return (struct { x: 40, y: 2 }).x;");
        assert!(out.diagnostics.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn assignment_right_associativity_holds_at_any_chain_depth(depth in 2usize..10, literal in 0u64..1000) {
            let names: Vec<String> = (0..depth).map(|i| format!("v{i}")).collect();
            let src = format!("{} = {};", names.join(" = "), literal);
            let out = parse(&src);
            proptest::prop_assert!(out.diagnostics.is_empty());
            let ExprKind::Block(stmts) = *out.program.kind else {
                return Err(proptest::test_runner::TestCaseError::fail("expected block"));
            };
            let mut current = stmts[0].kind.clone();
            for name in &names {
                match *current {
                    ExprKind::Assignment { name: bound, value } => {
                        proptest::prop_assert_eq!(&bound, name);
                        current = value.kind;
                    }
                    _ => return Err(proptest::test_runner::TestCaseError::fail("expected nested assignment chain")),
                }
            }
            proptest::prop_assert!(matches!(*current, ExprKind::Literal(v) if v == literal));
        }
    }
}
