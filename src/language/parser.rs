use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{TemplatePart, Token, TokenKind},
};
use std::rc::Rc;

/// Deepest expression or block nesting a script may use.
pub const MAX_NESTING: usize = 128;

pub fn parse_program(source: &str) -> Result<Program, SyntaxErrors> {
    let tokens = lex_tokens(source, 0)?;
    Parser::new(tokens).parse()
}

fn lex_tokens(source: &str, base: usize) -> Result<Vec<Token>, SyntaxErrors> {
    match lex(source) {
        Ok(mut tokens) => {
            if base > 0 {
                for token in &mut tokens {
                    token.span = Span::new(token.span.start + base, token.span.end + base);
                }
            }
            Ok(tokens)
        }
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| {
                    SyntaxError::new(
                        err.message,
                        Span::new(err.span.start + base, err.span.end + base),
                    )
                })
                .collect();
            Err(SyntaxErrors::new(errs))
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    last_span: Option<Span>,
    depth: usize,
}

enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_span: None,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Program, SyntaxErrors> {
        let mut statements = Vec::new();

        while !self.is_eof() {
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(err) => {
                    self.report(err);
                    self.depth = 0;
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Program { statements })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        self.enter()?;
        let statement = self.parse_statement_inner();
        self.depth -= 1;
        statement
    }

    fn parse_statement_inner(&mut self) -> Result<Statement, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Semi) => {
                self.advance();
                Ok(Statement::Empty)
            }
            Some(TokenKind::LBrace) => self.parse_block().map(Statement::Block),
            Some(TokenKind::Function) => {
                self.advance();
                if !matches!(self.peek_kind(), Some(TokenKind::Identifier(_))) {
                    return Err(self
                        .error_here("Expected function name")
                        .with_help("anonymous functions must be assigned or passed as values"));
                }
                self.parse_function_rest().map(Statement::Function)
            }
            Some(TokenKind::Let | TokenKind::Const | TokenKind::Var) => {
                let decl = self.parse_declaration()?;
                self.consume_statement_end()?;
                Ok(Statement::Decl(decl))
            }
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While(WhileStmt { condition, body }))
            }
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Break) => {
                let span = self.advance().span;
                self.consume_statement_end()?;
                Ok(Statement::Break(span))
            }
            Some(TokenKind::Continue) => {
                let span = self.advance().span;
                self.consume_statement_end()?;
                Ok(Statement::Continue(span))
            }
            Some(TokenKind::Throw) => {
                let start = self.advance().span.start;
                if self.current_newline_before() {
                    return Err(self.error_here("Illegal newline after throw"));
                }
                let value = self.parse_expression()?;
                let span = Span::new(start, self.last_span_end(start));
                self.consume_statement_end()?;
                Ok(Statement::Throw(ThrowStmt { value, span }))
            }
            Some(TokenKind::Try) => self.parse_try(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_statement_end()?;
                Ok(Statement::Expr(expr))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    /// Parses `name(params) { body }` after the `function` keyword.
    fn parse_function_rest(&mut self) -> Result<Rc<FunctionDef>, SyntaxError> {
        let start = self.last_span.map(|span| span.start).unwrap_or(0);
        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            is_arrow: false,
            span: Span::new(start, self.last_span_end(start)),
        }))
    }

    /// Parses a parameter list; the opening paren is already consumed.
    fn parse_params(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("Expected parameter name")?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_declaration(&mut self) -> Result<DeclStmt, SyntaxError> {
        let kind = match self.advance().kind {
            TokenKind::Const => DeclKind::Const,
            TokenKind::Var => DeclKind::Var,
            _ => DeclKind::Let,
        };
        let mut declarators = Vec::new();
        loop {
            let start = self.current_span_start();
            let name = self.expect_identifier("Expected binding name")?;
            let value = if self.matches(TokenKind::Eq) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && value.is_none() {
                return Err(SyntaxError::new(
                    format!("Missing initializer in const declaration `{name}`"),
                    Span::new(start, self.last_span_end(start)),
                ));
            }
            declarators.push(Declarator {
                name,
                value,
                span: Span::new(start, self.last_span_end(start)),
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(DeclStmt { kind, declarators })
    }

    fn parse_return(&mut self) -> Result<Statement, SyntaxError> {
        let start = self.advance().span.start;
        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let span = Span::new(start, self.last_span_end(start));
        self.consume_statement_end()?;
        Ok(Statement::Return(ReturnStmt { value, span }))
    }

    fn parse_if(&mut self) -> Result<Statement, SyntaxError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStmt {
            condition,
            then_branch,
            else_branch,
        }))
    }

    fn parse_for(&mut self) -> Result<Statement, SyntaxError> {
        self.advance();
        self.expect(TokenKind::LParen)?;

        let is_for_of = matches!(
            self.peek_kind(),
            Some(TokenKind::Let | TokenKind::Const | TokenKind::Var)
        ) && matches!(self.peek_kind_n(1), Some(TokenKind::Identifier(_)))
            && self.peek_kind_n(2) == Some(TokenKind::Of);

        if is_for_of {
            let kind = match self.advance().kind {
                TokenKind::Const => DeclKind::Const,
                TokenKind::Var => DeclKind::Var,
                _ => DeclKind::Let,
            };
            let binding = self.expect_identifier("Expected loop binding")?;
            self.expect(TokenKind::Of)?;
            let iterable = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Statement::ForOf(ForOfStmt {
                kind,
                binding,
                iterable,
                body,
            }));
        }

        let init = match self.peek_kind() {
            Some(TokenKind::Semi) => None,
            Some(TokenKind::Let | TokenKind::Const | TokenKind::Var) => {
                Some(Box::new(Statement::Decl(self.parse_declaration()?)))
            }
            _ => Some(Box::new(Statement::Expr(self.parse_expression()?))),
        };
        self.expect(TokenKind::Semi)?;
        let condition = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semi)?;
        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For(ForStmt {
            init,
            condition,
            update,
            body,
        }))
    }

    fn parse_try(&mut self) -> Result<Statement, SyntaxError> {
        self.advance();
        let body = self.parse_block()?;
        let mut catch_binding = None;
        let mut catch_body = None;
        let mut finally_body = None;
        if self.matches(TokenKind::Catch) {
            if self.matches(TokenKind::LParen) {
                catch_binding = Some(self.expect_identifier("Expected catch binding")?);
                self.expect(TokenKind::RParen)?;
            }
            catch_body = Some(self.parse_block()?);
        }
        if self.matches(TokenKind::Finally) {
            finally_body = Some(self.parse_block()?);
        }
        if catch_body.is_none() && finally_body.is_none() {
            return Err(self.error_here("Missing catch or finally after try"));
        }
        Ok(Statement::Try(TryStmt {
            body,
            catch_binding,
            catch_body,
            finally_body,
        }))
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let expr = self.parse_assignment_inner();
        self.depth -= 1;
        expr
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_arrow_start() {
            return self.parse_arrow();
        }

        let start = self.current_span_start();
        let target = self.parse_conditional()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => None,
            Some(TokenKind::PlusEq) => Some(BinaryOp::Add),
            Some(TokenKind::MinusEq) => Some(BinaryOp::Sub),
            Some(TokenKind::StarEq) => Some(BinaryOp::Mul),
            Some(TokenKind::SlashEq) => Some(BinaryOp::Div),
            Some(TokenKind::PercentEq) => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };
        if !matches!(
            target,
            Expr::Identifier(..) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(SyntaxError::new("Invalid assignment target", target.span()));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target: Box::new(target),
            op,
            value: Box::new(value),
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn is_arrow_start(&self) -> bool {
        match self.peek_kind() {
            Some(TokenKind::Identifier(_)) => self.peek_kind_n(1) == Some(TokenKind::FatArrow),
            Some(TokenKind::LParen) => {
                let mut depth = 0usize;
                for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
                    match token.kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_kind_n(offset + 1) == Some(TokenKind::FatArrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let params = if self.matches(TokenKind::LParen) {
            self.parse_params()?
        } else {
            vec![self.expect_identifier("Expected parameter name")?]
        };
        self.expect(TokenKind::FatArrow)?;
        let body = if self.check(TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
            span: Span::new(start, self.last_span_end(start)),
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let condition = self.parse_binary(1)?;
        if !self.matches(TokenKind::Question) {
            return Ok(condition);
        }
        let then_expr = self.parse_assignment()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_assignment()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        while let Some((op, prec)) = self.current_infix_op() {
            if prec < min_prec {
                break;
            }
            // Each operator in a chain nests the left operand one level deeper.
            self.enter()?;
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = Span::new(start, self.last_span_end(start));
            left = match op {
                InfixOp::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                },
                InfixOp::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                },
            };
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::TypeOf) => UnaryOp::TypeOf,
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                self.enter()?;
                let target = self.parse_unary()?;
                self.depth -= 1;
                self.ensure_update_target(&target)?;
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                    span: Span::new(start, self.last_span_end(start)),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let expr = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let expr = self.parse_call()?;
        let op = match self.peek_kind() {
            Some(TokenKind::PlusPlus) if !self.current_newline_before() => UpdateOp::Increment,
            Some(TokenKind::MinusMinus) if !self.current_newline_before() => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.ensure_update_target(&expr)?;
        self.advance();
        Ok(Expr::Update {
            op,
            prefix: false,
            target: Box::new(expr),
            span: Span::new(start, self.last_span_end(start)),
        })
    }

    fn ensure_update_target(&self, target: &Expr) -> Result<(), SyntaxError> {
        if matches!(
            target,
            Expr::Identifier(..) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            Ok(())
        } else {
            Err(SyntaxError::new(
                "Invalid left-hand side in update expression",
                target.span(),
            ))
        }
    }

    fn parse_call(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.current_span_start();
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(
                self.peek_kind(),
                Some(TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen)
            ) {
                self.enter()?;
            }
            if self.matches(TokenKind::Dot) {
                let property = self.expect_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    span: Span::new(start, self.last_span_end(start)),
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span: Span::new(start, self.last_span_end(start)),
                };
            } else if self.check(TokenKind::LParen) && !self.current_newline_before() {
                self.advance();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.matches(TokenKind::Comma) || self.check(TokenKind::RParen) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: Span::new(start, self.last_span_end(start)),
                };
            } else {
                break;
            }
        }
        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek_token();
        let span = token.span;
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(value), span))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(value), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null, span))
            }
            TokenKind::Undefined => {
                self.advance();
                Ok(Expr::Literal(Literal::Undefined, span))
            }
            TokenKind::Template(parts) => {
                self.advance();
                self.parse_template(parts, span)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Identifier(name, span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RBracket) && !self.is_eof() {
                    items.push(self.parse_assignment()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::Array(items, Span::new(span.start, self.last_span_end(span.end))))
            }
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => {
                self.advance();
                self.parse_function_rest().map(Expr::Function)
            }
            other => Err(self
                .error_here(&format!("Unexpected {}", other.describe()))
                .with_label("expected an expression")),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span.start;
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            let key_span = self.peek_token().span;
            let key = match self.peek_kind() {
                Some(TokenKind::String(key)) => {
                    self.advance();
                    key
                }
                Some(TokenKind::Number(value)) => {
                    self.advance();
                    crate::runtime::value::format_number(value)
                }
                _ => self.expect_property_name()?,
            };
            let value = if self.matches(TokenKind::Colon) {
                self.parse_assignment()?
            } else {
                Expr::Identifier(key.clone(), key_span)
            };
            entries.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::Object(
            entries,
            Span::new(start, self.last_span_end(start)),
        ))
    }

    fn parse_template(&mut self, parts: Vec<TemplatePart>, span: Span) -> Result<Expr, SyntaxError> {
        let mut segments = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) => segments.push(TemplateSegment::Text(text)),
                TemplatePart::Expr(source, offset) => {
                    let tokens = lex_tokens(&source, offset).map_err(|errors| {
                        errors
                            .errors
                            .into_iter()
                            .next()
                            .unwrap_or_else(|| SyntaxError::new("Invalid substitution", span))
                    })?;
                    let mut inner = Parser::new(tokens);
                    inner.depth = self.depth;
                    let expr = inner.parse_expression()?;
                    if !inner.is_eof() {
                        return Err(inner.error_here("Unexpected token in template substitution"));
                    }
                    segments.push(TemplateSegment::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(segments, span))
    }

    fn current_infix_op(&self) -> Option<(InfixOp, u8)> {
        let op = match self.peek_kind()? {
            TokenKind::PipePipe => (InfixOp::Logical(LogicalOp::Or), 1),
            TokenKind::AmpersandAmpersand => (InfixOp::Logical(LogicalOp::And), 2),
            TokenKind::EqEq => (InfixOp::Binary(BinaryOp::Eq), 3),
            TokenKind::BangEq => (InfixOp::Binary(BinaryOp::NotEq), 3),
            TokenKind::EqEqEq => (InfixOp::Binary(BinaryOp::StrictEq), 3),
            TokenKind::BangEqEq => (InfixOp::Binary(BinaryOp::StrictNotEq), 3),
            TokenKind::Lt => (InfixOp::Binary(BinaryOp::Lt), 4),
            TokenKind::LtEq => (InfixOp::Binary(BinaryOp::LtEq), 4),
            TokenKind::Gt => (InfixOp::Binary(BinaryOp::Gt), 4),
            TokenKind::GtEq => (InfixOp::Binary(BinaryOp::GtEq), 4),
            TokenKind::Plus => (InfixOp::Binary(BinaryOp::Add), 5),
            TokenKind::Minus => (InfixOp::Binary(BinaryOp::Sub), 5),
            TokenKind::Star => (InfixOp::Binary(BinaryOp::Mul), 6),
            TokenKind::Slash => (InfixOp::Binary(BinaryOp::Div), 6),
            TokenKind::Percent => (InfixOp::Binary(BinaryOp::Rem), 6),
            _ => return None,
        };
        Some(op)
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<String, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(msg)),
        }
    }

    /// Property names may reuse keywords (`obj.of`, `{ catch: 1 }`).
    fn expect_property_name(&mut self) -> Result<String, SyntaxError> {
        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => name,
            Some(kind) => match keyword_text(&kind) {
                Some(text) => text.to_string(),
                None => return Err(self.error_here("Expected property name")),
            },
            None => return Err(self.error_here("Expected property name")),
        };
        self.advance();
        Ok(name)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            let found = self
                .peek_kind()
                .map(|k| k.describe())
                .unwrap_or_else(|| "end of input".into());
            Err(self
                .error_here(&format!("Expected {}, found {}", kind.describe(), found))
                .with_label(format!("expected {}", kind.describe())))
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof) | None
        ) || self.current_newline_before()
    }

    fn consume_statement_end(&mut self) -> Result<(), SyntaxError> {
        if self.matches(TokenKind::Semi) || self.at_statement_end() {
            Ok(())
        } else {
            let found = self
                .peek_kind()
                .map(|k| k.describe())
                .unwrap_or_else(|| "end of input".into());
            Err(self
                .error_here(&format!("Unexpected {found}"))
                .with_label("expected `;` or a line break")
                .with_help("statements end with `;` or a line break"))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn peek_kind_n(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|t| t.kind.clone())
    }

    fn peek_token(&self) -> Token {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .cloned()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                span: Span::new(0, 0),
                newline_before: false,
            })
    }

    fn current_newline_before(&self) -> bool {
        self.tokens
            .get(self.pos)
            .map(|t| t.newline_before)
            .unwrap_or(false)
    }

    fn advance(&mut self) -> &Token {
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        self.pos = (self.pos + 1).min(self.tokens.len());
        let token = &self.tokens[index];
        self.last_span = Some(token.span);
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn current_span_start(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    fn last_span_end(&self, fallback: usize) -> usize {
        self.last_span.map(|span| span.end).unwrap_or(fallback)
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self
                .error_here("Nesting too deep")
                .with_help(format!("scripts may nest at most {MAX_NESTING} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        SyntaxError::new(message.to_string(), self.peek_token().span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skips to the next plausible statement boundary after an error.
    fn synchronize(&mut self) {
        let start = self.pos;
        while !self.is_eof() {
            match self.peek_kind() {
                Some(TokenKind::Semi) => {
                    self.advance();
                    return;
                }
                Some(
                    TokenKind::Function
                    | TokenKind::Let
                    | TokenKind::Const
                    | TokenKind::Var
                    | TokenKind::If
                    | TokenKind::For
                    | TokenKind::While
                    | TokenKind::Return,
                ) if self.pos > start => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Function => "function",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Var => "var",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::For => "for",
        TokenKind::Of => "of",
        TokenKind::While => "while",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Throw => "throw",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Finally => "finally",
        TokenKind::TypeOf => "typeof",
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Undefined => "undefined",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program(src).expect("parse")
    }

    #[test]
    fn parses_fixture_style_handlers() {
        let program = parse(
            r#"
            inlets = 3;
            outlets = 2;

            function bang() {
                post("Bang on inlet " + inlet);
                outlet(0, ["x", "y", "z", 1, 2, 3]);
            }

            function private() {
                post("private");
            }

            private.private = 1;
            "#,
        );
        assert_eq!(program.statements.len(), 5);
        match &program.statements[2] {
            Statement::Function(def) => {
                assert_eq!(def.name.as_deref(), Some("bang"));
                assert!(def.params.is_empty());
            }
            other => panic!("expected function, got {other:?}"),
        }
        match &program.statements[4] {
            Statement::Expr(Expr::Assign { target, .. }) => {
                assert!(matches!(**target, Expr::Member { ref property, .. } if property == "private"));
            }
            other => panic!("expected member assignment, got {other:?}"),
        }
    }

    #[test]
    fn semicolons_are_optional_at_line_breaks() {
        let program = parse("let a = 1\nlet b = a + 2\npost(b)");
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn return_before_newline_returns_nothing() {
        let program = parse("function f() {\n return\n 5\n}");
        let Statement::Function(def) = &program.statements[0] else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &def.body else {
            panic!("expected block body");
        };
        assert!(matches!(&body[0], Statement::Return(ReturnStmt { value: None, .. })));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("x = 1 + 2 * 3;");
        let Statement::Expr(Expr::Assign { value, .. }) = &program.statements[0] else {
            panic!("expected assignment");
        };
        match value.as_ref() {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn parses_arrow_functions() {
        let program = parse("let f = (a, b) => a + b; let g = x => { return x; };");
        let Statement::Decl(decl) = &program.statements[0] else {
            panic!("expected declaration");
        };
        match &decl.declarators[0].value {
            Some(Expr::Function(def)) => {
                assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
                assert!(matches!(def.body, FunctionBody::Expr(_)));
            }
            other => panic!("expected arrow, got {other:?}"),
        }
    }

    #[test]
    fn parses_template_substitutions() {
        let program = parse("post(`list ${args.length}: ${args.join(' ')}`);");
        let Statement::Expr(Expr::Call { args, .. }) = &program.statements[0] else {
            panic!("expected call");
        };
        match &args[0] {
            Expr::Template(segments, _) => {
                assert_eq!(segments.len(), 4);
                assert!(matches!(&segments[1], TemplateSegment::Expr(Expr::Member { .. })));
                assert!(matches!(&segments[3], TemplateSegment::Expr(Expr::Call { .. })));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn parses_for_of_and_try() {
        let program = parse(
            "for (const x of xs) { post(x); }\ntry { throw 'e'; } catch (err) { post(err); } finally { post('done'); }",
        );
        assert!(matches!(program.statements[0], Statement::ForOf(_)));
        match &program.statements[1] {
            Statement::Try(stmt) => {
                assert_eq!(stmt.catch_binding.as_deref(), Some("err"));
                assert!(stmt.finally_body.is_some());
            }
            other => panic!("expected try, got {other:?}"),
        }
    }

    #[test]
    fn reports_errors_with_spans() {
        let errors = parse_program("function bang() {\n post(1 +);\n}").expect_err("should fail");
        let first = errors.first().expect("at least one error");
        assert!(first.message.contains("Unexpected"), "{}", first.message);
        assert!(first.span.start > 0);
    }

    #[test]
    fn rejects_assignment_to_call() {
        let errors = parse_program("f() = 3;").expect_err("should fail");
        assert_eq!(errors.errors[0].message, "Invalid assignment target");
    }

    #[test]
    fn keywords_work_as_property_names() {
        let program = parse("let o = { catch: 1 }; o.of = 2;");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let depth = 100_000;
        let src = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        let errors = parse_program(&src).expect_err("too deep");
        assert_eq!(errors.errors[0].message, "Nesting too deep");

        let blocks = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        assert!(parse_program(&blocks).is_err());
        let negations = format!("let y = {}1;", "-".repeat(depth));
        assert!(parse_program(&negations).is_err());
    }

    #[test]
    fn long_operator_chains_count_as_nesting() {
        let chain = vec!["1"; 10_000].join(" + ");
        assert!(parse_program(&format!("let x = {chain};")).is_err());
        let calls = "()".repeat(10_000);
        assert!(parse_program(&format!("f{calls};")).is_err());
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let depth = 40;
        let src = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        parse(&src);
        parse(&format!("let s = {};", vec!["'a'"; 60].join(" + ")));
    }

    #[test]
    fn detects_functions_reading_arguments() {
        let program = parse(
            "function list() { let args = Array.from(arguments); }\nfunction foo(a) { const f = () => arguments[0]; }\nfunction bar() { function inner() { return arguments; } }",
        );
        let uses: Vec<bool> = program
            .statements
            .iter()
            .map(|statement| match statement {
                Statement::Function(def) => def.uses_arguments(),
                other => panic!("expected function, got {other:?}"),
            })
            .collect();
        assert_eq!(uses, vec![true, true, false]);
    }
}
