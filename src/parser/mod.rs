pub mod ast;
mod expr;

use crate::errors::{ErrorKind, LangError};
use crate::lexer::token::{Keyword, Token, TokenKind};
use crate::source::Span;
use crate::types::{Modifiers, TypeName};

use ast::{AssignOp, Node, NodeKind, Param};

/// Recursive-descent parser over the token sequence. Consumes the whole
/// stream including the `Eof` marker; the first unrecoverable position
/// fails with `InvalidSyntax`.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Node, LangError> {
        let start = self.peek().span.clone();
        let statements = self.statement_sequence(&TokenKind::Eof)?;
        self.expect(&TokenKind::Eof, "expected end of file")?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::Block(statements), span))
    }

    /// Parses statements until `terminator` (or `Eof`). Statements are
    /// separated by ';' except after block-bearing constructs. A
    /// statement alternative that failed without consuming a token is
    /// superseded by the caller's terminator check; a failure after
    /// consumption is terminal.
    fn statement_sequence(&mut self, terminator: &TokenKind) -> Result<Vec<Node>, LangError> {
        let mut statements = Vec::new();
        self.skip_semicolons();
        while !self.check(terminator) && !self.check(&TokenKind::Eof) {
            let checkpoint = self.current;
            let statement = match self.statement() {
                Ok(statement) => statement,
                Err(_) if self.current == checkpoint && !statements.is_empty() => break,
                Err(err) => return Err(err),
            };
            let needs_semicolon = statement.requires_semicolon();
            statements.push(statement);
            if needs_semicolon && !self.check(terminator) && !self.check(&TokenKind::Eof) {
                self.expect(&TokenKind::Semicolon, "expected ';' after statement")?;
            }
            self.skip_semicolons();
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Node, LangError> {
        if let TokenKind::Keyword(keyword) = self.peek().kind {
            match keyword {
                Keyword::Return => return self.return_statement(),
                Keyword::Break => {
                    let token = self.advance().clone();
                    return Ok(Node::new(NodeKind::Break, token.span));
                }
                Keyword::Continue => {
                    let token = self.advance().clone();
                    return Ok(Node::new(NodeKind::Continue, token.span));
                }
                Keyword::If => return self.conditional(),
                Keyword::While => return self.while_loop(),
                Keyword::For => return self.for_loop(),
                Keyword::Switch => return self.switch(),
                Keyword::Import | Keyword::From => return self.import(),
                Keyword::Func => {
                    // `func name(...)` is a definition statement; a
                    // nameless `func (...)` stays an expression
                    if matches!(self.peek_kind_at(1), Some(TokenKind::Identifier(_))) {
                        let start = self.peek().span.clone();
                        return self.function_definition(Modifiers::empty(), start);
                    }
                }
                _ => {
                    if keyword.modifier().is_some() {
                        return self.declaration();
                    }
                    // a bare type keyword only opens a declaration when a
                    // name follows; `int("42")` stays a conversion call
                    if keyword.type_name().is_some()
                        && matches!(self.peek_kind_at(1), Some(TokenKind::Identifier(_)))
                    {
                        return self.declaration();
                    }
                }
            }
        }
        self.expression_statement()
    }

    fn declaration(&mut self) -> Result<Node, LangError> {
        let start = self.peek().span.clone();
        let mut modifiers = Modifiers::empty();
        while let TokenKind::Keyword(keyword) = self.peek().kind {
            let Some(modifier) = keyword.modifier() else {
                break;
            };
            self.advance();
            modifiers |= modifier;
        }

        if self.check_keyword(Keyword::Func) {
            return self.function_definition(modifiers, start);
        }

        let declared = self.expect_type_name()?;
        if declared == TypeName::Const {
            modifiers |= Modifiers::FINAL;
        }
        let name = self.expect_identifier("expected variable name")?;
        let init = if self.matches(&TokenKind::Equal) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        let span = start.to(&self.previous().span);
        Ok(Node::new(
            NodeKind::VarDeclare {
                modifiers,
                declared,
                name,
                init,
            },
            span,
        ))
    }

    pub(crate) fn function_definition(
        &mut self,
        modifiers: Modifiers,
        start: Span,
    ) -> Result<Node, LangError> {
        self.expect_keyword(Keyword::Func, "expected 'func'")?;
        let name = match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        self.expect(&TokenKind::LeftParen, "expected '(' after 'func'")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let declared = self.expect_type_name()?;
                let name = self.expect_identifier("expected parameter name")?;
                params.push(Param { declared, name });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "expected ')' after parameters")?;

        let mut return_types = Vec::new();
        if self.matches(&TokenKind::Colon) {
            loop {
                return_types.push(self.expect_type_name()?);
                if !self.matches(&TokenKind::Pipe) {
                    break;
                }
            }
        }

        let body = self.brace_block()?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(
            NodeKind::FuncDef {
                name,
                modifiers,
                params,
                return_types,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn return_statement(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        // a bare `return` yields void
        let value = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.check(&TokenKind::Eof)
        {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::Return(value), span))
    }

    fn conditional(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let mut cases = Vec::new();
        let condition = self.expression()?;
        let body = self.conditional_body()?;
        cases.push((condition, body));

        let mut otherwise = None;
        loop {
            if self.check_keyword(Keyword::Elif) {
                self.advance();
                let condition = self.expression()?;
                let body = self.conditional_body()?;
                cases.push((condition, body));
            } else if self.check_keyword(Keyword::Else) {
                self.advance();
                otherwise = Some(Box::new(self.conditional_body()?));
                break;
            } else {
                break;
            }
        }

        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::Conditional { cases, otherwise }, span))
    }

    /// A brace block or a single braceless statement.
    fn conditional_body(&mut self) -> Result<Node, LangError> {
        if self.check(&TokenKind::LeftBrace) {
            return self.brace_block();
        }
        let statement = self.statement()?;
        if statement.requires_semicolon() {
            self.skip_semicolons();
        }
        Ok(statement)
    }

    fn while_loop(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let condition = self.expression()?;
        let body = self.brace_block()?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(
            NodeKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            span,
        ))
    }

    fn for_loop(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let declared = self.expect_type_name()?;
        let name = self.expect_identifier("expected loop variable name")?;
        self.expect(&TokenKind::Equal, "expected '=' after loop variable")?;
        let start_expr = self.expression()?;
        self.expect(&TokenKind::Semicolon, "expected ';' after loop start value")?;
        let end_expr = self.expression()?;
        let step = if self.matches(&TokenKind::Semicolon) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        let body = self.brace_block()?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(
            NodeKind::For {
                declared,
                name,
                start: Box::new(start_expr),
                end: Box::new(end_expr),
                step,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn switch(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let subject = self.expression()?;
        self.expect(&TokenKind::LeftBrace, "expected '{' to open switch body")?;

        let mut cases = Vec::new();
        let mut default = None;
        loop {
            if self.check_keyword(Keyword::Case) {
                self.advance();
                let value = self.expression()?;
                self.expect(&TokenKind::Colon, "expected ':' after case value")?;
                cases.push((value, self.case_body()?));
            } else if self.check_keyword(Keyword::Default) {
                self.advance();
                self.expect(&TokenKind::Colon, "expected ':' after 'default'")?;
                default = Some(self.case_body()?);
            } else {
                break;
            }
        }

        self.expect(&TokenKind::RightBrace, "expected '}' to close switch body")?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(
            NodeKind::Switch {
                subject: Box::new(subject),
                cases,
                default,
            },
            span,
        ))
    }

    /// Statements up to the next `case`/`default` label or the closing
    /// brace.
    fn case_body(&mut self) -> Result<Vec<Node>, LangError> {
        let mut statements = Vec::new();
        self.skip_semicolons();
        while !self.at_case_end() {
            let statement = self.statement()?;
            let needs_semicolon = statement.requires_semicolon();
            statements.push(statement);
            if needs_semicolon && !self.at_case_end() {
                self.expect(&TokenKind::Semicolon, "expected ';' after statement")?;
            }
            self.skip_semicolons();
        }
        Ok(statements)
    }

    fn at_case_end(&self) -> bool {
        self.check(&TokenKind::RightBrace)
            || self.check(&TokenKind::Eof)
            || self.check_keyword(Keyword::Case)
            || self.check_keyword(Keyword::Default)
    }

    fn import(&mut self) -> Result<Node, LangError> {
        let start = self.peek().span.clone();
        let node = if self.check_keyword(Keyword::From) {
            self.advance();
            let path = self.expect_string("expected module path string after 'from'")?;
            self.expect_keyword(Keyword::Import, "expected 'import' after module path")?;
            let mut names = vec![self.expect_identifier("expected imported name")?];
            while self.matches(&TokenKind::Comma) {
                names.push(self.expect_identifier("expected imported name")?);
            }
            NodeKind::Import {
                path,
                alias: None,
                names: Some(names),
            }
        } else {
            self.advance();
            let path = self.expect_string("expected module path string after 'import'")?;
            let alias = if self.matches_keyword(Keyword::As) {
                Some(self.expect_identifier("expected module alias after 'as'")?)
            } else {
                None
            };
            NodeKind::Import {
                path,
                alias,
                names: None,
            }
        };
        let span = start.to(&self.previous().span);
        Ok(Node::new(node, span))
    }

    fn expression_statement(&mut self) -> Result<Node, LangError> {
        let expr = self.expression()?;

        // `name = e`, `name += e` and `target[index] = e` are told apart
        // from plain expressions only after the target parses
        let Some(op) = self.peek_assign_op() else {
            return Ok(expr);
        };
        let op_token = self.advance().clone();
        let value = self.expression()?;
        let span = expr.span.to(&self.previous().span);
        match expr.kind {
            NodeKind::VarAccess(name) => Ok(Node::new(
                NodeKind::VarAssign {
                    name,
                    op,
                    value: Box::new(value),
                },
                span,
            )),
            NodeKind::Index { target, index } if op == AssignOp::Set => Ok(Node::new(
                NodeKind::SetIndex {
                    target,
                    index,
                    value: Box::new(value),
                },
                span,
            )),
            NodeKind::Member { target, name } if op == AssignOp::Set => {
                let key = Node::new(NodeKind::Str(name), expr.span.clone());
                Ok(Node::new(
                    NodeKind::SetIndex {
                        target,
                        index: Box::new(key),
                        value: Box::new(value),
                    },
                    span,
                ))
            }
            _ => Err(LangError::new(
                ErrorKind::InvalidSyntax,
                "invalid assignment target",
                op_token.span,
            )),
        }
    }

    pub(crate) fn brace_block(&mut self) -> Result<Node, LangError> {
        let start = self.peek().span.clone();
        self.expect(&TokenKind::LeftBrace, "expected '{'")?;
        let statements = self.statement_sequence(&TokenKind::RightBrace)?;
        self.expect(&TokenKind::RightBrace, "expected '}'")?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::Block(statements), span))
    }

    fn peek_assign_op(&self) -> Option<AssignOp> {
        let op = match self.peek().kind {
            TokenKind::Equal => AssignOp::Set,
            TokenKind::PlusEqual => AssignOp::Add,
            TokenKind::MinusEqual => AssignOp::Sub,
            TokenKind::StarEqual => AssignOp::Mul,
            TokenKind::SlashEqual => AssignOp::Div,
            TokenKind::PercentEqual => AssignOp::Mod,
            TokenKind::CaretEqual => AssignOp::Pow,
            _ => return None,
        };
        Some(op)
    }

    fn skip_semicolons(&mut self) {
        while self.matches(&TokenKind::Semicolon) {}
    }

    pub(crate) fn expect_type_name(&mut self) -> Result<TypeName, LangError> {
        if let TokenKind::Keyword(keyword) = self.peek().kind {
            if let Some(name) = keyword.type_name() {
                self.advance();
                return Ok(name);
            }
        }
        Err(LangError::new(
            ErrorKind::InvalidSyntax,
            "expected type name",
            self.peek().span.clone(),
        ))
    }

    pub(crate) fn expect_identifier(&mut self, message: &str) -> Result<String, LangError> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(LangError::new(
                ErrorKind::InvalidSyntax,
                message,
                self.peek().span.clone(),
            )),
        }
    }

    fn expect_string(&mut self, message: &str) -> Result<String, LangError> {
        match &self.peek().kind {
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance();
                Ok(value)
            }
            _ => Err(LangError::new(
                ErrorKind::InvalidSyntax,
                message,
                self.peek().span.clone(),
            )),
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<(), LangError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(LangError::new(
                ErrorKind::InvalidSyntax,
                message,
                self.peek().span.clone(),
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Result<(), LangError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(LangError::new(
                ErrorKind::InvalidSyntax,
                message,
                self.peek().span.clone(),
            ))
        }
    }

    pub(crate) fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(k) if k == keyword)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|token| &token.kind)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !matches!(self.peek().kind, TokenKind::Eof) {
            self.current += 1;
        }
        self.previous()
    }
}
