use crate::errors::{ErrorKind, LangError};
use crate::lexer::token::{Keyword, TokenKind};
use crate::types::Modifiers;

use super::ast::{BinaryOp, Node, NodeKind, UnaryOp};
use super::Parser;

impl Parser {
    pub(crate) fn expression(&mut self) -> Result<Node, LangError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Node, LangError> {
        let condition = self.logical()?;
        if !self.matches(&TokenKind::Question) {
            return Ok(condition);
        }
        let then = self.expression()?;
        self.expect(&TokenKind::Colon, "expected ':' in conditional expression")?;
        let otherwise = self.expression()?;
        let span = condition.span.to(&otherwise.span);
        Ok(Node::new(
            NodeKind::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    fn logical(&mut self) -> Result<Node, LangError> {
        let mut expr = self.equality()?;
        loop {
            let op = if self.matches(&TokenKind::AndAnd) {
                BinaryOp::And
            } else if self.matches(&TokenKind::PipePipe) {
                BinaryOp::Or
            } else {
                break;
            };
            let rhs = self.equality()?;
            let span = expr.span.to(&rhs.span);
            expr = Node::new(
                NodeKind::Binary {
                    lhs: Box::new(expr),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Node, LangError> {
        let mut expr = self.additive()?;
        loop {
            let op = if self.matches(&TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.matches(&TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else if self.matches(&TokenKind::Less) {
                BinaryOp::Less
            } else if self.matches(&TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else if self.matches(&TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.matches(&TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else {
                break;
            };
            let rhs = self.additive()?;
            let span = expr.span.to(&rhs.span);
            expr = Node::new(
                NodeKind::Binary {
                    lhs: Box::new(expr),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Node, LangError> {
        let mut expr = self.multiplicative()?;
        loop {
            let op = if self.matches(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };
            let rhs = self.multiplicative()?;
            let span = expr.span.to(&rhs.span);
            expr = Node::new(
                NodeKind::Binary {
                    lhs: Box::new(expr),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Node, LangError> {
        let mut expr = self.power()?;
        loop {
            let op = if self.matches(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.matches(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.matches(&TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };
            let rhs = self.power()?;
            let span = expr.span.to(&rhs.span);
            expr = Node::new(
                NodeKind::Binary {
                    lhs: Box::new(expr),
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn power(&mut self) -> Result<Node, LangError> {
        let lhs = self.unary()?;
        if !self.matches(&TokenKind::Caret) {
            return Ok(lhs);
        }
        // right-associative
        let rhs = self.power()?;
        let span = lhs.span.to(&rhs.span);
        Ok(Node::new(
            NodeKind::Binary {
                lhs: Box::new(lhs),
                op: BinaryOp::Pow,
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    fn unary(&mut self) -> Result<Node, LangError> {
        let op = if self.check(&TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.check(&TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.postfix();
        };
        let start = self.advance().span.clone();
        let operand = self.unary()?;
        let span = start.to(&operand.span);
        Ok(Node::new(
            NodeKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> Result<Node, LangError> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&TokenKind::LeftParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RightParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RightParen, "expected ')' after arguments")?;
                let span = expr.span.to(&self.previous().span);
                expr = Node::new(
                    NodeKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                );
            } else if self.matches(&TokenKind::LeftBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RightBracket, "expected ']' after index")?;
                let span = expr.span.to(&self.previous().span);
                expr = Node::new(
                    NodeKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if self.matches(&TokenKind::Dot) {
                let name = self.expect_identifier("expected member name after '.'")?;
                let span = expr.span.to(&self.previous().span);
                expr = Node::new(
                    NodeKind::Member {
                        target: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Node, LangError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Node::new(NodeKind::Int(*value), token.span))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Node::new(NodeKind::Float(*value), token.span))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Node::new(NodeKind::Str(value.clone()), token.span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Node::new(NodeKind::VarAccess(name.clone()), token.span))
            }
            TokenKind::Keyword(Keyword::Func) => {
                self.function_definition(Modifiers::empty(), token.span)
            }
            // type keywords double as the conversion builtins' names
            TokenKind::Keyword(keyword) if keyword.type_name().is_some() => {
                self.advance();
                Ok(Node::new(
                    NodeKind::VarAccess(keyword.as_str().to_string()),
                    token.span,
                ))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.list_literal(),
            TokenKind::LeftBrace => self.map_literal(),
            _ => Err(LangError::new(
                ErrorKind::InvalidSyntax,
                "expected expression",
                token.span,
            )),
        }
    }

    fn list_literal(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let mut items = Vec::new();
        if !self.check(&TokenKind::RightBracket) {
            loop {
                items.push(self.expression()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBracket, "expected ']' after list items")?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::ListLiteral(items), span))
    }

    fn map_literal(&mut self) -> Result<Node, LangError> {
        let start = self.advance().span.clone();
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = self.expression()?;
                self.expect(&TokenKind::Colon, "expected ':' after map key")?;
                let value = self.expression()?;
                entries.push((key, value));
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightBrace, "expected '}' after map entries")?;
        let span = start.to(&self.previous().span);
        Ok(Node::new(NodeKind::MapLiteral(entries), span))
    }
}
