pub mod token;

use std::rc::Rc;

use crate::errors::{ErrorKind, LangError};
use crate::source::{Position, Source, Span};

use token::{Keyword, Token, TokenKind};

/// Tokenizes `text`, producing a sequence that always ends with an
/// `Eof` token, or fails on the first unrecognized character.
pub fn lex(filename: &str, text: &str) -> Result<Vec<Token>, LangError> {
    Lexer::new(filename, text).lex()
}

struct Lexer {
    chars: Vec<char>,
    pos: Position,
    start: Position,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(filename: &str, text: &str) -> Self {
        let source = Source::new(filename, text);
        let pos = Position::start(Rc::clone(&source));
        Self {
            chars: text.chars().collect(),
            start: pos.clone(),
            pos,
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, LangError> {
        while let Some(c) = self.peek() {
            self.start = self.pos.clone();
            self.scan_token(c)?;
        }

        self.start = self.pos.clone();
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn scan_token(&mut self, c: char) -> Result<(), LangError> {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                self.advance();
            }
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '?' => self.single(TokenKind::Question),
            ':' => self.single(TokenKind::Colon),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            ';' => self.single(TokenKind::Semicolon),
            '+' => self.with_equal(TokenKind::Plus, TokenKind::PlusEqual),
            '-' => self.with_equal(TokenKind::Minus, TokenKind::MinusEqual),
            '*' => self.with_equal(TokenKind::Star, TokenKind::StarEqual),
            '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual),
            '^' => self.with_equal(TokenKind::Caret, TokenKind::CaretEqual),
            '=' => self.with_equal(TokenKind::Equal, TokenKind::EqualEqual),
            '!' => self.with_equal(TokenKind::Bang, TokenKind::BangEqual),
            '<' => self.with_equal(TokenKind::Less, TokenKind::LessEqual),
            '>' => self.with_equal(TokenKind::Greater, TokenKind::GreaterEqual),
            '/' => self.slash()?,
            '&' => self.ampersand()?,
            '|' => {
                self.advance();
                if self.matches('|') {
                    self.push(TokenKind::PipePipe);
                } else {
                    self.push(TokenKind::Pipe);
                }
            }
            '\'' | '"' => self.string(c)?,
            d if d.is_ascii_digit() => self.number()?,
            a if a == '_' || a.is_ascii_alphabetic() => self.identifier(),
            other => {
                self.advance();
                return Err(LangError::new(
                    ErrorKind::IllegalCharacter,
                    format!("'{}'", other),
                    self.span(),
                ));
            }
        }
        Ok(())
    }

    fn slash(&mut self) -> Result<(), LangError> {
        self.advance();
        if self.matches('/') {
            while matches!(self.peek(), Some(c) if c != '\n') {
                self.advance();
            }
        } else if self.matches('*') {
            loop {
                match self.peek() {
                    None => {
                        return Err(LangError::new(
                            ErrorKind::ExpectedCharacter,
                            "'*/' to close block comment",
                            self.span(),
                        ));
                    }
                    Some('*') if self.peek_next() == Some('/') => {
                        self.advance();
                        self.advance();
                        break;
                    }
                    Some(_) => {
                        self.advance();
                    }
                }
            }
        } else if self.matches('=') {
            self.push(TokenKind::SlashEqual);
        } else {
            self.push(TokenKind::Slash);
        }
        Ok(())
    }

    fn ampersand(&mut self) -> Result<(), LangError> {
        self.advance();
        if self.matches('&') {
            self.push(TokenKind::AndAnd);
            Ok(())
        } else {
            Err(LangError::new(
                ErrorKind::ExpectedCharacter,
                "'&' after '&'",
                self.span(),
            ))
        }
    }

    fn string(&mut self, quote: char) -> Result<(), LangError> {
        self.advance();
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(LangError::new(
                    ErrorKind::ExpectedCharacter,
                    format!("'{}' to close string literal", quote),
                    self.span(),
                ));
            };
            self.advance();
            if c == quote {
                break;
            }
            if c == '\\' {
                // unknown escapes pass the following character through
                match self.peek() {
                    Some('n') => {
                        self.advance();
                        value.push('\n');
                    }
                    Some('t') => {
                        self.advance();
                        value.push('\t');
                    }
                    Some('\\') => {
                        self.advance();
                        value.push('\\');
                    }
                    Some(other) => {
                        self.advance();
                        value.push(other);
                    }
                    None => {}
                }
            } else {
                value.push(c);
            }
        }
        self.push(TokenKind::Str(value));
        Ok(())
    }

    fn number(&mut self) -> Result<(), LangError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // a run of zeros followed by 'x' enters hexadecimal mode
        let run: String = self.chars[self.start.index..self.pos.index].iter().collect();
        if self.peek() == Some('x') && run.chars().all(|c| c == '0') {
            self.advance();
            return self.hex_literal();
        }

        let mut is_float = false;
        if self.peek() == Some('.') {
            // one decimal point only; a second '.' ends the literal
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme: String = self.chars[self.start.index..self.pos.index].iter().collect();
        if is_float {
            let value = lexeme.parse::<f64>().map_err(|_| {
                LangError::new(
                    ErrorKind::InvalidSyntax,
                    format!("invalid float literal '{}'", lexeme),
                    self.span(),
                )
            })?;
            self.push(TokenKind::Float(value));
        } else {
            let value = lexeme.parse::<i32>().map_err(|_| {
                LangError::new(
                    ErrorKind::InvalidSyntax,
                    format!("integer literal '{}' does not fit a 32-bit int", lexeme),
                    self.span(),
                )
            })?;
            self.push(TokenKind::Int(value));
        }
        Ok(())
    }

    fn hex_literal(&mut self) -> Result<(), LangError> {
        let digits_start = self.pos.index;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.advance();
        }
        let digits: String = self.chars[digits_start..self.pos.index].iter().collect();

        if digits.is_empty() {
            return Err(LangError::new(
                ErrorKind::ExpectedCharacter,
                "hex digit after '0x'",
                self.span(),
            ));
        }
        if digits.len() > 8 {
            return Err(LangError::new(
                ErrorKind::InvalidSyntax,
                format!("hex literal '0x{}' does not fit a 32-bit int", digits),
                self.span(),
            ));
        }
        let value = u32::from_str_radix(&digits, 16).map_err(|_| {
            LangError::new(
                ErrorKind::InvalidSyntax,
                format!("invalid hex literal '0x{}'", digits),
                self.span(),
            )
        })?;
        // the full 32-bit pattern is reinterpreted, so 0xFFFFFFFF == -1
        self.push(TokenKind::Int(value as i32));
        Ok(())
    }

    fn identifier(&mut self) {
        while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphanumeric()) {
            self.advance();
        }
        let word: String = self.chars[self.start.index..self.pos.index].iter().collect();
        match Keyword::lookup(&word) {
            Some(keyword) => self.push(TokenKind::Keyword(keyword)),
            None => self.push(TokenKind::Identifier(word)),
        }
    }

    fn single(&mut self, kind: TokenKind) {
        self.advance();
        self.push(kind);
    }

    fn with_equal(&mut self, base: TokenKind, with_eq: TokenKind) {
        self.advance();
        if self.matches('=') {
            self.push(with_eq);
        } else {
            self.push(base);
        }
    }

    fn push(&mut self, kind: TokenKind) {
        let lexeme: String = self.chars[self.start.index..self.pos.index].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, self.span()));
    }

    fn span(&self) -> Span {
        Span::new(self.start.clone(), self.pos.clone())
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos.index + 1).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.pos.index];
        self.pos.advance(c);
        c
    }
}
