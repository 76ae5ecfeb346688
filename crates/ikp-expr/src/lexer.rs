//! Condition lexer: converts a condition string to a token stream.
//!
//! Features:
//! - Numbers with optional fraction and exponent
//! - Single- or double-quoted strings with backslash escapes
//! - `${name}` variable references alongside bare identifiers
//! - `&&`, `||` and `!` as aliases for `and`, `or` and `not`
//! - Stops at the first error

use ikp_types::expr::Span;

use crate::token::{Token, TokenKind};
use crate::ExprError;

/// The condition lexer.
pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Lex the whole condition. The stream always ends with [`TokenKind::Eof`].
    pub fn lex(mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn token(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.pos;
        self.pos += len;
        Token::new(kind, Span::new(start, self.pos))
    }

    // ─────────────────────────────────────────────────────────────
    // Scanning
    // ─────────────────────────────────────────────────────────────

    fn next_token(&mut self) -> Result<Token, ExprError> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, Span::new(self.pos, self.pos)));
        };
        let next = self.peek_at(1);

        let token = match (c, next) {
            (b'0'..=b'9', _) | (b'.', Some(b'0'..=b'9')) => self.scan_number()?,
            (b'"' | b'\'', _) => self.scan_string(c)?,
            (b'$', Some(b'{')) => self.scan_var_ref()?,
            (c, _) if c.is_ascii_alphabetic() || c == b'_' => self.scan_identifier(),

            (b'*', Some(b'*')) => self.token(TokenKind::StarStar, 2),
            (b'=', Some(b'=')) => self.token(TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => self.token(TokenKind::BangEq, 2),
            (b'<', Some(b'=')) => self.token(TokenKind::LessEq, 2),
            (b'>', Some(b'=')) => self.token(TokenKind::GreaterEq, 2),
            (b'&', Some(b'&')) => self.token(TokenKind::And, 2),
            (b'|', Some(b'|')) => self.token(TokenKind::Or, 2),

            (b'+', _) => self.token(TokenKind::Plus, 1),
            (b'-', _) => self.token(TokenKind::Minus, 1),
            (b'*', _) => self.token(TokenKind::Star, 1),
            (b'/', _) => self.token(TokenKind::Slash, 1),
            (b'%', _) => self.token(TokenKind::Percent, 1),
            (b'<', _) => self.token(TokenKind::Less, 1),
            (b'>', _) => self.token(TokenKind::Greater, 1),
            (b'!', _) => self.token(TokenKind::Not, 1),
            (b'(', _) => self.token(TokenKind::LParen, 1),
            (b')', _) => self.token(TokenKind::RParen, 1),

            (b'=', _) => {
                return Err(ExprError::new(
                    "assignment is not allowed in conditions; use '==' to compare",
                    Span::new(self.pos, self.pos + 1),
                ))
            }
            _ => {
                let ch = self.source[self.pos..].chars().next().unwrap_or('?');
                return Err(ExprError::new(
                    format!("unexpected character '{ch}'"),
                    Span::new(self.pos, self.pos + ch.len_utf8()),
                ));
            }
        };
        Ok(token)
    }

    fn scan_number(&mut self) -> Result<Token, ExprError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if matches!(self.peek_at(1 + sign), Some(b'0'..=b'9')) {
                self.pos += 1 + sign;
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
            }
        }
        let span = Span::new(start, self.pos);
        let text = &self.source[start..self.pos];
        let value = text
            .parse::<f64>()
            .map_err(|_| ExprError::new(format!("invalid number '{text}'"), span))?;
        Ok(Token::new(TokenKind::Number(value), span))
    }

    fn scan_string(&mut self, quote: u8) -> Result<Token, ExprError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ExprError::new(
                    "unterminated string literal",
                    Span::new(start, self.pos),
                ));
            };
            if c == quote {
                self.pos += 1;
                break;
            }
            if c == b'\\' {
                let escaped = match self.peek_at(1) {
                    Some(b'n') => '\n',
                    Some(b't') => '\t',
                    Some(b'\\') => '\\',
                    Some(b'\'') => '\'',
                    Some(b'"') => '"',
                    _ => {
                        return Err(ExprError::new(
                            "invalid escape sequence",
                            Span::new(self.pos, self.pos + 2),
                        ))
                    }
                };
                value.push(escaped);
                self.pos += 2;
                continue;
            }
            let ch = self.source[self.pos..].chars().next().unwrap_or('\u{FFFD}');
            value.push(ch);
            self.pos += ch.len_utf8();
        }
        Ok(Token::new(
            TokenKind::String(value),
            Span::new(start, self.pos),
        ))
    }

    fn scan_var_ref(&mut self) -> Result<Token, ExprError> {
        let start = self.pos;
        self.pos += 2;
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        if self.pos == name_start || self.peek() != Some(b'}') {
            return Err(ExprError::new(
                "malformed variable reference; expected '${name}'",
                Span::new(start, self.pos),
            ));
        }
        let name = self.source[name_start..self.pos].to_string();
        self.pos += 1;
        Ok(Token::new(TokenKind::VarRef(name), Span::new(start, self.pos)))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let kind =
            TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        Token::new(kind, Span::new(start, self.pos))
    }
}
