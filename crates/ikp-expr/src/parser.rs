//! Condition parser with operator precedence.
//!
//! Precedence (lowest → highest):
//! 7. `or`
//! 6. `and`
//! 5. `not`
//! 4. `==`, `!=`, `<`, `>`, `<=`, `>=` (no chaining)
//! 3. `+`, `-`
//! 2. `*`, `/`, `%`
//! 1. unary `-`, `+`
//! 0. `**` (right-associative, binds tighter than a unary operator on its left)

use ikp_types::expr::{BinOp, Expr, ExprKind, Span, UnaryOp};

use crate::token::{Token, TokenKind};
use crate::ExprError;

/// Maximum nesting depth of a condition.
pub const MAX_DEPTH: usize = 16;

/// Recursive-descent parser over a lexed condition.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// `tokens` must end with [`TokenKind::Eof`], as [`crate::Lexer::lex`] guarantees.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the whole token stream as one expression.
    pub fn parse(mut self) -> Result<Expr, ExprError> {
        if self.check(&TokenKind::Eof) {
            return Err(ExprError::new("empty condition", self.current_span()));
        }
        let expr = self.parse_expression()?;
        if !self.check(&TokenKind::Eof) {
            return Err(ExprError::new(
                format!("unexpected '{}' after expression", self.peek_kind()),
                self.current_span(),
            ));
        }
        Ok(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Token helpers
    // ══════════════════════════════════════════════════════════════════════════

    fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        )
    }

    fn unary(op: UnaryOp, op_span: Span, operand: Expr) -> Expr {
        let span = op_span.merge(operand.span);
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence chain
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_expression(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::parse_or)
    }

    /// `OrExpr = AndExpr { "or" AndExpr }`
    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::parse_and, |kind| match kind {
            TokenKind::Or => Some(BinOp::Or),
            _ => None,
        })
    }

    /// `AndExpr = NotExpr { "and" NotExpr }`
    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::parse_not, |kind| match kind {
            TokenKind::And => Some(BinOp::And),
            _ => None,
        })
    }

    /// `NotExpr = "not" NotExpr | Comparison`
    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.check(&TokenKind::Not) {
            let span = self.current_span();
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            return Ok(Self::unary(UnaryOp::Not, span, operand));
        }
        self.parse_comparison()
    }

    /// `Comparison = Additive [ CompareOp Additive ]`
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.comparison_op().is_some() {
            return Err(ExprError::new(
                "comparison operators cannot be chained; combine them with 'and'",
                self.current_span(),
            ));
        }
        Ok(Self::binary(left, op, right))
    }

    fn comparison_op(&self) -> Option<BinOp> {
        match self.peek_kind() {
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::BangEq => Some(BinOp::NotEq),
            TokenKind::Less => Some(BinOp::Less),
            TokenKind::LessEq => Some(BinOp::LessEq),
            TokenKind::Greater => Some(BinOp::Greater),
            TokenKind::GreaterEq => Some(BinOp::GreaterEq),
            _ => None,
        }
    }

    /// `Additive = Multiplicative { ("+" | "-") Multiplicative }`
    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    /// `Multiplicative = Unary { ("*" | "/" | "%") Unary }`
    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.chain(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    /// `Unary = ("-" | "+") Unary | Power`
    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_power(),
        };
        let span = self.current_span();
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Self::unary(op, span, operand))
    }

    /// `Power = Primary [ "**" Unary ]`
    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_primary()?;
        if self.eat(&TokenKind::StarStar) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(Self::binary(base, BinOp::Pow, exponent));
        }
        Ok(base)
    }

    /// Literals, names and parenthesised expressions.
    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let span = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::String(s) => ExprKind::String(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Identifier(name) | TokenKind::VarRef(name) => ExprKind::Var(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(ExprError::new(
                        format!("expected ')', got '{}'", self.peek_kind()),
                        self.current_span(),
                    ));
                }
                return Ok(inner);
            }
            other => {
                return Err(ExprError::new(
                    format!("expected a value, got '{other}'"),
                    span,
                ))
            }
        };
        self.advance();
        Ok(Expr::new(kind, span))
    }

    /// Left-associative fold of `operand (op operand)*`.
    ///
    /// Every fold adds a level to the tree, so each one counts against the
    /// nesting limit just like a parenthesis.
    fn chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
        operator: fn(&TokenKind) -> Option<BinOp>,
    ) -> Result<Expr, ExprError> {
        let base = self.depth;
        let result = self.fold(operand, operator);
        self.depth = base;
        result
    }

    fn fold(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
        operator: fn(&TokenKind) -> Option<BinOp>,
    ) -> Result<Expr, ExprError> {
        let mut left = operand(self)?;
        while let Some(op) = operator(self.peek_kind()) {
            self.enter()?;
            self.advance();
            let right = operand(self)?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    /// Run a recursive production under the nesting limit.
    fn nested(
        &mut self,
        production: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let base = self.depth;
        let result = self.enter().and_then(|()| production(self));
        self.depth = base;
        result
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::new(
                format!("maximum condition nesting depth is {MAX_DEPTH}"),
                self.current_span(),
            ));
        }
        Ok(())
    }
}
