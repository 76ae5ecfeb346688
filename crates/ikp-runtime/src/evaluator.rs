//! Tree-walking evaluator for `if` conditions.
//!
//! Variables are read through [`Lookup`]; an unset variable reads as
//! `null`. String variables that look like booleans or numbers are coerced
//! on read, since text inputs always produce strings.

use ikp_types::expr::{BinOp, Expr, ExprKind, UnaryOp};
use ikp_types::Value;

use crate::error::EvalError;
use crate::store::Lookup;

/// Evaluate `expr` to a value.
pub fn evaluate(expr: &Expr, scope: &impl Lookup) -> Result<Value, EvalError> {
    Evaluator { scope }.eval_expr(expr)
}

/// Evaluate `expr` and take its truthiness.
pub fn condition_holds(expr: &Expr, scope: &impl Lookup) -> Result<bool, EvalError> {
    evaluate(expr, scope).map(|value| value.is_truthy())
}

struct Evaluator<'s, S> {
    scope: &'s S,
}

impl<S: Lookup> Evaluator<'_, S> {
    fn eval_expr(&self, expr: &Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Var(name) => Ok(self
                .scope
                .lookup(name)
                .map_or(Value::Null, |value| value.coerced())),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr) -> Result<Value, EvalError> {
        let value = self.eval_expr(operand)?;
        match (op, value) {
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(n)),
            (op, value) => Err(EvalError::BadOperand {
                op: if op == UnaryOp::Neg { "-" } else { "+" },
                operand: describe(&value),
            }),
        }
    }

    // ── Binary operators ──────────────────────────────────────────────────

    fn eval_binary(&self, left: &Expr, op: BinOp, right: &Expr) -> Result<Value, EvalError> {
        // Short-circuit: the right side is not evaluated when not needed.
        if op == BinOp::And {
            let lv = self.eval_expr(left)?;
            if !lv.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(self.eval_expr(right)?.is_truthy()));
        }
        if op == BinOp::Or {
            let lv = self.eval_expr(left)?;
            if lv.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.eval_expr(right)?.is_truthy()));
        }

        let lv = self.eval_expr(left)?;
        let rv = self.eval_expr(right)?;
        match op {
            BinOp::Eq => Ok(Value::Bool(loose_eq(&lv, &rv))),
            BinOp::NotEq => Ok(Value::Bool(!loose_eq(&lv, &rv))),
            BinOp::Less => compare(op, &lv, &rv, |o| o.is_lt()),
            BinOp::LessEq => compare(op, &lv, &rv, |o| o.is_le()),
            BinOp::Greater => compare(op, &lv, &rv, |o| o.is_gt()),
            BinOp::GreaterEq => compare(op, &lv, &rv, |o| o.is_ge()),
            BinOp::Add => match (&lv, &rv) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
                _ => arith(op, &lv, &rv, |a, b| Ok(a + b)),
            },
            BinOp::Sub => arith(op, &lv, &rv, |a, b| Ok(a - b)),
            BinOp::Mul => arith(op, &lv, &rv, |a, b| Ok(a * b)),
            BinOp::Div => arith(op, &lv, &rv, |a, b| {
                if b == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            }),
            // Floored modulo: the result takes the divisor's sign.
            BinOp::Mod => arith(op, &lv, &rv, |a, b| {
                if b == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(a - b * (a / b).floor())
                }
            }),
            BinOp::Pow => arith(op, &lv, &rv, |a, b| Ok(a.powf(b))),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }
}

/// Numbers compare by value (`true`/`false` count as 1/0 against numbers);
/// otherwise values of different kinds are never equal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Bool(y)) | (Value::Bool(y), Value::Number(x)) => {
            *x == f64::from(u8::from(*y))
        }
        _ => a == b,
    }
}

fn compare(
    op: BinOp,
    a: &Value,
    b: &Value,
    test: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvalError> {
    let ordering = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    };
    match ordering {
        Some(ordering) => Ok(Value::Bool(test(ordering))),
        // NaN on either side compares false.
        None if matches!((a, b), (Value::Number(_), Value::Number(_))) => Ok(Value::Bool(false)),
        None => Err(mismatch(op, a, b)),
    }
}

fn arith(
    op: BinOp,
    a: &Value,
    b: &Value,
    f: impl Fn(f64, f64) -> Result<f64, EvalError>,
) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => f(*x, *y).map(Value::Number),
        _ => Err(mismatch(op, a, b)),
    }
}

fn mismatch(op: BinOp, a: &Value, b: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.as_str(),
        left: describe(a),
        right: describe(b),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => format!("string '{s}'"),
        other => format!("{} {other}", other.kind()),
    }
}
