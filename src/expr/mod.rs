//! # Expression Trees
//!
//! A tagged sum over expression node shapes with owned children, plus an
//! evaluator returning [`Value`]. Built for the executor's filter path:
//! operators evaluate an expression once per iterator row through an
//! [`ExprContext`] that resolves column references.
//!
//! ## Null / empty logic
//!
//! Logical operators follow three-valued logic with two twists:
//!
//! - **Errorful nulls are sticky.** A null carrying an error subtype
//!   (division by zero, overflow, ...) survives AND/OR/XOR even against a
//!   definite operand: `div-by-zero AND false` stays `div-by-zero`, while
//!   a plain `null AND false` collapses to `false`.
//! - **Empty is transparent.** An absent operand passes through unless the
//!   other side forces a definite result: `empty AND false == false`,
//!   `empty OR true == true`, otherwise the emptiness is preserved.
//!
//! Left-hand short-circuiting still applies: `false AND rhs` and
//! `true OR rhs` never evaluate `rhs`.
//!
//! Arithmetic degrades to the matching null subtype instead of panicking:
//! division/modulo by zero yields the div-by-zero null, i64 overflow the
//! overflow null, operand type mismatches the bad-type null.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use crate::value::{NullKind, Value};

// ------------------------------------------------------------------------------------------------
// Node shapes
// ------------------------------------------------------------------------------------------------

/// Arithmetic operator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Comparison operator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An expression node. Children are owned through `Box`, so a tree is
/// acyclic by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Constant(Value),

    /// A column reference, resolved against the evaluation context.
    Column(String),

    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
}

// ------------------------------------------------------------------------------------------------
// Evaluation context
// ------------------------------------------------------------------------------------------------

/// Resolves column references during evaluation.
///
/// Iterators implement this so filter expressions can read the current
/// row; constant-only expressions can use [`NoColumns`].
pub trait ExprContext {
    fn get_column(&self, name: &str) -> Value;
}

/// A context with no columns: every reference resolves to empty.
pub struct NoColumns;

impl ExprContext for NoColumns {
    fn get_column(&self, _name: &str) -> Value {
        Value::Empty
    }
}

// ------------------------------------------------------------------------------------------------
// Constructors
// ------------------------------------------------------------------------------------------------

impl Expr {
    pub fn constant(v: impl Into<Value>) -> Expr {
        Expr::Constant(v.into())
    }

    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Not(Box::new(operand))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Xor(Box::new(lhs), Box::new(rhs))
    }

    pub fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Arith(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Cmp(op, Box::new(lhs), Box::new(rhs))
    }

    /// Evaluates the tree against the given context.
    ///
    /// Evaluation never fails: every degenerate case maps to an empty or
    /// null value per the module rules.
    pub fn eval(&self, ctx: &dyn ExprContext) -> Value {
        match self {
            Expr::Constant(v) => v.clone(),
            Expr::Column(name) => ctx.get_column(name),
            Expr::Not(operand) => eval_not(operand.eval(ctx)),
            Expr::And(lhs, rhs) => {
                let l = lhs.eval(ctx);
                // Definite false short-circuits, even past an errorful rhs.
                if l == Value::Bool(false) {
                    return Value::Bool(false);
                }
                combine_and(l, rhs.eval(ctx))
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.eval(ctx);
                if l == Value::Bool(true) {
                    return Value::Bool(true);
                }
                combine_or(l, rhs.eval(ctx))
            }
            Expr::Xor(lhs, rhs) => combine_xor(lhs.eval(ctx), rhs.eval(ctx)),
            Expr::Arith(op, lhs, rhs) => eval_arith(*op, lhs.eval(ctx), rhs.eval(ctx)),
            Expr::Cmp(op, lhs, rhs) => eval_cmp(*op, lhs.eval(ctx), rhs.eval(ctx)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Logical combination
// ------------------------------------------------------------------------------------------------

fn eval_not(operand: Value) -> Value {
    match operand {
        v if v.is_bad_null() => v,
        Value::Null(_) => Value::NULL,
        Value::Empty => Value::Empty,
        Value::Bool(b) => Value::Bool(!b),
        _ => Value::Null(NullKind::BadType),
    }
}

/// AND combination once the left side failed to short-circuit.
///
/// Precedence: errorful null (left first), definite false, plain null,
/// empty, boolean conjunction.
fn combine_and(l: Value, r: Value) -> Value {
    if l.is_bad_null() {
        return l;
    }
    if r.is_bad_null() {
        return r;
    }
    if r == Value::Bool(false) {
        return Value::Bool(false);
    }
    if l.is_null() || r.is_null() {
        return Value::NULL;
    }
    if l.is_empty() || r.is_empty() {
        return Value::Empty;
    }
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(a && b),
        _ => Value::Null(NullKind::BadType),
    }
}

/// OR combination once the left side failed to short-circuit.
fn combine_or(l: Value, r: Value) -> Value {
    if l.is_bad_null() {
        return l;
    }
    if r.is_bad_null() {
        return r;
    }
    if r == Value::Bool(true) {
        return Value::Bool(true);
    }
    if l.is_null() || r.is_null() {
        return Value::NULL;
    }
    if l.is_empty() || r.is_empty() {
        return Value::Empty;
    }
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(a || b),
        _ => Value::Null(NullKind::BadType),
    }
}

/// XOR never short-circuits; any null wins over empty, empty over booleans.
fn combine_xor(l: Value, r: Value) -> Value {
    if l.is_bad_null() {
        return l;
    }
    if r.is_bad_null() {
        return r;
    }
    if l.is_null() || r.is_null() {
        return Value::NULL;
    }
    if l.is_empty() || r.is_empty() {
        return Value::Empty;
    }
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(a ^ b),
        _ => Value::Null(NullKind::BadType),
    }
}

// ------------------------------------------------------------------------------------------------
// Arithmetic
// ------------------------------------------------------------------------------------------------

fn eval_arith(op: ArithOp, l: Value, r: Value) -> Value {
    if l.is_bad_null() {
        return l;
    }
    if r.is_bad_null() {
        return r;
    }
    if l.is_null() || r.is_null() {
        return Value::NULL;
    }
    if l.is_empty() || r.is_empty() {
        return Value::Empty;
    }

    match (op, &l, &r) {
        (ArithOp::Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b)),
        (ArithOp::Sub, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b)),
        (ArithOp::Mul, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b)),
        (ArithOp::Div, Value::Int(_), Value::Int(0)) => Value::DIV_BY_ZERO,
        (ArithOp::Div, Value::Int(a), Value::Int(b)) => checked(a.checked_div(*b)),
        (ArithOp::Mod, Value::Int(_), Value::Int(0)) => Value::DIV_BY_ZERO,
        (ArithOp::Mod, Value::Int(a), Value::Int(b)) => checked(a.checked_rem(*b)),

        (ArithOp::Div, _, Value::Float(b)) if *b == 0.0 => Value::DIV_BY_ZERO,
        (ArithOp::Mod, _, Value::Float(b)) if *b == 0.0 => Value::DIV_BY_ZERO,
        (ArithOp::Div, Value::Float(_) | Value::Int(_), Value::Int(0)) => Value::DIV_BY_ZERO,
        (op, Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            let a = as_f64(&l);
            let b = as_f64(&r);
            let out = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Mod => a % b,
            };
            Value::Float(out)
        }

        (ArithOp::Add, Value::Str(a), Value::Str(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Value::Str(out)
        }

        _ => Value::Null(NullKind::BadType),
    }
}

fn checked(result: Option<i64>) -> Value {
    match result {
        Some(v) => Value::Int(v),
        None => Value::Null(NullKind::Overflow),
    }
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

// ------------------------------------------------------------------------------------------------
// Comparison
// ------------------------------------------------------------------------------------------------

fn eval_cmp(op: CmpOp, l: Value, r: Value) -> Value {
    if l.is_bad_null() {
        return l;
    }
    if r.is_bad_null() {
        return r;
    }
    if l.is_null() || r.is_null() {
        return Value::NULL;
    }
    if l.is_empty() || r.is_empty() {
        return Value::Empty;
    }

    // Equality is defined for every pair of same-shaped values.
    match op {
        CmpOp::Eq => return Value::Bool(l == r),
        CmpOp::Ne => return Value::Bool(l != r),
        _ => {}
    }

    let ordering = match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        _ => None,
    };

    let Some(ordering) = ordering else {
        return Value::Null(NullKind::BadType);
    };

    let out = match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
        CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
    };
    Value::Bool(out)
}
