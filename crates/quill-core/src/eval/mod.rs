//! Eager evaluation of closed sub-trees.
//!
//! A sub-tree is closed when it reads neither a lambda parameter nor the
//! data source. Only closed sub-trees built from constants, operators,
//! conversions, record/list construction, and known builtins are evaluable;
//! everything else is left for the translator.

mod builtin;

use crate::{
    expr::{BinaryOp, Call, CallOwner, Expr, UnaryOp},
    value::{Value, ValueKind},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// EvalError
///
/// Failure raised while evaluating a closed sub-tree. Carried as the cause of
/// the compile fault; never swallowed into a default value.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EvalError {
    #[error("integer overflow in '{op}'")]
    Overflow { op: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("null reference reading '{member}'")]
    NullReference { member: String },

    #[error("value has no member '{member}'")]
    MissingMember { member: String },

    #[error("record declares member '{member}' more than once")]
    DuplicateMember { member: String },

    #[error("operator '{op}' is not defined for {found}")]
    TypeMismatch { op: String, found: String },

    #[error("cannot convert {value} to {to}")]
    InvalidConversion { value: String, to: ValueKind },

    #[error("builtin '{name}' expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{what} cannot be evaluated eagerly")]
    NotEvaluable { what: String },
}

impl EvalError {
    fn mismatch(op: impl ToString, values: &[&Value]) -> Self {
        let found = values
            .iter()
            .map(|v| v.kind().to_string())
            .collect::<Vec<_>>()
            .join(" and ");

        Self::TypeMismatch {
            op: op.to_string(),
            found,
        }
    }
}

///
/// EvaluableFilter
///
/// Opt-out hook for partial evaluation. Structural rules (no parameters, no
/// data source, known builtins only) always apply; a filter can only narrow
/// them further.
///

pub trait EvaluableFilter {
    fn is_evaluable_call(&self, call: &Call) -> bool {
        let _ = call;
        true
    }

    fn is_evaluable_member(&self, target: &Expr, member: &str) -> bool {
        let _ = (target, member);
        true
    }
}

///
/// AllowAll
/// Filter that narrows nothing.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl EvaluableFilter for AllowAll {}

/// True if `expr` is closed and built only from evaluable node kinds.
#[must_use]
pub fn is_evaluable(expr: &Expr, filter: &dyn EvaluableFilter) -> bool {
    match expr {
        Expr::Constant(_) => true,

        Expr::Parameter(_)
        | Expr::Source(_)
        | Expr::Lambda(_)
        | Expr::Quote(_)
        | Expr::Invoke { .. } => false,

        Expr::Member { target, member } => {
            filter.is_evaluable_member(target, member) && is_evaluable(target, filter)
        }

        Expr::Call(call) => {
            call.owner == CallOwner::Builtin
                && builtin::is_known(&call.method)
                && filter.is_evaluable_call(call)
                && is_evaluable(&call.receiver, filter)
                && call.args.iter().all(|arg| is_evaluable(arg, filter))
        }

        _ => {
            let mut evaluable = true;
            expr.for_each_child(|child| evaluable &= is_evaluable(child, filter));
            evaluable
        }
    }
}

/// Evaluate a closed sub-tree to a value.
pub fn evaluate(expr: &Expr) -> Result<Value, EvalError> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),

        Expr::Parameter(name) => Err(not_evaluable(format!("parameter '{name}'"))),
        Expr::Source(source) => Err(not_evaluable(format!("data source '{}'", source.name))),
        Expr::Lambda(_) | Expr::Quote(_) => Err(not_evaluable("lambda")),
        Expr::Invoke { .. } => Err(not_evaluable("lambda invocation")),

        Expr::Member { target, member } => match evaluate(target)? {
            Value::Null => Err(EvalError::NullReference {
                member: member.clone(),
            }),
            value => value
                .field(member)
                .cloned()
                .ok_or_else(|| EvalError::MissingMember {
                    member: member.clone(),
                }),
        },

        Expr::Unary { op, operand } => unary(*op, evaluate(operand)?),

        Expr::Binary { op, left, right } => binary(*op, left, right),

        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => match evaluate(test)? {
            Value::Bool(true) => evaluate(if_true),
            Value::Bool(false) => evaluate(if_false),
            other => Err(EvalError::mismatch("?:", &[&other])),
        },

        Expr::Convert { operand, kind } => convert(evaluate(operand)?, *kind),

        Expr::Record(fields) => record(fields),

        Expr::List(items) => items
            .iter()
            .map(evaluate)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        Expr::Call(call) => {
            if call.owner != CallOwner::Builtin {
                return Err(not_evaluable(format!("{} call '{}'", call.owner, call.method)));
            }
            let receiver = evaluate(&call.receiver)?;
            let args = call.args.iter().map(evaluate).collect::<Result<Vec<_>, _>>()?;

            builtin::call(&call.method, receiver, &args)
        }
    }
}

// Fields keep declaration order; a repeated name would be silently dropped
// by any keyed consumer, so it is rejected.
fn record(fields: &[(String, Expr)]) -> Result<Value, EvalError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(fields.len());

    for (name, value) in fields {
        if !seen.insert(name.as_str()) {
            return Err(EvalError::DuplicateMember {
                member: name.clone(),
            });
        }
        out.push((name.clone(), evaluate(value)?));
    }

    Ok(Value::Record(out))
}

fn not_evaluable(what: impl Into<String>) -> EvalError {
    EvalError::NotEvaluable { what: what.into() }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(n)) => {
            n.checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow {
                    op: op.to_string(),
                })
        }
        (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
        (op, other) => Err(EvalError::mismatch(op, &[&other])),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
    // short-circuiting operators evaluate the right side lazily
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = evaluate(left)?;
            let Value::Bool(lb) = l else {
                return Err(EvalError::mismatch(op, &[&l]));
            };
            if (op == BinaryOp::And && !lb) || (op == BinaryOp::Or && lb) {
                return Ok(Value::Bool(lb));
            }
            let r = evaluate(right)?;
            return match r {
                Value::Bool(rb) => Ok(Value::Bool(rb)),
                other => Err(EvalError::mismatch(op, &[&l, &other])),
            };
        }
        BinaryOp::Coalesce => {
            let l = evaluate(left)?;
            return if l.is_null() { evaluate(right) } else { Ok(l) };
        }
        _ => {}
    }

    let l = evaluate(left)?;
    let r = evaluate(right)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        BinaryOp::Ne => Ok(Value::Bool(!l.loose_eq(&r))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => compare(op, &l, &r),
        _ => arithmetic(op, l, r),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    // lifted comparison: any null operand yields false
    if l.is_null() || r.is_null() {
        return Ok(Value::Bool(false));
    }
    let ord = l
        .compare(r)
        .ok_or_else(|| EvalError::mismatch(op, &[l, r]))?;

    let result = match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::Lte => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        _ => ord.is_ge(),
    };

    Ok(Value::Bool(result))
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(format!("{a}{b}"))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => float_arithmetic(op, a, b),
            _ => Err(EvalError::mismatch(op, &[&l, &r])),
        },
    }
}

// Folded floats must stay finite: infinities and NaN do not survive
// serialization of the model.
#[expect(clippy::float_cmp)]
fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => {
            return Err(EvalError::mismatch(
                op,
                &[&Value::Float(a), &Value::Float(b)],
            ));
        }
    };

    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(EvalError::Overflow {
            op: op.to_string(),
        })
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => {
            return Err(EvalError::mismatch(op, &[&Value::Int(a), &Value::Int(b)]));
        }
    };

    result.map(Value::Int).ok_or_else(|| EvalError::Overflow {
        op: op.to_string(),
    })
}

/// Convert a value to `kind`, failing instead of losing information.
pub fn convert(value: Value, kind: ValueKind) -> Result<Value, EvalError> {
    if kind == ValueKind::Any || value.is_null() || value.kind() == kind {
        return Ok(value);
    }

    let converted = match (&value, kind) {
        (Value::Float(x), ValueKind::Int) => float_to_int(*x),
        (Value::Text(s), ValueKind::Int) => s.trim().parse().ok().map(Value::Int),
        (Value::Int(_), ValueKind::Float) => value.as_f64().map(Value::Float),
        (Value::Text(s), ValueKind::Float) => s.trim().parse().ok().map(Value::Float),
        (Value::Text(s), ValueKind::Bool) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (Value::Bool(b), ValueKind::Text) => Some(Value::Text(b.to_string())),
        (Value::Int(n), ValueKind::Text) => Some(Value::Text(n.to_string())),
        (Value::Float(x), ValueKind::Text) => Some(Value::Text(x.to_string())),
        _ => None,
    };

    converted.ok_or_else(|| EvalError::InvalidConversion {
        value: value.to_string(),
        to: kind,
    })
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn float_to_int(x: f64) -> Option<Value> {
    let in_range = x >= i64::MIN as f64 && x < i64::MAX as f64;
    (x.fract() == 0.0 && in_range).then(|| Value::Int(x as i64))
}
