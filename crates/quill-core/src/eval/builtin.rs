//! Pure scalar functions the evaluator can fold.

use crate::{eval::EvalError, value::Value};

const KNOWN: &[&str] = &[
    "abs",
    "concat",
    "contains",
    "ends_with",
    "len",
    "lower",
    "starts_with",
    "trim",
    "upper",
];

pub(super) fn is_known(name: &str) -> bool {
    KNOWN.contains(&name)
}

pub(super) fn call(name: &str, receiver: Value, args: &[Value]) -> Result<Value, EvalError> {
    if receiver.is_null() {
        return Err(EvalError::NullReference {
            member: name.to_string(),
        });
    }

    match name {
        "len" | "lower" | "upper" | "trim" | "abs" => {
            arity(name, args, 0)?;
            unary(name, receiver)
        }
        "contains" | "starts_with" | "ends_with" | "concat" => {
            arity(name, args, 1)?;
            with_arg(name, receiver, &args[0])
        }
        _ => Err(EvalError::NotEvaluable {
            what: format!("unknown builtin '{name}'"),
        }),
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            name: name.to_string(),
            expected,
            found: args.len(),
        })
    }
}

fn unary(name: &str, receiver: Value) -> Result<Value, EvalError> {
    match (name, &receiver) {
        ("len", Value::Text(s)) => length(name, s.chars().count()),
        ("len", Value::List(items)) => length(name, items.len()),
        ("lower", Value::Text(s)) => Ok(Value::Text(s.to_lowercase())),
        ("upper", Value::Text(s)) => Ok(Value::Text(s.to_uppercase())),
        ("trim", Value::Text(s)) => Ok(Value::Text(s.trim().to_string())),
        ("abs", Value::Int(n)) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow {
                op: name.to_string(),
            }),
        ("abs", Value::Float(x)) => Ok(Value::Float(x.abs())),
        _ => Err(EvalError::mismatch(name, &[&receiver])),
    }
}

fn with_arg(name: &str, receiver: Value, arg: &Value) -> Result<Value, EvalError> {
    match (name, &receiver, arg) {
        ("contains", Value::Text(s), Value::Text(p)) => Ok(Value::Bool(s.contains(p.as_str()))),
        ("contains", Value::List(items), item) => {
            Ok(Value::Bool(items.iter().any(|v| v.loose_eq(item))))
        }
        ("starts_with", Value::Text(s), Value::Text(p)) => {
            Ok(Value::Bool(s.starts_with(p.as_str())))
        }
        ("ends_with", Value::Text(s), Value::Text(p)) => Ok(Value::Bool(s.ends_with(p.as_str()))),
        ("concat", Value::Text(s), Value::Text(p)) => Ok(Value::Text(format!("{s}{p}"))),
        _ => Err(EvalError::mismatch(name, &[&receiver, arg])),
    }
}

fn length(name: &str, len: usize) -> Result<Value, EvalError> {
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| EvalError::Overflow {
            op: name.to_string(),
        })
}
