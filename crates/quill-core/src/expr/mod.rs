//! Host query expression tree.
//!
//! A closed sum type over node kinds. The compiler only ever reads a
//! caller's tree; rewrites produce new trees and share unchanged sub-trees
//! through `Cow`.

mod build;
mod display;

use crate::value::{Value, ValueKind};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeSet};

pub use build::{Queryable, Setters, lambda, lit, param};

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum UnaryOp {
    #[display("!")]
    Not,
    #[display("-")]
    Negate,
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum BinaryOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Rem,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Lte,
    #[display(">")]
    Gt,
    #[display(">=")]
    Gte,
    #[display("&&")]
    And,
    #[display("||")]
    Or,
    #[display("??")]
    Coalesce,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Lte | Self::Gt | Self::Gte
        )
    }

    /// Operator that yields the same result with operands swapped.
    #[must_use]
    pub const fn mirrored(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Eq),
            Self::Ne => Some(Self::Ne),
            Self::Lt => Some(Self::Gt),
            Self::Lte => Some(Self::Gte),
            Self::Gt => Some(Self::Lt),
            Self::Gte => Some(Self::Lte),
            _ => None,
        }
    }

    /// Logical complement that holds under null-lifted comparison.
    ///
    /// Only equality has one: `!(a < b)` and `a >= b` disagree when either
    /// side is null.
    #[must_use]
    pub const fn negated(self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::Ne),
            Self::Ne => Some(Self::Eq),
            _ => None,
        }
    }
}

///
/// CallOwner
///
/// Operation family a call belongs to. Query families are recognized by the
/// registry; `Builtin` calls are pure scalar functions the evaluator knows;
/// `Host` calls are opaque.
///

#[derive(Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum CallOwner {
    #[display("queryable")]
    Queryable,
    #[display("dml")]
    Dml,
    #[display("update")]
    Update,
    #[display("builtin")]
    Builtin,
    #[display("host:{_0}")]
    Host(String),
}

impl CallOwner {
    /// True for families whose calls form the query chain.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Queryable | Self::Dml)
    }
}

///
/// SourceRef
/// Reference to the queried data source; the query's live input.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SourceRef {
    pub name: String,
}

impl SourceRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

///
/// Lambda
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Box<Expr>,
}

impl Lambda {
    #[must_use]
    pub fn new(params: Vec<String>, body: Expr) -> Self {
        Self {
            params,
            body: Box::new(body),
        }
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.params.len()
    }
}

///
/// Call
/// An operation applied to a receiver sub-tree plus argument sub-trees.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Call {
    pub owner: CallOwner,
    pub method: String,
    pub receiver: Box<Expr>,
    pub args: Vec<Expr>,
}

///
/// Expr
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Expr {
    Constant(Value),
    Parameter(String),
    Source(SourceRef),
    Member {
        target: Box<Self>,
        member: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Self>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Conditional {
        test: Box<Self>,
        if_true: Box<Self>,
        if_false: Box<Self>,
    },
    Convert {
        operand: Box<Self>,
        kind: ValueKind,
    },
    Quote(Box<Self>),
    Lambda(Lambda),
    Invoke {
        lambda: Box<Self>,
        args: Vec<Self>,
    },
    Record(Vec<(String, Self)>),
    List(Vec<Self>),
    Call(Call),
}

impl Expr {
    #[must_use]
    pub const fn as_constant(&self) -> Option<&Value> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// The lambda under at most one quote.
    #[must_use]
    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Self::Lambda(lambda) => Some(lambda),
            Self::Quote(inner) => match inner.as_ref() {
                Self::Lambda(lambda) => Some(lambda),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_call(&self) -> Option<&Call> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Rebuild this node from rewritten children.
    ///
    /// Children that come back `Cow::Borrowed` are shared; the node itself is
    /// cloned only when at least one child changed.
    pub fn map_children<'a, E>(
        &'a self,
        mut f: impl FnMut(&'a Self) -> Result<Cow<'a, Self>, E>,
    ) -> Result<Cow<'a, Self>, E> {
        let rebuilt = match self {
            Self::Constant(_) | Self::Parameter(_) | Self::Source(_) => None,

            Self::Member { target, member } => match f(target)? {
                Cow::Owned(target) => Some(Self::Member {
                    target: Box::new(target),
                    member: member.clone(),
                }),
                Cow::Borrowed(_) => None,
            },

            Self::Unary { op, operand } => match f(operand)? {
                Cow::Owned(operand) => Some(Self::Unary {
                    op: *op,
                    operand: Box::new(operand),
                }),
                Cow::Borrowed(_) => None,
            },

            Self::Binary { op, left, right } => {
                let l = f(left)?;
                let r = f(right)?;
                if matches!((&l, &r), (Cow::Borrowed(_), Cow::Borrowed(_))) {
                    None
                } else {
                    Some(Self::Binary {
                        op: *op,
                        left: Box::new(l.into_owned()),
                        right: Box::new(r.into_owned()),
                    })
                }
            }

            Self::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let t = f(test)?;
                let a = f(if_true)?;
                let b = f(if_false)?;
                if matches!(
                    (&t, &a, &b),
                    (Cow::Borrowed(_), Cow::Borrowed(_), Cow::Borrowed(_))
                ) {
                    None
                } else {
                    Some(Self::Conditional {
                        test: Box::new(t.into_owned()),
                        if_true: Box::new(a.into_owned()),
                        if_false: Box::new(b.into_owned()),
                    })
                }
            }

            Self::Convert { operand, kind } => match f(operand)? {
                Cow::Owned(operand) => Some(Self::Convert {
                    operand: Box::new(operand),
                    kind: *kind,
                }),
                Cow::Borrowed(_) => None,
            },

            Self::Quote(inner) => match f(inner)? {
                Cow::Owned(inner) => Some(Self::Quote(Box::new(inner))),
                Cow::Borrowed(_) => None,
            },

            Self::Lambda(lambda) => match f(&lambda.body)? {
                Cow::Owned(body) => Some(Self::Lambda(Lambda::new(lambda.params.clone(), body))),
                Cow::Borrowed(_) => None,
            },

            Self::Invoke { lambda, args } => {
                let l = f(lambda)?;
                let mapped = map_all(args, &mut f)?;
                match (l, mapped) {
                    (Cow::Borrowed(_), None) => None,
                    (l, mapped) => Some(Self::Invoke {
                        lambda: Box::new(l.into_owned()),
                        args: mapped.unwrap_or_else(|| args.clone()),
                    }),
                }
            }

            Self::Record(fields) => {
                let mut changed = false;
                let mut out = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    let value = f(value)?;
                    changed |= matches!(value, Cow::Owned(_));
                    out.push((name.clone(), value.into_owned()));
                }
                changed.then_some(Self::Record(out))
            }

            Self::List(items) => map_all(items, &mut f)?.map(Self::List),

            Self::Call(call) => {
                let receiver = f(&call.receiver)?;
                let mapped = map_all(&call.args, &mut f)?;
                match (receiver, mapped) {
                    (Cow::Borrowed(_), None) => None,
                    (receiver, mapped) => Some(Self::Call(Call {
                        owner: call.owner.clone(),
                        method: call.method.clone(),
                        receiver: Box::new(receiver.into_owned()),
                        args: mapped.unwrap_or_else(|| call.args.clone()),
                    })),
                }
            }
        };

        Ok(rebuilt.map_or(Cow::Borrowed(self), Cow::Owned))
    }

    /// Visit direct children in evaluation order.
    pub fn for_each_child(&self, mut f: impl FnMut(&Self)) {
        match self {
            Self::Constant(_) | Self::Parameter(_) | Self::Source(_) => {}
            Self::Member { target, .. } => f(target),
            Self::Unary { operand, .. } | Self::Convert { operand, .. } => f(operand),
            Self::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            Self::Conditional {
                test,
                if_true,
                if_false,
            } => {
                f(test);
                f(if_true);
                f(if_false);
            }
            Self::Quote(inner) => f(inner),
            Self::Lambda(lambda) => f(&lambda.body),
            Self::Invoke { lambda, args } => {
                f(lambda);
                args.iter().for_each(f);
            }
            Self::Record(fields) => fields.iter().for_each(|(_, value)| f(value)),
            Self::List(items) => items.iter().for_each(f),
            Self::Call(call) => {
                f(&call.receiver);
                call.args.iter().for_each(f);
            }
        }
    }

    /// Parameter names referenced but not bound within this sub-tree.
    #[must_use]
    pub fn free_params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_free(self, &mut Vec::new(), &mut out);
        out
    }

    /// Parameter names bound by any lambda within this sub-tree.
    #[must_use]
    pub fn bound_params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        collect_bound(self, &mut out);
        out
    }

    /// True if the sub-tree reads the query's data source.
    #[must_use]
    pub fn references_source(&self) -> bool {
        if matches!(self, Self::Source(_)) {
            return true;
        }
        let mut found = false;
        self.for_each_child(|child| found |= child.references_source());
        found
    }

    /// Replace free occurrences of `name` with `replacement`.
    ///
    /// Stops at lambdas that rebind `name`. Callers guarantee `replacement`
    /// has no free parameter captured by a lambda in `self`.
    #[must_use]
    pub fn substitute(&self, name: &str, replacement: &Self) -> Self {
        match self {
            Self::Parameter(p) if p == name => replacement.clone(),
            Self::Lambda(lambda) if lambda.params.iter().any(|p| p == name) => self.clone(),
            _ if !self.free_params().contains(name) => self.clone(),
            _ => {
                let rewritten: Result<Cow<'_, Self>, std::convert::Infallible> = self
                    .map_children(|child| Ok(Cow::Owned(child.substitute(name, replacement))));
                match rewritten {
                    Ok(expr) => expr.into_owned(),
                    Err(never) => match never {},
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl From<Lambda> for Expr {
    fn from(lambda: Lambda) -> Self {
        Self::Lambda(lambda)
    }
}

impl From<Call> for Expr {
    fn from(call: Call) -> Self {
        Self::Call(call)
    }
}

// Map a child slice; `None` when every child came back borrowed.
fn map_all<'a, E>(
    items: &'a [Expr],
    f: &mut impl FnMut(&'a Expr) -> Result<Cow<'a, Expr>, E>,
) -> Result<Option<Vec<Expr>>, E> {
    let mapped = items.iter().map(|item| f(item)).collect::<Result<Vec<_>, _>>()?;
    if mapped.iter().all(|item| matches!(item, Cow::Borrowed(_))) {
        return Ok(None);
    }

    Ok(Some(mapped.into_iter().map(Cow::into_owned).collect()))
}

fn collect_free(expr: &Expr, scope: &mut Vec<String>, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Parameter(name) => {
            if !scope.iter().any(|bound| bound == name) {
                out.insert(name.clone());
            }
        }
        Expr::Lambda(lambda) => {
            let depth = scope.len();
            scope.extend(lambda.params.iter().cloned());
            collect_free(&lambda.body, scope, out);
            scope.truncate(depth);
        }
        _ => expr.for_each_child(|child| collect_free(child, scope, out)),
    }
}

fn collect_bound(expr: &Expr, out: &mut BTreeSet<String>) {
    if let Expr::Lambda(lambda) = expr {
        out.extend(lambda.params.iter().cloned());
    }
    expr.for_each_child(|child| collect_bound(child, out));
}
