//! Structural normalization.
//!
//! Rewrites semantically identical surface variants into one canonical
//! shape so the registry needs one call shape per logical operation.

use crate::{
    compiler::CompileError,
    expr::{BinaryOp, CallOwner, Expr, UnaryOp},
    rewrite::TreePass,
    value::ValueKind,
};
use std::{borrow::Cow, convert::Infallible};
use tracing::trace;

///
/// RewriteRule
///
/// Local rewrite of a single node. `None` means the rule does not apply.
/// A rule must never produce a node another rule rewrites back.
///

pub trait RewriteRule {
    fn name(&self) -> &'static str;

    fn rewrite(&self, expr: &Expr) -> Option<Expr>;
}

///
/// Normalization
/// Applies its rules bottom-up, in list order at each node.
///

pub struct Normalization {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl Normalization {
    #[must_use]
    pub fn new(rules: Vec<Box<dyn RewriteRule>>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(StripQuote),
            Box::new(CollapseConvert),
            Box::new(InlineInvoke),
            Box::new(CanonicalAlias),
            Box::new(LowerPredicateOverload),
            Box::new(ConstantOnRight),
            Box::new(SimplifyNot),
        ])
    }

    fn normalize<'a>(&self, expr: &'a Expr) -> Cow<'a, Expr> {
        let Ok(mut current) =
            expr.map_children(|child| Ok::<_, Infallible>(self.normalize(child)));

        for rule in &self.rules {
            if let Some(next) = rule.rewrite(&current) {
                trace!(rule = rule.name(), "normalization rule applied");
                current = Cow::Owned(next);
            }
        }

        current
    }
}

impl TreePass for Normalization {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn apply<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError> {
        Ok(self.normalize(expr))
    }
}

///
/// StripQuote
/// `Quote(x)` becomes `x`; recognition treats quoted and bare lambdas alike.
///

pub struct StripQuote;

impl RewriteRule for StripQuote {
    fn name(&self) -> &'static str {
        "strip_quote"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Quote(inner) => Some(inner.as_ref().clone()),
            _ => None,
        }
    }
}

///
/// CollapseConvert
///

pub struct CollapseConvert;

impl RewriteRule for CollapseConvert {
    fn name(&self) -> &'static str {
        "collapse_convert"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let Expr::Convert { operand, kind } = expr else {
            return None;
        };

        match operand.as_ref() {
            _ if *kind == ValueKind::Any => Some(operand.as_ref().clone()),
            Expr::Convert { kind: inner, .. } if inner == kind => Some(operand.as_ref().clone()),
            _ => None,
        }
    }
}

///
/// InlineInvoke
/// Beta-reduces an invocation of a literal lambda.
///

pub struct InlineInvoke;

impl RewriteRule for InlineInvoke {
    fn name(&self) -> &'static str {
        "inline_invoke"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let Expr::Invoke { lambda, args } = expr else {
            return None;
        };
        let lambda = lambda.as_lambda()?;
        if lambda.arity() != args.len() {
            return None;
        }

        // substitution is one parameter at a time, so an argument must not
        // mention a parameter substituted after it or a name bound in the body
        let bound = lambda.body.bound_params();
        for arg in args {
            let free = arg.free_params();
            if free.iter().any(|name| bound.contains(name)) {
                return None;
            }
            if args.len() > 1 && lambda.params.iter().any(|p| free.contains(p)) {
                return None;
            }
        }

        let body = lambda
            .params
            .iter()
            .zip(args)
            .fold(lambda.body.as_ref().clone(), |body, (param, arg)| {
                body.substitute(param, arg)
            });

        Some(body)
    }
}

///
/// CanonicalAlias
/// Renames alias spellings of standard operators.
///

pub struct CanonicalAlias;

impl CanonicalAlias {
    const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("where", "filter"),
        ("map", "select"),
        ("limit", "take"),
        ("offset", "skip"),
        ("order_by_descending", "order_by_desc"),
        ("then_by_descending", "then_by_desc"),
    ];
}

impl RewriteRule for CanonicalAlias {
    fn name(&self) -> &'static str {
        "canonical_alias"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let call = expr.as_call().filter(|c| c.owner == CallOwner::Queryable)?;
        let (_, canonical) = Self::ALIASES
            .iter()
            .find(|(alias, _)| *alias == call.method)?;

        let mut call = call.clone();
        call.method = (*canonical).to_string();

        Some(Expr::Call(call))
    }
}

///
/// LowerPredicateOverload
/// `q.count(p)` becomes `q.filter(p).count()`, and likewise for the other
/// element and count operators.
///

pub struct LowerPredicateOverload;

impl LowerPredicateOverload {
    const OPERATORS: &'static [&'static str] = &[
        "count",
        "long_count",
        "any",
        "first",
        "first_or_default",
        "single",
        "single_or_default",
        "last",
    ];
}

impl RewriteRule for LowerPredicateOverload {
    fn name(&self) -> &'static str {
        "lower_predicate_overload"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let call = expr.as_call().filter(|c| c.owner == CallOwner::Queryable)?;
        if !Self::OPERATORS.contains(&call.method.as_str()) {
            return None;
        }
        let [predicate] = call.args.as_slice() else {
            return None;
        };
        if predicate.as_lambda().map(|l| l.arity()) != Some(1) {
            return None;
        }

        let filtered = call.receiver.as_ref().clone().call(
            CallOwner::Queryable,
            "filter",
            vec![predicate.clone()],
        );

        Some(filtered.call(CallOwner::Queryable, call.method.clone(), Vec::new()))
    }
}

///
/// ConstantOnRight
/// `5 < x.age` becomes `x.age > 5`.
///

pub struct ConstantOnRight;

impl RewriteRule for ConstantOnRight {
    fn name(&self) -> &'static str {
        "constant_on_right"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let Expr::Binary { op, left, right } = expr else {
            return None;
        };
        if !matches!(left.as_ref(), Expr::Constant(_)) || matches!(right.as_ref(), Expr::Constant(_))
        {
            return None;
        }

        Some(Expr::Binary {
            op: op.mirrored()?,
            left: right.clone(),
            right: left.clone(),
        })
    }
}

///
/// SimplifyNot
///
/// Removes double negation over provably boolean operands and folds `!`
/// into equality. Ordering comparisons keep their `!`: with a null operand
/// both `a < b` and `a >= b` are false.
///

pub struct SimplifyNot;

impl RewriteRule for SimplifyNot {
    fn name(&self) -> &'static str {
        "simplify_not"
    }

    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        let Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } = expr
        else {
            return None;
        };

        match operand.as_ref() {
            Expr::Unary {
                op: UnaryOp::Not,
                operand: inner,
            } if is_boolean(inner) => Some(inner.as_ref().clone()),
            Expr::Binary { op, left, right } => Some(Expr::Binary {
                op: op.negated()?,
                left: left.clone(),
                right: right.clone(),
            }),
            _ => None,
        }
    }
}

// `!!e` only equals `e` when `e` cannot be anything but a boolean (or null,
// which `!` passes through); otherwise it would erase a type error.
fn is_boolean(expr: &Expr) -> bool {
    match expr {
        Expr::Constant(value) => value.as_bool().is_some(),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => true,
        Expr::Binary { op, .. } => op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or),
        _ => false,
    }
}
