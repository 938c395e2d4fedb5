use crate::{
    expr::{BinaryOp, Call, CallOwner, Expr, Lambda, SourceRef, UnaryOp},
    value::{Value, ValueKind},
};

/// Literal constant.
#[must_use]
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// Reference to a lambda-bound parameter.
#[must_use]
pub fn param(name: impl Into<String>) -> Expr {
    Expr::Parameter(name.into())
}

/// Lambda abstraction over named parameters.
#[must_use]
pub fn lambda(params: &[&str], body: Expr) -> Expr {
    Expr::Lambda(Lambda::new(
        params.iter().map(ToString::to_string).collect(),
        body,
    ))
}

///
/// Operand helpers
///
/// Combinators for predicate and selector bodies. They consume `self`, so
/// they read like the host's operator syntax: `param("x").member("age").gt(30)`.
///

#[allow(clippy::should_implement_trait)]
impl Expr {
    #[must_use]
    pub fn source(name: impl Into<String>) -> Self {
        Self::Source(SourceRef::new(name))
    }

    #[must_use]
    pub fn member(self, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            member: name.into(),
        }
    }

    #[must_use]
    pub fn binary(self, op: BinaryOp, rhs: impl Into<Self>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    #[must_use]
    pub fn eq(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    #[must_use]
    pub fn ne(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    #[must_use]
    pub fn lt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    #[must_use]
    pub fn lte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lte, rhs)
    }

    #[must_use]
    pub fn gt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    #[must_use]
    pub fn gte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gte, rhs)
    }

    #[must_use]
    pub fn and(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    #[must_use]
    pub fn or(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    #[must_use]
    pub fn add(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    #[must_use]
    pub fn sub(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Sub, rhs)
    }

    #[must_use]
    pub fn mul(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Mul, rhs)
    }

    #[must_use]
    pub fn div(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Div, rhs)
    }

    #[must_use]
    pub fn rem(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Rem, rhs)
    }

    #[must_use]
    pub fn coalesce(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Coalesce, rhs)
    }

    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    #[must_use]
    pub fn neg(self) -> Self {
        Self::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    #[must_use]
    pub fn convert(self, kind: ValueKind) -> Self {
        Self::Convert {
            operand: Box::new(self),
            kind,
        }
    }

    #[must_use]
    pub fn quote(self) -> Self {
        Self::Quote(Box::new(self))
    }

    #[must_use]
    pub fn invoke(self, args: Vec<Self>) -> Self {
        Self::Invoke {
            lambda: Box::new(self),
            args,
        }
    }

    #[must_use]
    pub fn if_else(self, if_true: impl Into<Self>, if_false: impl Into<Self>) -> Self {
        Self::Conditional {
            test: Box::new(self),
            if_true: Box::new(if_true.into()),
            if_false: Box::new(if_false.into()),
        }
    }

    /// Call on `self` as receiver.
    #[must_use]
    pub fn call(self, owner: CallOwner, method: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call(Call {
            owner,
            method: method.into(),
            receiver: Box::new(self),
            args,
        })
    }

    /// Pure scalar function known to the evaluator (`len`, `upper`, ...).
    #[must_use]
    pub fn builtin(self, method: impl Into<String>, args: Vec<Self>) -> Self {
        self.call(CallOwner::Builtin, method, args)
    }

    /// Opaque host function; never folded.
    #[must_use]
    pub fn host(
        self,
        library: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Self>,
    ) -> Self {
        self.call(CallOwner::Host(library.into()), method, args)
    }

    #[must_use]
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub const fn list(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        lit(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        lit(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        lit(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        lit(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        lit(value)
    }
}

///
/// Queryable
///
/// Fluent chain builder producing the call tree a host query provider hands
/// to the compiler. Lambda arguments are quoted, as host providers do.
/// Chain operations return `Self`; terminal operations return the finished
/// [`Expr`].
///

#[derive(Clone, Debug, PartialEq)]
pub struct Queryable {
    expr: Expr,
}

impl Queryable {
    /// Start a chain at a named data source.
    #[must_use]
    pub fn source(name: impl Into<String>) -> Self {
        Self {
            expr: Expr::source(name),
        }
    }

    /// Start a chain at an arbitrary sequence expression.
    #[must_use]
    pub const fn over(expr: Expr) -> Self {
        Self { expr }
    }

    /// Append a standard query operator call.
    #[must_use]
    pub fn call(self, method: &str, args: Vec<Expr>) -> Self {
        Self {
            expr: self.expr.call(CallOwner::Queryable, method, args),
        }
    }

    fn terminal(self, owner: CallOwner, method: &str, args: Vec<Expr>) -> Expr {
        self.expr.call(owner, method, args)
    }

    #[must_use]
    pub fn filter(self, predicate: Expr) -> Self {
        self.call("filter", vec![predicate.quote()])
    }

    #[must_use]
    pub fn select(self, selector: Expr) -> Self {
        self.call("select", vec![selector.quote()])
    }

    #[must_use]
    pub fn order_by(self, key: Expr) -> Self {
        self.call("order_by", vec![key.quote()])
    }

    #[must_use]
    pub fn order_by_desc(self, key: Expr) -> Self {
        self.call("order_by_desc", vec![key.quote()])
    }

    #[must_use]
    pub fn then_by(self, key: Expr) -> Self {
        self.call("then_by", vec![key.quote()])
    }

    #[must_use]
    pub fn then_by_desc(self, key: Expr) -> Self {
        self.call("then_by_desc", vec![key.quote()])
    }

    #[must_use]
    pub fn skip(self, count: impl Into<Expr>) -> Self {
        self.call("skip", vec![count.into()])
    }

    #[must_use]
    pub fn take(self, count: impl Into<Expr>) -> Self {
        self.call("take", vec![count.into()])
    }

    #[must_use]
    pub fn distinct(self) -> Self {
        self.call("distinct", Vec::new())
    }

    #[must_use]
    pub fn group_by(self, key: Expr) -> Self {
        self.call("group_by", vec![key.quote()])
    }

    #[must_use]
    pub fn join(self, inner: Self, outer_key: Expr, inner_key: Expr, result: Expr) -> Self {
        self.call(
            "join",
            vec![
                inner.into_expr(),
                outer_key.quote(),
                inner_key.quote(),
                result.quote(),
            ],
        )
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.call("union", vec![other.into_expr()])
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        self.call("intersect", vec![other.into_expr()])
    }

    #[must_use]
    pub fn except(self, other: Self) -> Self {
        self.call("except", vec![other.into_expr()])
    }

    // terminal operators

    #[must_use]
    pub fn count(self) -> Expr {
        self.terminal(CallOwner::Queryable, "count", Vec::new())
    }

    #[must_use]
    pub fn count_where(self, predicate: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "count", vec![predicate.quote()])
    }

    #[must_use]
    pub fn any(self) -> Expr {
        self.terminal(CallOwner::Queryable, "any", Vec::new())
    }

    #[must_use]
    pub fn any_where(self, predicate: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "any", vec![predicate.quote()])
    }

    #[must_use]
    pub fn all(self, predicate: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "all", vec![predicate.quote()])
    }

    #[must_use]
    pub fn first(self) -> Expr {
        self.terminal(CallOwner::Queryable, "first", Vec::new())
    }

    #[must_use]
    pub fn first_where(self, predicate: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "first", vec![predicate.quote()])
    }

    #[must_use]
    pub fn first_or_default(self) -> Expr {
        self.terminal(CallOwner::Queryable, "first_or_default", Vec::new())
    }

    #[must_use]
    pub fn single(self) -> Expr {
        self.terminal(CallOwner::Queryable, "single", Vec::new())
    }

    #[must_use]
    pub fn single_or_default(self) -> Expr {
        self.terminal(CallOwner::Queryable, "single_or_default", Vec::new())
    }

    #[must_use]
    pub fn last(self) -> Expr {
        self.terminal(CallOwner::Queryable, "last", Vec::new())
    }

    #[must_use]
    pub fn sum(self, selector: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "sum", vec![selector.quote()])
    }

    #[must_use]
    pub fn min(self, selector: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "min", vec![selector.quote()])
    }

    #[must_use]
    pub fn max(self, selector: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "max", vec![selector.quote()])
    }

    #[must_use]
    pub fn average(self, selector: Expr) -> Expr {
        self.terminal(CallOwner::Queryable, "average", vec![selector.quote()])
    }

    #[must_use]
    pub fn contains(self, item: impl Into<Expr>) -> Expr {
        self.terminal(CallOwner::Queryable, "contains", vec![item.into()])
    }

    /// Bulk delete of every row in the chain.
    #[must_use]
    pub fn delete_all(self) -> Expr {
        self.terminal(CallOwner::Dml, "delete_all", Vec::new())
    }

    /// Bulk delete of the rows matching `predicate`.
    #[must_use]
    pub fn delete_where(self, predicate: Expr) -> Expr {
        self.terminal(CallOwner::Dml, "delete_all", vec![predicate.quote()])
    }

    /// Bulk update applying the setter chain to every row in the chain.
    #[must_use]
    pub fn update_all(self, setters: Setters) -> Expr {
        self.terminal(CallOwner::Dml, "update_all", vec![setters.into_lambda().quote()])
    }

    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    #[must_use]
    pub const fn as_expr(&self) -> &Expr {
        &self.expr
    }
}

impl From<Queryable> for Expr {
    fn from(query: Queryable) -> Self {
        query.into_expr()
    }
}

///
/// Setters
///
/// Update descriptor: `d => d.set(p => p.a, v1).set(p => p.b, v2)`.
/// A value is either a plain operand or a lambda over the current row.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Setters {
    descriptor: Expr,
}

impl Setters {
    pub(crate) const DESCRIPTOR: &'static str = "__setters";

    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: param(Self::DESCRIPTOR),
        }
    }

    #[must_use]
    pub fn set(self, selector: Expr, value: impl Into<Expr>) -> Self {
        let value = value.into();
        let value = if value.as_lambda().is_some() {
            value.quote()
        } else {
            value
        };

        Self {
            descriptor: self
                .descriptor
                .call(CallOwner::Update, "set", vec![selector.quote(), value]),
        }
    }

    #[must_use]
    pub fn into_lambda(self) -> Expr {
        lambda(&[Self::DESCRIPTOR], self.descriptor)
    }
}

impl Default for Setters {
    fn default() -> Self {
        Self::new()
    }
}
