//! Query model: the compiler's output artifact.
//!
//! An ordered, immutable clause sequence in source-to-sink application
//! order, plus the terminal operation kind. Consumed by the translator that
//! lowers it to the database's query language.

mod explain;

use crate::{
    compiler::CompileError,
    expr::{Expr, Lambda},
};
use derive_more::Display;
use serde::Serialize;

///
/// QuerySource
/// Terminal node the recognition walk stopped at.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum QuerySource {
    /// A named data-source reference.
    Named(String),

    /// Any other sequence expression (typically a folded constant list).
    Inline(Expr),
}

///
/// QueryKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
pub enum QueryKind {
    /// Materialize the selected rows.
    #[display("select")]
    Select,

    /// Reduce to a single value or row (count, first, sum, ...).
    #[display("scalar")]
    Scalar,

    #[display("delete")]
    Delete,

    #[display("update")]
    Update,
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum OrderDirection {
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

///
/// SetOpKind
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum SetOpKind {
    #[display("union")]
    Union,
    #[display("intersect")]
    Intersect,
    #[display("except")]
    Except,
}

///
/// AggregateFn
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
pub enum AggregateFn {
    #[display("sum")]
    Sum,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
    #[display("average")]
    Average,
}

///
/// ResultOp
/// Terminal reduction applied to the sequence.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ResultOp {
    Count,
    LongCount,
    Any,
    All { predicate: Lambda },
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    Aggregate { func: AggregateFn, selector: Option<Lambda> },
    Contains { item: Expr },
}

impl ResultOp {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::LongCount => "long_count",
            Self::Any => "any",
            Self::All { .. } => "all",
            Self::First => "first",
            Self::FirstOrDefault => "first_or_default",
            Self::Single => "single",
            Self::SingleOrDefault => "single_or_default",
            Self::Last => "last",
            Self::Aggregate { func, .. } => match func {
                AggregateFn::Sum => "sum",
                AggregateFn::Min => "min",
                AggregateFn::Max => "max",
                AggregateFn::Average => "average",
            },
            Self::Contains { .. } => "contains",
        }
    }
}

///
/// AssignedValue
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum AssignedValue {
    /// Row-independent operand (usually a folded constant).
    Operand(Expr),

    /// Value computed from the row being updated.
    Row(Lambda),
}

///
/// Assignment
/// One `set(selector, value)` entry of a bulk update.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Assignment {
    /// Member path relative to the row, outermost first.
    pub member: Vec<String>,
    pub value: AssignedValue,
}

///
/// Clause
/// One recognized query operation with its resolved operands.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Clause {
    Filter {
        predicate: Lambda,
    },
    Select {
        selector: Lambda,
    },
    OrderBy {
        key: Lambda,
        direction: OrderDirection,
        /// `false` for `then_by` refinements of the previous ordering.
        primary: bool,
    },
    Skip {
        count: Expr,
    },
    Take {
        count: Expr,
    },
    Distinct,
    Join {
        inner: Box<QueryModel>,
        outer_key: Lambda,
        inner_key: Lambda,
        result: Lambda,
    },
    GroupBy {
        key: Lambda,
    },
    SetOp {
        op: SetOpKind,
        other: Box<QueryModel>,
    },
    Result(ResultOp),
    Delete {
        filter: Option<Lambda>,
    },
    Update {
        assignments: Vec<Assignment>,
    },
}

impl Clause {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Filter { .. } => "filter",
            Self::Select { .. } => "select",
            Self::OrderBy { primary: true, .. } => "order_by",
            Self::OrderBy { primary: false, .. } => "then_by",
            Self::Skip { .. } => "skip",
            Self::Take { .. } => "take",
            Self::Distinct => "distinct",
            Self::Join { .. } => "join",
            Self::GroupBy { .. } => "group_by",
            Self::SetOp { op, .. } => match op {
                SetOpKind::Union => "union",
                SetOpKind::Intersect => "intersect",
                SetOpKind::Except => "except",
            },
            Self::Result(op) => op.name(),
            Self::Delete { .. } => "delete_all",
            Self::Update { .. } => "update_all",
        }
    }

    /// Terminal clauses end the chain; nothing may follow them.
    #[must_use]
    pub const fn terminal_kind(&self) -> Option<QueryKind> {
        match self {
            Self::Result(_) => Some(QueryKind::Scalar),
            Self::Delete { .. } => Some(QueryKind::Delete),
            Self::Update { .. } => Some(QueryKind::Update),
            _ => None,
        }
    }
}

///
/// QueryModel
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryModel {
    source: QuerySource,
    clauses: Vec<Clause>,
    kind: QueryKind,
}

impl QueryModel {
    /// Assemble a model from clauses in application order.
    ///
    /// Rejects clauses after a terminal clause and `then_by` without a
    /// preceding ordering.
    pub(crate) fn new(source: QuerySource, clauses: Vec<Clause>) -> Result<Self, CompileError> {
        for (i, clause) in clauses.iter().enumerate() {
            if clause.terminal_kind().is_some()
                && let Some(next) = clauses.get(i + 1)
            {
                return Err(CompileError::MisplacedTerminal {
                    terminal: clause.name(),
                    next: next.name(),
                });
            }

            if matches!(clause, Clause::OrderBy { primary: false, .. })
                && !matches!(
                    i.checked_sub(1).and_then(|prev| clauses.get(prev)),
                    Some(Clause::OrderBy { .. })
                )
            {
                return Err(CompileError::UnorderedThenBy);
            }
        }

        let kind = clauses
            .last()
            .and_then(Clause::terminal_kind)
            .unwrap_or(QueryKind::Select);

        Ok(Self {
            source,
            clauses,
            kind,
        })
    }

    #[must_use]
    pub const fn source(&self) -> &QuerySource {
        &self.source
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    #[must_use]
    pub const fn kind(&self) -> QueryKind {
        self.kind
    }

    /// The terminal clause, if the chain ends in one.
    #[must_use]
    pub fn terminal(&self) -> Option<&Clause> {
        self.clauses
            .last()
            .filter(|clause| clause.terminal_kind().is_some())
    }

    #[must_use]
    pub fn into_parts(self) -> (QuerySource, Vec<Clause>, QueryKind) {
        (self.source, self.clauses, self.kind)
    }
}
