use crate::{
    compiler::CompileError,
    expr::{Call, CallOwner, Expr, Lambda, Setters},
    model::{
        AggregateFn, AssignedValue, Assignment, Clause, OrderDirection, QueryKind, QueryModel,
        ResultOp, SetOpKind,
    },
    value::Value,
};
use derive_more::Display;
use std::fmt;

///
/// ResultKind
/// Terminal reductions a query can end in.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ResultKind {
    #[display("count")]
    Count,
    #[display("long_count")]
    LongCount,
    #[display("any")]
    Any,
    #[display("all")]
    All,
    #[display("first")]
    First,
    #[display("first_or_default")]
    FirstOrDefault,
    #[display("single")]
    Single,
    #[display("single_or_default")]
    SingleOrDefault,
    #[display("last")]
    Last,
    #[display("sum")]
    Sum,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
    #[display("average")]
    Average,
    #[display("contains")]
    Contains,
}

impl ResultKind {
    /// Operation name as it appears in a call chain.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::LongCount => "long_count",
            Self::Any => "any",
            Self::All => "all",
            Self::First => "first",
            Self::FirstOrDefault => "first_or_default",
            Self::Single => "single",
            Self::SingleOrDefault => "single_or_default",
            Self::Last => "last",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Average => "average",
            Self::Contains => "contains",
        }
    }
}

///
/// NodeType
///
/// Recognized operation. Each variant knows how to turn a matching call's
/// arguments into a [`Clause`].
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeType {
    Filter,
    Select,
    OrderBy(OrderDirection),
    ThenBy(OrderDirection),
    Skip,
    Take,
    Distinct,
    Join,
    GroupBy,
    SetOp(SetOpKind),
    Result(ResultKind),
    Delete,
    Update,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => f.write_str("Filter"),
            Self::Select => f.write_str("Select"),
            Self::OrderBy(dir) => write!(f, "OrderBy({dir})"),
            Self::ThenBy(dir) => write!(f, "ThenBy({dir})"),
            Self::Skip => f.write_str("Skip"),
            Self::Take => f.write_str("Take"),
            Self::Distinct => f.write_str("Distinct"),
            Self::Join => f.write_str("Join"),
            Self::GroupBy => f.write_str("GroupBy"),
            Self::SetOp(op) => write!(f, "SetOp({op})"),
            Self::Result(kind) => write!(f, "Result({kind})"),
            Self::Delete => f.write_str("Delete"),
            Self::Update => f.write_str("Update"),
        }
    }
}

impl NodeType {
    /// Build the clause for `call`.
    ///
    /// `subquery` compiles sequence operands (join inners, set-op operands)
    /// into nested models.
    pub fn clause(
        self,
        call: &Call,
        subquery: &dyn Fn(&Expr) -> Result<QueryModel, CompileError>,
    ) -> Result<Clause, CompileError> {
        let args = Args { call };

        let clause = match self {
            Self::Filter => {
                args.expect_len(1)?;
                Clause::Filter {
                    predicate: args.lambda(0, 1)?,
                }
            }
            Self::Select => {
                args.expect_len(1)?;
                Clause::Select {
                    selector: args.lambda(0, 1)?,
                }
            }
            Self::OrderBy(direction) | Self::ThenBy(direction) => {
                args.expect_len(1)?;
                Clause::OrderBy {
                    key: args.lambda(0, 1)?,
                    direction,
                    primary: matches!(self, Self::OrderBy(_)),
                }
            }
            Self::Skip => {
                args.expect_len(1)?;
                Clause::Skip {
                    count: args.row_count(0)?,
                }
            }
            Self::Take => {
                args.expect_len(1)?;
                Clause::Take {
                    count: args.row_count(0)?,
                }
            }
            Self::Distinct => {
                args.expect_len(0)?;
                Clause::Distinct
            }
            Self::Join => {
                args.expect_len(4)?;
                Clause::Join {
                    inner: Box::new(args.sequence(0, subquery)?),
                    outer_key: args.lambda(1, 1)?,
                    inner_key: args.lambda(2, 1)?,
                    result: args.lambda(3, 2)?,
                }
            }
            Self::GroupBy => {
                args.expect_len(1)?;
                Clause::GroupBy {
                    key: args.lambda(0, 1)?,
                }
            }
            Self::SetOp(op) => {
                args.expect_len(1)?;
                Clause::SetOp {
                    op,
                    other: Box::new(args.sequence(0, subquery)?),
                }
            }
            Self::Result(kind) => Clause::Result(result_op(kind, &args)?),
            Self::Delete => Clause::Delete {
                filter: match args.len() {
                    0 => None,
                    _ => {
                        args.expect_len(1)?;
                        Some(args.lambda(0, 1)?)
                    }
                },
            },
            Self::Update => {
                args.expect_len(1)?;
                Clause::Update {
                    assignments: assignments(&args, &args.lambda(0, 1)?)?,
                }
            }
        };

        Ok(clause)
    }
}

fn result_op(kind: ResultKind, args: &Args<'_>) -> Result<ResultOp, CompileError> {
    let op = match kind {
        ResultKind::Count => ResultOp::Count,
        ResultKind::LongCount => ResultOp::LongCount,
        ResultKind::Any => ResultOp::Any,
        ResultKind::First => ResultOp::First,
        ResultKind::FirstOrDefault => ResultOp::FirstOrDefault,
        ResultKind::Single => ResultOp::Single,
        ResultKind::SingleOrDefault => ResultOp::SingleOrDefault,
        ResultKind::Last => ResultOp::Last,
        ResultKind::All => {
            args.expect_len(1)?;
            return Ok(ResultOp::All {
                predicate: args.lambda(0, 1)?,
            });
        }
        ResultKind::Sum => return aggregate(AggregateFn::Sum, args),
        ResultKind::Min => return aggregate(AggregateFn::Min, args),
        ResultKind::Max => return aggregate(AggregateFn::Max, args),
        ResultKind::Average => return aggregate(AggregateFn::Average, args),
        ResultKind::Contains => {
            args.expect_len(1)?;
            return Ok(ResultOp::Contains {
                item: args.operand(0)?,
            });
        }
    };
    args.expect_len(0)?;

    Ok(op)
}

fn aggregate(func: AggregateFn, args: &Args<'_>) -> Result<ResultOp, CompileError> {
    let selector = match args.len() {
        0 => None,
        _ => {
            args.expect_len(1)?;
            Some(args.lambda(0, 1)?)
        }
    };

    Ok(ResultOp::Aggregate { func, selector })
}

// Decompose `d => d.set(sel, v).set(sel, v)` into assignments, in call order.
fn assignments(args: &Args<'_>, setters: &Lambda) -> Result<Vec<Assignment>, CompileError> {
    let descriptor = setters.params.first().map(String::as_str);
    let mut out = Vec::new();
    let mut current = setters.body.as_ref();

    loop {
        match current {
            Expr::Call(set)
                if set.owner == CallOwner::Update && set.method == "set" && set.args.len() == 2 =>
            {
                let selector = set.args[0]
                    .as_lambda()
                    .filter(|lambda| lambda.arity() == 1)
                    .ok_or_else(|| args.invalid("setter selector must be a one-parameter lambda"))?;

                let value = match set.args[1].as_lambda() {
                    Some(row) if row.arity() == 1 => AssignedValue::Row(row.clone()),
                    Some(_) => return Err(args.invalid("setter value lambda must take the row")),
                    None => AssignedValue::Operand(set.args[1].clone()),
                };

                out.push(Assignment {
                    member: member_path(selector)
                        .ok_or_else(|| args.invalid("setter selector must be a member path"))?,
                    value,
                });
                current = &set.receiver;
            }
            Expr::Parameter(name) if Some(name.as_str()) == descriptor => break,
            other => {
                return Err(args.invalid(format!("unexpected setter expression {other}")));
            }
        }
    }

    if out.is_empty() {
        return Err(args.invalid(format!(
            "update requires at least one {}.set(..) assignment",
            Setters::DESCRIPTOR
        )));
    }
    out.reverse();

    Ok(out)
}

// `p => p.a.b` yields `["a", "b"]`.
fn member_path(selector: &Lambda) -> Option<Vec<String>> {
    let row = selector.params.first()?;
    let mut path = Vec::new();
    let mut current = selector.body.as_ref();

    while let Expr::Member { target, member } = current {
        path.push(member.clone());
        current = target;
    }

    match current {
        Expr::Parameter(name) if name == row && !path.is_empty() => {
            path.reverse();
            Some(path)
        }
        _ => None,
    }
}

///
/// Args
/// Argument accessors that report failures against the owning call.
///

struct Args<'a> {
    call: &'a Call,
}

impl Args<'_> {
    const fn len(&self) -> usize {
        self.call.args.len()
    }

    fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidArguments {
            operation: self.call.method.clone(),
            reason: reason.into(),
        }
    }

    fn expect_len(&self, expected: usize) -> Result<(), CompileError> {
        if self.len() == expected {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "expected {expected} argument(s), found {}",
                self.len()
            )))
        }
    }

    fn lambda(&self, index: usize, arity: usize) -> Result<Lambda, CompileError> {
        match self.call.args.get(index).and_then(Expr::as_lambda) {
            Some(lambda) if lambda.arity() == arity => Ok(lambda.clone()),
            _ => Err(self.invalid(format!(
                "argument {index} must be a lambda taking {arity} parameter(s)"
            ))),
        }
    }

    fn operand(&self, index: usize) -> Result<Expr, CompileError> {
        match self.call.args.get(index) {
            Some(arg) if arg.as_lambda().is_none() => Ok(arg.clone()),
            _ => Err(self.invalid(format!("argument {index} must not be a lambda"))),
        }
    }

    // Skip/take counts: a folded constant must be a non-negative integer.
    fn row_count(&self, index: usize) -> Result<Expr, CompileError> {
        let count = self.operand(index)?;
        match count.as_constant() {
            None | Some(Value::Int(0..)) => Ok(count),
            Some(other) => Err(self.invalid(format!(
                "row count must be a non-negative integer, found {other}"
            ))),
        }
    }

    fn sequence(
        &self,
        index: usize,
        subquery: &dyn Fn(&Expr) -> Result<QueryModel, CompileError>,
    ) -> Result<QueryModel, CompileError> {
        let model = subquery(&self.operand(index)?)?;
        if model.kind() != QueryKind::Select {
            return Err(self.invalid(format!(
                "argument {index} must be a row sequence, found a {} query",
                model.kind()
            )));
        }

        Ok(model)
    }
}
