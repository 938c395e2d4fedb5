use crate::model::{AssignedValue, Clause, QueryModel, QuerySource, ResultOp};
use std::fmt::{self, Display, Write};

// Indentation step for nested models (join inners, set-op operands).
const INDENT: &str = "  ";

impl Display for QuerySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Inline(expr) => write!(f, "{expr}"),
        }
    }
}

impl Display for ResultOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Self::All { predicate } => write!(f, " {predicate}"),
            Self::Aggregate {
                selector: Some(selector),
                ..
            } => write!(f, " {selector}"),
            Self::Contains { item } => write!(f, " {item}"),
            _ => Ok(()),
        }
    }
}

impl Display for QueryModel {
    /// Multi-line explain rendering, one clause per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        explain(self, 0, &mut out)?;
        f.write_str(out.trim_end())
    }
}

fn explain(model: &QueryModel, depth: usize, out: &mut String) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    writeln!(out, "{pad}from {}", model.source())?;

    for clause in model.clauses() {
        write!(out, "{pad}")?;
        match clause {
            Clause::Filter { predicate } => writeln!(out, "filter {predicate}")?,
            Clause::Select { selector } => writeln!(out, "select {selector}")?,
            Clause::OrderBy { key, direction, .. } => {
                writeln!(out, "{} {key} {direction}", clause.name())?;
            }
            Clause::Skip { count } => writeln!(out, "skip {count}")?,
            Clause::Take { count } => writeln!(out, "take {count}")?,
            Clause::Distinct => writeln!(out, "distinct")?,
            Clause::Join {
                inner,
                outer_key,
                inner_key,
                result,
            } => {
                writeln!(out, "join on {outer_key} == {inner_key} into {result}")?;
                explain(inner, depth + 1, out)?;
            }
            Clause::GroupBy { key } => writeln!(out, "group_by {key}")?,
            Clause::SetOp { op, other } => {
                writeln!(out, "{op}")?;
                explain(other, depth + 1, out)?;
            }
            Clause::Result(op) => writeln!(out, "{op}")?,
            Clause::Delete { filter: None } => writeln!(out, "delete_all")?,
            Clause::Delete {
                filter: Some(filter),
            } => writeln!(out, "delete_all where {filter}")?,
            Clause::Update { assignments } => {
                let sets = assignments
                    .iter()
                    .map(|a| {
                        let value = match &a.value {
                            AssignedValue::Operand(expr) => expr.to_string(),
                            AssignedValue::Row(lambda) => lambda.to_string(),
                        };
                        format!("{} = {value}", a.member.join("."))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "update_all set {sets}")?;
            }
        }
    }

    Ok(())
}
