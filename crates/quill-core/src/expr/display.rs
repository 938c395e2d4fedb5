use crate::expr::{Call, Expr, Lambda};
use std::fmt::{self, Display, Write};

impl Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params.as_slice() {
            [single] => write!(f, "{single}")?,
            params => write!(f, "({})", params.join(", "))?,
        }
        write!(f, " => {}", self.body)
    }
}

impl Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.receiver, self.method)?;
        write_list(f, &self.args)?;
        f.write_char(')')
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Parameter(name) => write!(f, "{name}"),
            Self::Source(source) => write!(f, "source({})", source.name),
            Self::Member { target, member } => write!(f, "{target}.{member}"),
            Self::Unary { op, operand } => write!(f, "{op}{operand}"),
            Self::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "({test} ? {if_true} : {if_false})"),
            Self::Convert { operand, kind } => write!(f, "({kind}){operand}"),
            Self::Quote(inner) => write!(f, "{inner}"),
            Self::Lambda(lambda) => write!(f, "{lambda}"),
            Self::Invoke { lambda, args } => {
                write!(f, "({lambda})(")?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Self::Record(fields) => {
                f.write_str("new {")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, " {name} = {value}")?;
                }
                f.write_str(" }")
            }
            Self::List(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            Self::Call(call) => write!(f, "{call}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
