use crate::{
    compiler::CompileError,
    eval::{AllowAll, EvaluableFilter, evaluate, is_evaluable},
    expr::Expr,
    rewrite::TreePass,
};
use std::borrow::Cow;

///
/// PartialEvaluation
///
/// Replaces every maximal closed sub-tree with its value. Lambda bodies are
/// folded with their parameters treated as live, so `x => x.age == 2 + 3`
/// becomes `x => x.age == 5`.
///

pub struct PartialEvaluation {
    filter: Box<dyn EvaluableFilter>,
}

impl PartialEvaluation {
    #[must_use]
    pub fn new(filter: impl EvaluableFilter + 'static) -> Self {
        Self {
            filter: Box::new(filter),
        }
    }

    fn fold<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError> {
        if !matches!(expr, Expr::Constant(_)) && is_evaluable(expr, self.filter.as_ref()) {
            let value = evaluate(expr).map_err(|source| CompileError::Evaluation {
                expr: expr.to_string(),
                source,
            })?;

            return Ok(Cow::Owned(Expr::Constant(value)));
        }

        expr.map_children(|child| self.fold(child))
    }
}

impl Default for PartialEvaluation {
    fn default() -> Self {
        Self::new(AllowAll)
    }
}

impl TreePass for PartialEvaluation {
    fn name(&self) -> &'static str {
        "partial_evaluation"
    }

    fn apply<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError> {
        self.fold(expr)
    }
}
