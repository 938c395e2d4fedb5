//! Rewrite pipeline.
//!
//! Ordered tree-to-tree passes applied before recognition. The pipeline
//! repeats whole rounds until a round changes nothing, and gives up with
//! [`CompileError::NoFixedPoint`] after [`MAX_REWRITE_ROUNDS`].

mod fold;
mod normalize;
#[cfg(test)]
mod tests;

pub use fold::PartialEvaluation;
pub use normalize::{
    CanonicalAlias, CollapseConvert, ConstantOnRight, InlineInvoke, LowerPredicateOverload,
    Normalization, RewriteRule, SimplifyNot, StripQuote,
};

use crate::{
    compiler::CompileError,
    expr::Expr,
    obs::sink::{self, MetricsEvent},
};
use std::borrow::Cow;
use tracing::debug;

/// Upper bound on whole-pipeline rounds before the rewrite is declared
/// non-terminating.
pub const MAX_REWRITE_ROUNDS: usize = 16;

///
/// TreePass
///
/// One tree-to-tree transformation. Returning `Cow::Borrowed` means the
/// input was already in this pass's normal form.
///

pub trait TreePass {
    fn name(&self) -> &'static str;

    fn apply<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError>;
}

///
/// RewritePipeline
///

pub struct RewritePipeline {
    passes: Vec<Box<dyn TreePass>>,
}

impl RewritePipeline {
    #[must_use]
    pub fn new(passes: Vec<Box<dyn TreePass>>) -> Self {
        Self { passes }
    }

    /// Partial evaluation, then normalization.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(PartialEvaluation::default()),
            Box::new(Normalization::standard()),
        ])
    }

    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass in order, round after round, until nothing changes.
    pub fn apply<'a>(&self, expr: &'a Expr) -> Result<Cow<'a, Expr>, CompileError> {
        let mut current = Cow::Borrowed(expr);
        let mut last_changed = "";

        for round in 1..=MAX_REWRITE_ROUNDS {
            let mut changed = false;

            for pass in &self.passes {
                let next = match pass.apply(&current)? {
                    Cow::Owned(next) => Some(next),
                    Cow::Borrowed(_) => None,
                };
                if let Some(next) = next {
                    debug!(pass = pass.name(), round, "rewrite pass changed tree");
                    current = Cow::Owned(next);
                    last_changed = pass.name();
                    changed = true;
                }
            }

            if !changed {
                sink::record(MetricsEvent::RewriteRounds { rounds: round });
                return Ok(current);
            }
        }

        Err(CompileError::NoFixedPoint {
            pass: last_changed,
            rounds: MAX_REWRITE_ROUNDS,
        })
    }
}

impl Default for RewritePipeline {
    fn default() -> Self {
        Self::standard()
    }
}
