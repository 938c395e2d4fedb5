//! Core of Quill: expression trees, constant folding and normalization,
//! operator recognition, and lowering into a source-independent query
//! model, plus the per-worker compiler cache and the ergonomics exported
//! via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod compiler;
pub mod error;
pub mod eval;
pub mod expr;
pub mod model;
pub mod obs;
pub mod registry;
pub mod rewrite;
pub mod value;

///
/// Prelude
///
/// Vocabulary for building query expressions and reading models.
/// No registries, passes, or observability hooks are re-exported here.
///

pub mod prelude {
    pub use crate::{
        compiler::{CompileError, QueryCompiler},
        expr::{Expr, Queryable, Setters, lambda, lit, param},
        model::{Clause, QueryKind, QueryModel, QuerySource},
        value::Value,
    };
}
