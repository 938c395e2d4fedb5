//! ## Crate layout
//! - `core`: expression trees, rewrite pipeline, registry, compiler, query
//!   model, per-worker cache, and observability.
//! - `error`: the public fault type with its group/code/trace-id contract.
//!
//! [`compile`] is the entry point hosts call: it goes through the calling
//! worker's cached compiler and maps failures into [`Error`].

pub use quill_core as core;

pub mod error;

pub use error::{Error, ErrorCode, ErrorGroup, ErrorOrigin};

use quill_core::{compiler::cache, expr::Expr, model::QueryModel, registry::RegistrySet};
use tracing::instrument;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile a query expression with the calling worker's compiler.
///
/// The first call on a worker builds that worker's compiler; later calls
/// reuse it. The caller's tree is never modified.
#[instrument(level = "debug", skip_all)]
pub fn compile(expr: &Expr) -> Result<QueryModel, Error> {
    let compiler = cache::instance_for_current_worker()?;

    Ok(compiler.compile(expr)?)
}

/// Register extension operation sets for every worker.
///
/// Must run before the first [`compile`] anywhere in the process.
pub fn install_extensions(sets: Vec<RegistrySet>) -> Result<(), Error> {
    cache::install_extensions(sets)?;

    Ok(())
}

///
/// Prelude
/// Query-building vocabulary plus the entry point.
///

pub mod prelude {
    pub use crate::{Error, compile};
    pub use quill_core::prelude::*;
}
