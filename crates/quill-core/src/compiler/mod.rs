//! Expression tree compiler.
//!
//! `compile` rewrites the caller's tree, then walks it from the outermost
//! call inward, peeling one recognized operation per step until it reaches
//! the data source. Clauses are collected outer-to-inner and reversed, so
//! the model lists them in the order the caller wrote them.

pub mod cache;
mod error;
#[cfg(test)]
mod tests;

pub use error::CompileError;

use crate::{
    expr::Expr,
    model::{Clause, QueryModel, QuerySource},
    obs::sink::{self, MetricsEvent, Span},
    registry::{CallShape, Registry, RegistrySet},
    rewrite::RewritePipeline,
};
use tracing::{debug, instrument, warn};

///
/// QueryCompiler
///
/// A frozen registry plus a rewrite pipeline. Holds no per-call state, so
/// one instance serves any number of sequential compilations.
///

pub struct QueryCompiler {
    registry: Registry,
    pipeline: RewritePipeline,
}

impl QueryCompiler {
    #[must_use]
    pub fn builder() -> QueryCompilerBuilder {
        QueryCompilerBuilder::default()
    }

    /// Standard operators, bulk DML, standard pipeline.
    pub fn standard() -> Result<Self, CompileError> {
        Self::builder().build()
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn pipeline(&self) -> &RewritePipeline {
        &self.pipeline
    }

    /// Compile a query expression into a query model.
    ///
    /// Never mutates `expr`; on failure no partial model is produced.
    #[instrument(level = "debug", skip_all)]
    pub fn compile(&self, expr: &Expr) -> Result<QueryModel, CompileError> {
        let span = Span::new();

        match self.compile_inner(expr) {
            Ok(model) => {
                debug!(kind = %model.kind(), clauses = model.clauses().len(), "query compiled");
                span.success(model.clauses().len());
                Ok(model)
            }
            Err(err) => {
                warn!(error = %err, class = %err.class(), "query compilation failed");
                span.failure(err.class());
                Err(err)
            }
        }
    }

    fn compile_inner(&self, expr: &Expr) -> Result<QueryModel, CompileError> {
        let rewritten = self.pipeline.apply(expr)?;

        self.walk(&rewritten)
    }

    // Peel recognized calls until the chain bottoms out at a non-call node.
    fn walk(&self, expr: &Expr) -> Result<QueryModel, CompileError> {
        let mut clauses: Vec<Clause> = Vec::new();
        let mut current = expr;

        let source = loop {
            match current {
                Expr::Call(call) => {
                    let node = self.registry.lookup(call).ok_or_else(|| {
                        CompileError::UnsupportedOperation {
                            shape: CallShape::of(call),
                        }
                    })?;
                    let clause = node.clause(call, &|sub: &Expr| self.walk(sub))?;
                    debug!(node = %node, "recognized clause");

                    clauses.push(clause);
                    current = &call.receiver;
                }
                Expr::Source(source) => break QuerySource::Named(source.name.clone()),
                other => break QuerySource::Inline(other.clone()),
            }
        };
        clauses.reverse();

        QueryModel::new(source, clauses)
    }
}

///
/// QueryCompilerBuilder
///
/// Starts from the standard and DML sets; extensions are merged after them
/// and must not collide with any earlier registration.
///

#[derive(Default)]
pub struct QueryCompilerBuilder {
    extensions: Vec<RegistrySet>,
    pipeline: Option<RewritePipeline>,
}

impl QueryCompilerBuilder {
    #[must_use]
    pub fn with_extension(mut self, set: RegistrySet) -> Self {
        self.extensions.push(set);
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, sets: impl IntoIterator<Item = RegistrySet>) -> Self {
        self.extensions.extend(sets);
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: RewritePipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    #[instrument(level = "debug", skip_all, fields(extensions = self.extensions.len()))]
    pub fn build(self) -> Result<QueryCompiler, CompileError> {
        let mut registry = Registry::builder();
        registry
            .merge(&RegistrySet::standard())?
            .merge(&RegistrySet::dml())?;
        for set in &self.extensions {
            registry.merge(set)?;
        }

        let compiler = QueryCompiler {
            registry: registry.build(),
            pipeline: self.pipeline.unwrap_or_default(),
        };
        sink::record(MetricsEvent::CompilerBuilt);
        debug!(entries = compiler.registry.len(), "query compiler built");

        Ok(compiler)
    }
}
