//! Per-worker compiler cache.
//!
//! Each worker thread builds its own [`QueryCompiler`] on first use and
//! keeps it for the thread's lifetime. Workers never share an instance, so
//! the compile path takes no locks. Process-wide extension sets are fixed
//! by the first build on any worker.

use crate::{
    compiler::{CompileError, QueryCompiler},
    registry::RegistrySet,
};
use std::{
    cell::{Cell, OnceCell},
    rc::Rc,
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::{debug, instrument};

static EXTENSIONS: OnceLock<Vec<RegistrySet>> = OnceLock::new();
static TOTAL_BUILDS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static INSTANCE: OnceCell<Rc<QueryCompiler>> = const { OnceCell::new() };
    static BUILDS: Cell<u64> = const { Cell::new(0) };
}

/// Register extension sets for every compiler built from now on.
///
/// Allowed once, and only before any worker has built its compiler;
/// afterwards the registry is closed.
pub fn install_extensions(sets: Vec<RegistrySet>) -> Result<(), CompileError> {
    let count = sets.len();
    EXTENSIONS
        .set(sets)
        .map_err(|_| CompileError::RegistryClosed)?;
    debug!(sets = count, "registry extensions installed");

    Ok(())
}

/// The calling worker's compiler, built on first use.
///
/// A failed build is not cached; the next call tries again.
pub fn instance_for_current_worker() -> Result<Rc<QueryCompiler>, CompileError> {
    INSTANCE.with(|slot| get_or_try_build(slot, build_for_worker))
}

/// Compilers built on the calling worker.
#[must_use]
pub fn builds_on_current_worker() -> u64 {
    BUILDS.with(Cell::get)
}

/// Compilers built across all workers.
#[must_use]
pub fn total_builds() -> u64 {
    TOTAL_BUILDS.load(Ordering::Relaxed)
}

#[instrument(level = "debug")]
fn build_for_worker() -> Result<QueryCompiler, CompileError> {
    // first build seals the extension list
    let extensions = EXTENSIONS.get_or_init(Vec::new);

    let compiler = QueryCompiler::builder()
        .with_extensions(extensions.iter().cloned())
        .build()?;

    BUILDS.with(|builds| builds.set(builds.get().saturating_add(1)));
    TOTAL_BUILDS.fetch_add(1, Ordering::Relaxed);

    Ok(compiler)
}

// `OnceCell::get_or_try_init` without caching the error.
pub(crate) fn get_or_try_build<T>(
    slot: &OnceCell<Rc<T>>,
    build: impl FnOnce() -> Result<T, CompileError>,
) -> Result<Rc<T>, CompileError> {
    if let Some(existing) = slot.get() {
        return Ok(Rc::clone(existing));
    }
    let built = Rc::new(build()?);

    Ok(Rc::clone(slot.get_or_init(|| built)))
}
