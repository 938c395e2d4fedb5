use crate::compiler::CompileError;
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// A compile error after classification. The facade maps faults by class,
/// so invariant violations become internal faults whatever their variant.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    #[source]
    pub source: CompileError,
}

impl InternalError {
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<CompileError> for InternalError {
    fn from(err: CompileError) -> Self {
        Self {
            class: err.class(),
            origin: err.origin(),
            message: err.to_string(),
            source: err,
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for compile-time classification.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorClass {
    /// The query uses an operation or shape the compiler does not know.
    #[display("unsupported")]
    Unsupported,

    /// The query is recognized but malformed (bad arguments, bad ordering).
    #[display("invalid")]
    Invalid,

    /// Evaluating a closed sub-tree failed.
    #[display("evaluation")]
    Evaluation,

    /// Two registrations claim the same call shape.
    #[display("conflict")]
    Conflict,

    /// A compiler defect (e.g. a rewrite that never settles).
    #[display("invariant_violation")]
    InvariantViolation,
}

///
/// ErrorOrigin
/// Compiler stage an error was raised in.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorOrigin {
    #[display("registry")]
    Registry,
    #[display("rewrite")]
    Rewrite,
    #[display("evaluate")]
    Evaluate,
    #[display("compile")]
    Compile,
    #[display("cache")]
    Cache,
}

///
/// TESTS
///
