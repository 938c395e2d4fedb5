use crate::{
    error::{ErrorClass, ErrorOrigin},
    eval::EvalError,
    registry::{CallShape, RegistryError},
};
use thiserror::Error as ThisError;

///
/// CompileError
///
/// Every way a compilation can fail. Faults are local to one compile call;
/// the caller's tree is never touched.
///

#[derive(Debug, ThisError)]
pub enum CompileError {
    #[error("unsupported operation: no recognizer for {shape}")]
    UnsupportedOperation { shape: CallShape },

    #[error("invalid arguments to '{operation}': {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("'{next}' cannot follow terminal operation '{terminal}'")]
    MisplacedTerminal {
        terminal: &'static str,
        next: &'static str,
    },

    #[error("then_by must directly follow order_by or then_by")]
    UnorderedThenBy,

    #[error("evaluating {expr} failed")]
    Evaluation {
        expr: String,
        #[source]
        source: EvalError,
    },

    #[error("rewrite pass '{pass}' did not reach a fixed point within {rounds} rounds")]
    NoFixedPoint { pass: &'static str, rounds: usize },

    #[error("registry construction failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("extensions can no longer be installed: a compiler has already been built")]
    RegistryClosed,
}

impl CompileError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::UnsupportedOperation { .. } => ErrorClass::Unsupported,
            Self::InvalidArguments { .. }
            | Self::MisplacedTerminal { .. }
            | Self::UnorderedThenBy => ErrorClass::Invalid,
            Self::Evaluation { .. } => ErrorClass::Evaluation,
            Self::Registry(_) | Self::RegistryClosed => ErrorClass::Conflict,
            Self::NoFixedPoint { .. } => ErrorClass::InvariantViolation,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::UnsupportedOperation { .. }
            | Self::InvalidArguments { .. }
            | Self::MisplacedTerminal { .. }
            | Self::UnorderedThenBy => ErrorOrigin::Compile,
            Self::Evaluation { .. } => ErrorOrigin::Evaluate,
            Self::NoFixedPoint { .. } => ErrorOrigin::Rewrite,
            Self::Registry(_) => ErrorOrigin::Registry,
            Self::RegistryClosed => ErrorOrigin::Cache,
        }
    }
}
