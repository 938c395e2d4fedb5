use derive_more::Display;
use quill_core::{
    compiler::CompileError,
    error::{ErrorOrigin as CoreErrorOrigin, InternalError},
};
use serde::Serialize;
use std::error::Error as StdError;
use thiserror::Error as ThisError;
use tracing::error;
use ulid::Ulid;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

///
/// Error
///
/// Public fault type. Compilation failures travel through the same channel
/// as transport and server failures; the code's group tells them apart and
/// the trace id correlates the fault with logs on both ends.
///

#[derive(Debug, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub code: ErrorCode,
    pub origin: ErrorOrigin,
    pub message: String,
    pub trace_id: Ulid,

    #[serde(skip)]
    #[source]
    pub source: Option<BoxedSource>,
}

impl Error {
    /// Build a fault with a fresh trace id.
    pub fn new(code: ErrorCode, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            code,
            origin,
            message: message.into(),
            trace_id: Ulid::new(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Reuse a trace id issued elsewhere (e.g. by the server).
    #[must_use]
    pub const fn with_trace_id(mut self, trace_id: Ulid) -> Self {
        self.trace_id = trace_id;
        self
    }

    #[must_use]
    pub const fn group(&self) -> ErrorGroup {
        self.code.group()
    }

    #[must_use]
    pub const fn is_compile(&self) -> bool {
        matches!(self.code.group(), ErrorGroup::Compile)
    }

    /// The underlying compile error, if this fault wraps one.
    #[must_use]
    pub fn compile_error(&self) -> Option<&CompileError> {
        self.source.as_deref()?.downcast_ref::<CompileError>()
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        if err.is_invariant_violation() {
            error!(fault = %err.display_with_class(), "compiler invariant violated");
        }

        let code = match compile_code(&err.source) {
            Some(code) if !err.is_invariant_violation() => ErrorCode::compile(code),
            _ => ErrorCode::INTERNAL,
        };
        let InternalError {
            origin,
            message,
            source,
            ..
        } = err;

        Self::new(code, origin.into(), message).with_source(source)
    }
}

// `None` for compiler defects; those are not the caller's to fix.
const fn compile_code(err: &CompileError) -> Option<u16> {
    let code = match err {
        CompileError::UnsupportedOperation { .. } => compile::UNSUPPORTED_OPERATION,
        CompileError::InvalidArguments { .. } => compile::INVALID_ARGUMENTS,
        CompileError::MisplacedTerminal { .. } => compile::MISPLACED_TERMINAL,
        CompileError::UnorderedThenBy => compile::UNORDERED_THEN_BY,
        CompileError::Evaluation { .. } => compile::EVALUATION,
        CompileError::Registry(_) => compile::AMBIGUOUS_REGISTRATION,
        CompileError::RegistryClosed => compile::REGISTRY_CLOSED,
        CompileError::NoFixedPoint { .. } => return None,
    };

    Some(code)
}

///
/// Intra-group codes for the `Compile` group
///

pub mod compile {
    pub const UNSUPPORTED_OPERATION: u16 = 1;
    pub const INVALID_ARGUMENTS: u16 = 2;
    pub const MISPLACED_TERMINAL: u16 = 3;
    pub const UNORDERED_THEN_BY: u16 = 4;
    pub const EVALUATION: u16 = 5;
    pub const AMBIGUOUS_REGISTRATION: u16 = 6;
    pub const REGISTRY_CLOSED: u16 = 7;
}

///
/// ErrorCode
///
/// Group in the high 16 bits, intra-group code in the low 16 bits.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[display("{_0:#010x}")]
#[serde(transparent)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// Compiler defects the caller cannot remediate.
    pub const INTERNAL: Self = Self::new(ErrorGroup::Common, 0xFFFF);

    #[must_use]
    pub const fn new(group: ErrorGroup, code: u16) -> Self {
        Self(((group as u32) << 16) | code as u32)
    }

    #[must_use]
    pub const fn compile(code: u16) -> Self {
        Self::new(ErrorGroup::Compile, code)
    }

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Unknown groups read as `Common`.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn group(self) -> ErrorGroup {
        ErrorGroup::from_u16((self.0 >> 16) as u16)
    }

    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn code(self) -> u16 {
        self.0 as u16
    }

    /// Render as `QRL-<GROUP>-<code>`, e.g. `QRL-COMPILE-1`.
    #[must_use]
    pub fn code_as_string(self) -> String {
        format!("QRL-{}-{}", self.group().label(), self.code())
    }
}

///
/// ErrorGroup
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
#[repr(u16)]
pub enum ErrorGroup {
    Common = 1,
    Client = 3,
    Sql = 4,
    Network = 11,
    Compile = 30,
}

impl ErrorGroup {
    #[must_use]
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            3 => Self::Client,
            4 => Self::Sql,
            11 => Self::Network,
            30 => Self::Compile,
            _ => Self::Common,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Common => "COMMON",
            Self::Client => "CLIENT",
            Self::Sql => "SQL",
            Self::Network => "NETWORK",
            Self::Compile => "COMPILE",
        }
    }
}

///
/// ErrorOrigin
/// Public origin taxonomy.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Registry,
    Rewrite,
    Evaluate,
    Compile,
    Cache,
    Network,
    Server,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Registry => Self::Registry,
            CoreErrorOrigin::Rewrite => Self::Rewrite,
            CoreErrorOrigin::Evaluate => Self::Evaluate,
            CoreErrorOrigin::Compile => Self::Compile,
            CoreErrorOrigin::Cache => Self::Cache,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_packs_group_and_code() {
        let code = ErrorCode::compile(compile::MISPLACED_TERMINAL);

        assert_eq!(code.raw(), (30 << 16) | 3);
        assert_eq!(code.group(), ErrorGroup::Compile);
        assert_eq!(code.code(), 3);
        assert_eq!(code.code_as_string(), "QRL-COMPILE-3");
    }

    #[test]
    fn unknown_group_reads_as_common() {
        let code = ErrorCode::from_raw((999 << 16) | 7);

        assert_eq!(code.group(), ErrorGroup::Common);
        assert_eq!(code.code(), 7);
    }

    #[test]
    fn compile_error_keeps_its_cause() {
        let err = Error::from(CompileError::UnorderedThenBy);

        assert!(err.is_compile());
        assert_eq!(err.code.code(), compile::UNORDERED_THEN_BY);
        assert_eq!(err.origin, ErrorOrigin::Compile);
        assert!(matches!(
            err.compile_error(),
            Some(CompileError::UnorderedThenBy)
        ));
    }

    #[test]
    fn non_terminating_rewrite_maps_to_common_internal() {
        let err = Error::from(CompileError::NoFixedPoint {
            pass: "normalization",
            rounds: 16,
        });

        assert_eq!(err.code, ErrorCode::INTERNAL);
        assert_eq!(err.group(), ErrorGroup::Common);
        assert!(!err.is_compile());
        assert_eq!(err.origin, ErrorOrigin::Rewrite);
        assert!(matches!(
            err.compile_error(),
            Some(CompileError::NoFixedPoint { rounds: 16, .. })
        ));
    }

    #[test]
    fn classified_error_keeps_message_and_origin() {
        let internal = InternalError::from(CompileError::RegistryClosed);
        let message = internal.display_with_class();
        let err = Error::from(internal);

        assert_eq!(message, format!("cache:conflict: {err}"));
        assert_eq!(err.code, ErrorCode::compile(compile::REGISTRY_CLOSED));
        assert_eq!(err.origin, ErrorOrigin::Cache);
        assert!(err.compile_error().is_some());
    }

    #[test]
    fn trace_ids_are_unique_unless_reused() {
        let a = Error::new(ErrorCode::INTERNAL, ErrorOrigin::Server, "a");
        let b = Error::new(ErrorCode::INTERNAL, ErrorOrigin::Server, "b");
        assert_ne!(a.trace_id, b.trace_id);

        let c = Error::new(ErrorCode::INTERNAL, ErrorOrigin::Server, "c").with_trace_id(a.trace_id);
        assert_eq!(c.trace_id, a.trace_id);
    }

    #[test]
    fn serializes_without_the_source_chain() {
        let err = Error::from(CompileError::UnorderedThenBy);

        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], serde_json::json!((30 << 16) | 4));
        assert_eq!(json["origin"], "Compile");
        assert!(json.get("source").is_none());
        assert_eq!(json["trace_id"], err.trace_id.to_string());
    }
}
