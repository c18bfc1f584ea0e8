//! Error types for canonical ABI operations.

use thiserror::Error;

/// Errors raised by the canonical ABI itself or by the reference host.
///
/// Host strategies may use their own error type; it only has to be
/// constructible from this one so the generic entry points can report
/// unsupported shapes and malformed strategy callbacks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalAbiError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Ran out of core operands while lifting {ty}")]
    OperandStreamExhausted { ty: String },

    #[error("Case index {index} out of range for type with {num_cases} cases")]
    InvalidCaseIndex { index: usize, num_cases: usize },

    #[error("Missing payload for case {case}")]
    MissingPayload { case: usize },

    #[error("Case {case} carries no payload, but one was given")]
    UnexpectedPayload { case: usize },

    #[error("Invalid discriminant {discriminant} for variant with {num_cases} cases")]
    InvalidDiscriminant { discriminant: u32, num_cases: usize },

    #[error("Invalid bool value: {0}")]
    InvalidBool(u32),

    #[error("Invalid char value: {0}")]
    InvalidChar(u32),

    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid memory pointer: {ptr} with length {len} exceeds memory size {memory_size}")]
    InvalidMemoryPointer {
        ptr: u32,
        len: u32,
        memory_size: usize,
    },

    #[error("Out of memory: requested {requested} bytes, limit is {limit}")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("Unsupported string encoding: {0}")]
    UnsupportedStringEncoding(String),

    #[error("Unknown type id: {0}")]
    UnknownTypeId(String),
}

impl CanonicalAbiError {
    pub(crate) fn unsupported(ty: &crate::WitType, operation: &str) -> Self {
        Self::UnsupportedType(format!("{operation} of {}", ty.kind_name()))
    }

    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
