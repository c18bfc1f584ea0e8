//! Unified error type for the wit-cabi library.
//!
//! [`Error`] wraps the canonical ABI errors together with the failures of the
//! optional WIT and WAVE front ends, so application code can use a single
//! error type throughout.

use thiserror::Error;

use crate::abi::CanonicalAbiError;

/// Unified error type for all wit-cabi operations.
///
/// # Example
///
/// ```ignore
/// use wit_cabi::{Result, load_wit_type_from_string};
/// use wit_cabi::host::{MemoryHost, Val};
///
/// fn flatten_point(wit: &str) -> Result<usize> {
///     let (_, _, ty) = load_wit_type_from_string(wit, Some("point"))?;
///     Ok(wit_cabi::abi::flatten(&ty)?.len())
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Error from canonical ABI layout, flattening, lifting or lowering.
    #[error(transparent)]
    Abi(#[from] CanonicalAbiError),

    /// WIT parsing error.
    #[error("WIT parsing error: {0}")]
    WitParse(#[from] anyhow::Error),

    /// The requested type is not defined in the WIT document.
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// WAVE parsing or formatting error.
    #[error("WAVE parsing error: {0}")]
    WaveParse(String),
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a WAVE parsing error from a string message.
    pub fn wave_parse(msg: impl Into<String>) -> Self {
        Self::WaveParse(msg.into())
    }
}
