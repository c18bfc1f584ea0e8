//! Canonical ABI layout, flattening, lifting and lowering for WIT values.
//!
//! The algorithms here are generic over a host "strategy" that owns the
//! concrete representation of core operands, component values and linear
//! memory. The core only decides *what* to read, write, split or join, and in
//! which order.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for ABI operations
//! - [`layout`]: Size, alignment and offsets of WIT types in memory
//! - [`flatten`]: WIT types to core value types and function signatures
//! - [`lift`]: Core operands to component values ([`CanonicalLifting`])
//! - [`load`]: Linear memory to component values ([`CanonicalLoading`])
//! - [`lower`]: Component values to core operands ([`CanonicalLowering`])
//! - [`store`]: Component values to linear memory ([`CanonicalStoring`])
//! - [`dealloc`]: Releasing memory owned by a stored value ([`CanonicalDeallocation`])
//!
//! # Example
//!
//! ```ignore
//! use wit_cabi::abi::{lift, lower};
//! use wit_cabi::host::{MemoryHost, Val};
//! use wit_cabi::WitType;
//!
//! let mut host = MemoryHost::new();
//! let ty = WitType::option(WitType::U64);
//! let flat = lower(&ty, Val::Option(Some(Box::new(Val::U64(7)))), &mut host)?;
//! let value = lift(&ty, &mut flat.into_iter(), &mut host)?;
//! ```

pub mod dealloc;
pub mod error;
pub mod flatten;
pub mod layout;
pub mod lift;
pub mod load;
pub mod lower;
pub mod store;

pub use dealloc::{CanonicalDeallocation, deallocate};
pub use error::CanonicalAbiError;
pub use flatten::{
    CallDirection, CoreSignature, FunctionDecl, FunctionResults, MAX_FLAT_PARAMS,
    MAX_FLAT_RESULTS, SignatureSegment, flatten, flatten_params_results, flatten_signature,
    flatten_types, flatten_variant_payload,
};
pub use layout::{
    align_up, alignment, discriminant_type, field_offsets, payload_offset, raw_type_of_flags,
    size,
};
pub use lift::{CanonicalLifting, lift};
pub use load::{CanonicalLoading, load};
pub use lower::{CanonicalLowering, lower};
pub use store::{CanonicalStoring, store};

/// An address into host linear memory that can be offset by a byte count.
pub trait GuestPointer: Copy {
    fn advanced_by(self, bytes: usize) -> Self;
}

impl GuestPointer for u32 {
    #[inline]
    fn advanced_by(self, bytes: usize) -> Self {
        self.wrapping_add(bytes as u32)
    }
}

impl GuestPointer for u64 {
    #[inline]
    fn advanced_by(self, bytes: usize) -> Self {
        self.wrapping_add(bytes as u64)
    }
}

impl GuestPointer for usize {
    #[inline]
    fn advanced_by(self, bytes: usize) -> Self {
        self.wrapping_add(bytes)
    }
}

/// Types shared by every canonical ABI strategy of one host.
///
/// A single host usually implements several of the strategy traits; they all
/// refer back to this trait so their operands, pointers and errors agree.
pub trait CanonicalHost {
    /// One core value or one component-level value.
    type Operand: Clone;

    /// An address into the host's linear memory.
    type Pointer: GuestPointer;

    /// Failures reported by the host. The core raises its own
    /// [`CanonicalAbiError`]s through this type as well.
    type Error: From<CanonicalAbiError>;
}

/// Reject shapes outside of the implemented subset.
pub(crate) fn unsupported<T, E: From<CanonicalAbiError>>(
    ty: &crate::WitType,
    operation: &str,
) -> Result<T, E> {
    Err(CanonicalAbiError::unsupported(ty, operation).into())
}
