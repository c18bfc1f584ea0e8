//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use wit_cabi::prelude::*;
//!
//! let ty = WitType::list(WitType::String);
//! let mut host = MemoryHost::new();
//! let flat = host.lower_value(&ty, Val::List(vec![Val::from("a")]))?;
//! assert_eq!(flat.len(), 2);
//! ```

// Unified error handling
pub use crate::error::{Error, Result};

// Type model
pub use crate::types::{
    CoreType, DiscriminantType, FlagsRepr, WitCase, WitEnum, WitField, WitFlags, WitRecord,
    WitType, WitVariant,
};

// Layout, flattening and the strategy-driven algorithms
pub use crate::abi::{
    CanonicalAbiError, CanonicalDeallocation, CanonicalHost, CanonicalLifting, CanonicalLoading,
    CanonicalLowering, CanonicalStoring, GuestPointer, alignment, deallocate, flatten,
    flatten_signature, flatten_types, lift, load, lower, size, store,
};

// Reference host
pub use crate::host::{CanonicalOptions, LinearMemory, MemoryHost, StringEncoding, Val};

// WIT loading (requires "wit" feature)
#[cfg(feature = "wit")]
pub use crate::{
    Resolve, TypeId, find_first_named_type, find_type_by_name, load_wit_type_from_path,
    load_wit_type_from_string,
};

// WAVE conversion (requires "wave" feature)
#[cfg(feature = "wave")]
pub use crate::wave::{format_val, parse_val, val_to_wave, wave_to_val};
#[cfg(feature = "wave")]
pub use crate::{Value, WaveType, resolve_wit_type};
