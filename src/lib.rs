//! WebAssembly Component Model canonical ABI for WIT values.
//!
//! This library computes the memory layout and flat core signature of WIT
//! types, and lifts, lowers, loads, stores and deallocates component values
//! through a host-supplied strategy. The algorithms never touch memory or
//! values directly; everything concrete lives behind the strategy traits in
//! [`abi`], with [`host::MemoryHost`] as an in-process reference host.
//!
//! # Quick Start
//!
//! ```ignore
//! use wit_cabi::prelude::*;
//!
//! let wit = r#"
//!     package test:types;
//!     interface types {
//!         record point { x: u32, y: u32 }
//!     }
//! "#;
//! let (_, _, ty) = load_wit_type_from_string(wit, Some("point"))?;
//!
//! assert_eq!(size(&ty)?, 8);
//! assert_eq!(flatten_types(&ty)?, vec![CoreType::I32, CoreType::I32]);
//!
//! let mut host = MemoryHost::new();
//! let point = Val::Record(vec![("x".into(), Val::U32(1)), ("y".into(), Val::U32(2))]);
//! let ptr = host.store_value(&ty, point.clone())?;
//! assert_eq!(host.load_value(&ty, ptr)?, point);
//! ```
//!
//! # Modules
//!
//! - [`types`] - Resolved WIT types and core value types (always available)
//! - [`abi`] - Layout, flattening and the generic lift/lower/load/store algorithms (always available)
//! - [`host`] - Reference host strategy over an owned linear memory (always available)
//! - [`wit`] - Conversion from `wit-parser` types (requires `wit` feature)
//! - [`wave`] - Conversion between WAVE text values and host values (requires `wave` feature)
//!
//! # Feature Flags
//!
//! - `wit` - Enable the `wit-parser` bridge (enabled by default)
//! - `wave` - Enable WAVE value conversion (enabled by default)
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the command-line interface binary
//! - `full` - Enable all features

pub mod abi;
pub mod host;
mod logging;
pub mod prelude;
pub mod types;
#[cfg(feature = "wave")]
pub mod wave;
#[cfg(feature = "wit")]
pub mod wit;

mod error;

// Re-export the unified error type
pub use error::{Error, Result};

// Re-export the type model at crate root for convenience
pub use types::{
    CoreType, DiscriminantType, FlagsRepr, WitCase, WitEnum, WitField, WitFlags, WitRecord,
    WitType, WitVariant,
};

pub use abi::CanonicalAbiError;

#[cfg(feature = "wit")]
pub use wit::{
    find_first_named_type, find_type_by_name, load_wit_type_from_path, load_wit_type_from_string,
};

// Re-export commonly used types from dependencies for convenience
#[cfg(feature = "wave")]
pub use wasm_wave::value::{Type as WaveType, Value, resolve_wit_type};
#[cfg(feature = "wit")]
pub use wit_parser::{Resolve, TypeId};
