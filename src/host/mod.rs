//! Reference host: an in-process strategy for the canonical ABI.
//!
//! [`MemoryHost`] implements every strategy trait over [`Val`] operands and
//! a [`LinearMemory`] addressed by `u32` pointers. It is what the CLI and the
//! WAVE conversion run on, and a template for embedding the ABI in a real
//! runtime.
//!
//! # Example
//!
//! ```ignore
//! use wit_cabi::host::{MemoryHost, Val};
//! use wit_cabi::WitType;
//!
//! let mut host = MemoryHost::new();
//! let ty = WitType::list(WitType::String);
//! let value = Val::List(vec![Val::from("a"), Val::from("bc")]);
//!
//! let ptr = host.store_value(&ty, value.clone())?;
//! assert_eq!(host.load_value(&ty, ptr)?, value);
//! ```

mod memory;
mod strategy;
mod value;

use std::fmt;

pub use memory::LinearMemory;
pub use value::Val;

use crate::abi::{self, CanonicalAbiError, CanonicalHost};
use crate::types::WitType;

/// How strings are encoded in linear memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    #[default]
    Utf8,
    Utf16,
    Latin1Utf16,
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf8",
            Self::Utf16 => "utf16",
            Self::Latin1Utf16 => "latin1+utf16",
        })
    }
}

/// Options applied when lifting and lowering through a [`MemoryHost`].
///
/// Only UTF-8 strings are implemented; other encodings are reported as
/// [`CanonicalAbiError::UnsupportedStringEncoding`] when a string is
/// actually lifted or lowered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalOptions {
    pub string_encoding: StringEncoding,
    /// Upper bound on linear memory growth, in bytes.
    pub memory_limit: Option<usize>,
}

impl CanonicalOptions {
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }
}

/// A canonical ABI strategy over [`Val`] and an owned [`LinearMemory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    memory: LinearMemory,
    options: CanonicalOptions,
}

impl CanonicalHost for MemoryHost {
    type Operand = Val;
    type Pointer = u32;
    type Error = CanonicalAbiError;
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CanonicalOptions) -> Self {
        Self {
            memory: LinearMemory::with_limit(options.memory_limit),
            options,
        }
    }

    /// Wrap existing memory contents, e.g. bytes produced by a guest.
    pub fn from_memory(memory: LinearMemory, options: CanonicalOptions) -> Self {
        Self { memory, options }
    }

    pub fn options(&self) -> &CanonicalOptions {
        &self.options
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    pub fn into_memory(self) -> LinearMemory {
        self.memory
    }

    /// Lower `value` to flat core operands.
    pub fn lower_value(&mut self, ty: &WitType, value: Val) -> Result<Vec<Val>, CanonicalAbiError> {
        abi::lower(ty, value, self)
    }

    /// Lift a value of `ty` from flat core operands.
    ///
    /// Fails if the operands do not match the flattening of `ty` in number.
    pub fn lift_value(
        &mut self,
        ty: &WitType,
        core_values: impl IntoIterator<Item = Val>,
    ) -> Result<Val, CanonicalAbiError> {
        let mut core_values = core_values.into_iter();
        let value = abi::lift(ty, &mut core_values, self)?;
        let leftover = core_values.count();
        if leftover > 0 {
            return Err(CanonicalAbiError::mismatch(
                format!("{} core operands for {ty}", abi::flatten(ty)?.len()),
                format!("{leftover} extra"),
            ));
        }
        Ok(value)
    }

    /// Allocate room for `ty`, store `value` there and return the pointer.
    pub fn store_value(&mut self, ty: &WitType, value: Val) -> Result<u32, CanonicalAbiError> {
        let ptr = self.memory.alloc(abi::size(ty)?, abi::alignment(ty)?)?;
        abi::store(ty, value, ptr, self)?;
        Ok(ptr)
    }

    pub fn load_value(&mut self, ty: &WitType, ptr: u32) -> Result<Val, CanonicalAbiError> {
        abi::load(ty, ptr, self)
    }

    /// Free everything owned by the value of `ty` at `ptr`.
    ///
    /// The allocation holding the value itself is left alone. Returns
    /// whether anything was owned.
    pub fn deallocate_value(&mut self, ty: &WitType, ptr: u32) -> Result<bool, CanonicalAbiError> {
        abi::deallocate(ty, ptr, self)
    }

    fn check_string_encoding(&self) -> Result<(), CanonicalAbiError> {
        match self.options.string_encoding {
            StringEncoding::Utf8 => Ok(()),
            other => Err(CanonicalAbiError::UnsupportedStringEncoding(other.to_string())),
        }
    }
}
