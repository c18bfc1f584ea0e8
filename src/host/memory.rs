//! Simulated linear memory with a bump allocator.

use std::collections::BTreeMap;

use crate::abi::{CanonicalAbiError, align_up};
use crate::logging::{debug, warn};

/// Linear memory backing the reference host.
///
/// Allocation bumps the end of the buffer. Live allocations are tracked so
/// that deallocation can be observed and double frees are caught; freed
/// space is never reused.
///
/// # Example
///
/// ```ignore
/// use wit_cabi::host::LinearMemory;
///
/// let mut mem = LinearMemory::new();
/// let ptr = mem.alloc(5, 1)?;
/// mem.write(ptr, b"hello")?;
/// assert_eq!(mem.read(ptr, 5)?, b"hello");
/// ```
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct LinearMemory {
    data: Vec<u8>,
    limit: Option<usize>,
    allocations: BTreeMap<u32, usize>,
}

impl LinearMemory {
    /// Create a new empty linear memory without a size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty linear memory that never grows past `limit` bytes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Create a linear memory over existing bytes. Nothing is allocated.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Allocate `size` bytes aligned to `align` and return the pointer.
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<u32, CanonicalAbiError> {
        let start = align_up(self.data.len(), align.max(1));
        let end = start.checked_add(size).ok_or(CanonicalAbiError::OutOfMemory {
            requested: size,
            limit: self.max_len(),
        })?;
        if end > self.max_len() {
            return Err(CanonicalAbiError::OutOfMemory {
                requested: size,
                limit: self.max_len(),
            });
        }
        let ptr = u32::try_from(start).map_err(|_| CanonicalAbiError::OutOfMemory {
            requested: size,
            limit: self.max_len(),
        })?;

        self.data.resize(end, 0);
        if size > 0 {
            self.allocations.insert(ptr, size);
        }
        debug!(ptr, size, align, "alloc");
        Ok(ptr)
    }

    /// Release the allocation of `size` bytes at `ptr`.
    ///
    /// Zero-sized allocations are not tracked, so freeing them is a no-op.
    pub fn free(&mut self, ptr: u32, size: usize) -> Result<(), CanonicalAbiError> {
        if size == 0 {
            return Ok(());
        }
        match self.allocations.get(&ptr) {
            Some(&allocated) if allocated == size => {
                self.allocations.remove(&ptr);
                debug!(ptr, size, "free");
                Ok(())
            }
            _ => {
                warn!(ptr, size, "free of unknown allocation");
                Err(self.out_of_bounds(ptr, size))
            }
        }
    }

    /// Write bytes at `offset`. The range must already be allocated.
    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), CanonicalAbiError> {
        let err = self.out_of_bounds(offset, bytes.len());
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(err.clone())?;
        self.data
            .get_mut(start..end)
            .ok_or(err)?
            .copy_from_slice(bytes);
        Ok(())
    }

    /// Read `len` bytes from `offset`.
    pub fn read(&self, offset: u32, len: usize) -> Result<&[u8], CanonicalAbiError> {
        let start = offset as usize;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| self.out_of_bounds(offset, len))
    }

    /// Read a fixed number of bytes from `offset`.
    pub fn read_array<const N: usize>(&self, offset: u32) -> Result<[u8; N], CanonicalAbiError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.read(offset, N)?);
        Ok(bytes)
    }

    /// Number of allocations that have not been freed.
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    /// Whether a live allocation starts at `ptr`.
    pub fn is_allocated(&self, ptr: u32) -> bool {
        self.allocations.contains_key(&ptr)
    }

    /// Get the raw bytes of the linear memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the linear memory and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the length of the memory in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    fn max_len(&self) -> usize {
        self.limit.unwrap_or(u32::MAX as usize)
    }

    fn out_of_bounds(&self, ptr: u32, len: usize) -> CanonicalAbiError {
        CanonicalAbiError::InvalidMemoryPointer {
            ptr,
            len: u32::try_from(len).unwrap_or(u32::MAX),
            memory_size: self.data.len(),
        }
    }
}

impl From<Vec<u8>> for LinearMemory {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<LinearMemory> for Vec<u8> {
    fn from(memory: LinearMemory) -> Self {
        memory.data
    }
}

impl AsRef<[u8]> for LinearMemory {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_aligns_and_zero_fills() -> Result<(), CanonicalAbiError> {
        let mut mem = LinearMemory::new();
        assert_eq!(mem.alloc(3, 1)?, 0);
        assert_eq!(mem.alloc(4, 4)?, 4);
        assert_eq!(mem.alloc(8, 8)?, 8);
        assert_eq!(mem.len(), 16);
        assert!(mem.as_bytes().iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_read_write() -> Result<(), CanonicalAbiError> {
        let mut mem = LinearMemory::new();
        let ptr = mem.alloc(5, 1)?;
        mem.write(ptr, b"hello")?;
        assert_eq!(mem.read(ptr, 5)?, b"hello");
        assert_eq!(mem.read_array::<2>(ptr + 1)?, *b"el");
        Ok(())
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = LinearMemory::from_bytes(vec![0; 4]);
        assert!(matches!(
            mem.read(2, 4),
            Err(CanonicalAbiError::InvalidMemoryPointer { ptr: 2, len: 4, memory_size: 4 })
        ));
        assert!(mem.write(3, &[1, 2]).is_err());
        assert!(mem.read(u32::MAX, 2).is_err());
    }

    #[test]
    fn test_limit() -> Result<(), CanonicalAbiError> {
        let mut mem = LinearMemory::with_limit(Some(8));
        mem.alloc(6, 1)?;
        assert!(matches!(
            mem.alloc(4, 4),
            Err(CanonicalAbiError::OutOfMemory { requested: 4, limit: 8 })
        ));
        Ok(())
    }

    #[test]
    fn test_free_tracks_allocations() -> Result<(), CanonicalAbiError> {
        let mut mem = LinearMemory::new();
        let a = mem.alloc(4, 4)?;
        let b = mem.alloc(2, 1)?;
        assert_eq!(mem.live_allocations(), 2);

        mem.free(a, 4)?;
        assert!(!mem.is_allocated(a));
        assert!(mem.is_allocated(b));
        assert!(mem.free(a, 4).is_err(), "double free");
        assert!(mem.free(b, 3).is_err(), "size mismatch");
        mem.free(b, 2)?;
        mem.free(b, 0)?;
        assert_eq!(mem.live_allocations(), 0);
        Ok(())
    }
}
