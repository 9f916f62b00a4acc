//! Y86-64 main memory.
//!
//! A single flat, byte-addressable array. Words are eight bytes stored in
//! little-endian order and may start at any byte offset.

use crate::config::DEFAULT_MEMORY_SIZE;
use crate::word::WORD_BYTES;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Flat main memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a zeroed memory of the default size.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_MEMORY_SIZE)
    }

    /// Create a zeroed memory of `size` bytes.
    pub fn with_size(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Number of addressable bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Resolve `[address, address + len)` to an index range, or fail.
    fn span(&self, address: u64, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let out_of_range = MemoryError::AddressOutOfRange {
            address,
            len,
            size: self.bytes.len(),
        };
        let start = usize::try_from(address).map_err(|_| out_of_range.clone())?;
        let end = start.checked_add(len).ok_or_else(|| out_of_range.clone())?;
        if end > self.bytes.len() {
            return Err(out_of_range);
        }
        Ok(start..end)
    }

    /// Read the eight bytes at `address` as a little-endian word.
    pub fn read_word(&self, address: u64) -> Result<u64, MemoryError> {
        let range = self.span(address, WORD_BYTES)?;
        let mut buf = [0u8; WORD_BYTES];
        buf.copy_from_slice(&self.bytes[range]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Store `value` as eight little-endian bytes at `address`.
    pub fn write_word(&mut self, value: u64, address: u64) -> Result<(), MemoryError> {
        let range = self.span(address, WORD_BYTES)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Raw instruction bytes `[address, address + len)`.
    pub fn fetch(&self, address: u64, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.span(address, len)?;
        Ok(&self.bytes[range])
    }

    /// Read a single byte.
    pub fn read_byte(&self, address: u64) -> Result<u8, MemoryError> {
        Ok(self.fetch(address, 1)?[0])
    }

    /// All bytes, for dumps.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy a byte image into memory starting at `start`.
    pub fn load_program(&mut self, start: usize, program: &[u8]) -> Result<(), MemoryError> {
        let available = self.bytes.len().saturating_sub(start);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.bytes[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Words in `[start, start + count * 8)` as `(address, value)` pairs.
    /// Stops at the last complete word.
    pub fn dump(&self, start: u64, count: usize) -> Vec<(u64, u64)> {
        (0..count as u64)
            .map(|i| start + i * WORD_BYTES as u64)
            .map_while(|addr| self.read_word(addr).ok().map(|v| (addr, v)))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &self.bytes.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Access extends past the end of memory.
    #[error("access of {len} bytes at {address:#x} is outside memory (size {size})")]
    AddressOutOfRange { address: u64, len: usize, size: usize },

    /// Program image does not fit.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
