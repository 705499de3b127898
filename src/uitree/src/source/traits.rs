//! Memory Source Trait
//!
//! Core abstraction for reading memory from a live process or a snapshot.

use super::{MemoryRegion, Module};
use crate::{Address, Result};
use byteorder::{ByteOrder, LE};

/// Width of every pointer and integer field decoded from the target
pub const FIELD_WIDTH: usize = 8;

/// Trait for reading target memory (live process, snapshot archive, ...)
///
/// Reads never fail loudly: unmapped or inaccessible ranges come back as `None`.
pub trait MemorySource: Send + Sync {
    /// Read up to `length` bytes at `address`.
    ///
    /// May return fewer bytes than requested when only a prefix of the range
    /// is available. Returns `None` when nothing at `address` is readable.
    fn read_bytes(&self, address: Address, length: usize) -> Option<Vec<u8>>;

    /// Modules loaded in the target, used to bound scans.
    ///
    /// Sources without module information return
    /// [`Error::ModulesUnsupported`](crate::Error::ModulesUnsupported).
    fn enumerate_modules(&self) -> Result<Vec<Module>>;

    /// Ranges a scanner may read
    fn regions(&self) -> &[MemoryRegion];

    /// Check if this reads from a running process
    fn is_live(&self) -> bool;

    /// Read a little-endian i64. A short read is a decode failure.
    fn read_i64(&self, address: Address) -> Option<i64> {
        let bytes = self.read_bytes(address, FIELD_WIDTH)?;
        if bytes.len() < FIELD_WIDTH {
            return None;
        }
        Some(LE::read_i64(&bytes))
    }

    /// Read a little-endian u64. A short read is a decode failure.
    fn read_u64(&self, address: Address) -> Option<u64> {
        self.read_i64(address).map(|v| v as u64)
    }

    /// Read a pointer field. Null and negative values are absent.
    fn read_pointer(&self, address: Address) -> Option<Address> {
        self.read_i64(address).and_then(Address::from_pointer_field)
    }

    /// Find the region containing the given address
    fn find_region(&self, address: Address) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.contains(address))
    }
}
