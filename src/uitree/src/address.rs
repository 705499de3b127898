//! Opaque target-process addresses.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A location in the target address space.
///
/// Never dereferenced locally. Every use goes through a
/// [`MemorySource`](crate::MemorySource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u64);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_aligned(self, alignment: u64) -> bool {
        alignment != 0 && self.0 % alignment == 0
    }

    /// `self + offset`, or `None` on overflow.
    pub fn checked_add(self, offset: u64) -> Option<Address> {
        self.0.checked_add(offset).map(Address)
    }

    /// `self - offset`, or `None` on underflow.
    pub fn checked_sub(self, offset: u64) -> Option<Address> {
        self.0.checked_sub(offset).map(Address)
    }

    /// Interpret a decoded signed pointer field. Null and negative values are absent.
    pub fn from_pointer_field(value: i64) -> Option<Address> {
        if value <= 0 {
            None
        } else {
            Some(Address(value as u64))
        }
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Error returned when an address string is neither `0x…` hex nor decimal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0:?}")]
pub struct ParseAddressError(pub String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            u64::from_str_radix(hex, 16)
        } else {
            trimmed.parse::<u64>()
        };
        parsed
            .map(Address)
            .map_err(|_| ParseAddressError(s.to_string()))
    }
}
