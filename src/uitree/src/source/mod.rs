//! Memory Source Abstraction
//!
//! Core abstractions for reading target memory:
//! - Live process attachment via `LiveProcess`
//! - Captured process samples via `Snapshot`

mod process;
mod region;
mod snapshot;
mod traits;

pub use process::{find_process_by_name, parse_maps, parse_maps_line, LiveProcess, PAGE_SIZE};
pub use region::{MemoryRegion, Module};
pub use snapshot::{base_address_from_entry_name, MemorySegment, Snapshot, MEMORY_ENTRY_PREFIX};
pub use traits::{MemorySource, FIELD_WIDTH};
