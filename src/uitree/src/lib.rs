//! # uitree
//!
//! Reconstructs the UI object tree of a running Python 2.7 interpreter from
//! raw address-space bytes, without symbol information.
//!
//! This library provides functionality to:
//! - Read target memory from a live process or a captured snapshot archive
//! - Decode interpreter objects (type names, strings, dicts, lists) at configurable offsets
//! - Scan memory for instances of a named type
//! - Walk candidate trees and select the largest one as the UI root
//! - Serialize the selected tree for inspection
//!
//! ## Example
//!
//! ```no_run
//! use uitree::{
//!     find_ui_root, inspect, ObjectLayout, ObjectReader, ScanOptions, Snapshot, TraversalLimits,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshot = Snapshot::open("sample.zip")?;
//! let layout = ObjectLayout::default();
//! let reader = ObjectReader::new(&snapshot, &layout);
//!
//! let limits = TraversalLimits::default();
//! if let Some(root) = find_ui_root(reader, "UIRoot", &ScanOptions::default(), limits) {
//!     println!("root {} with {} nodes", root.node.address, root.node_count);
//!     let tree = inspect(reader, root.node.address, limits);
//!     println!("{}", uitree::to_json_pretty(&tree)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod inspect;
pub mod layout;
pub mod pattern;
pub mod reader;
pub mod root;
pub mod scanner;
pub mod source;
pub mod tree;

#[cfg(test)]
mod testing;

use thiserror::Error;

/// Errors that end an invocation. Read and decode failures are never errors;
/// they surface as absent values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("memory source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("module enumeration is not supported by this memory source")]
    ModulesUnsupported,

    #[error("invalid object layout: {0}")]
    Layout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// Re-export commonly used items
#[doc(inline)]
pub use address::{Address, ParseAddressError};
#[doc(inline)]
pub use inspect::{
    inspect, sample_id, to_json_pretty, InspectedNode, StringEntry, MAX_INSPECT_DEPTH,
};
#[doc(inline)]
pub use layout::{ChildrenLocator, ObjectLayout};
#[doc(inline)]
pub use reader::{DictKey, DictSlot, ObjectHeader, ObjectReader, TypeDescriptor};
#[doc(inline)]
pub use root::{find_ui_root, score_candidates, select_root, CandidateScore, SelectedRoot};
#[doc(inline)]
pub use scanner::{ScanOptions, ScanReport, ScanScope, TypeCandidateScanner};
#[doc(inline)]
pub use source::{LiveProcess, MemoryRegion, MemorySegment, MemorySource, Module, Snapshot};
#[doc(inline)]
pub use tree::{Descendants, TraversalLimits, UiNode};
