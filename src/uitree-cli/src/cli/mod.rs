//! CLI argument definitions for uitree
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod source;

pub use core::{Cli, Commands};
pub use source::{ScanArgs, SourceArgs};
