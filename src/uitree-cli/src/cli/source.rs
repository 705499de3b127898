//! Shared memory source and scan arguments

use clap::{ArgGroup, Args};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("memory_source").required(true).multiple(false)))]
pub struct SourceArgs {
    /// Snapshot archive to read instead of a live process
    #[arg(short, long, group = "memory_source")]
    pub source: Option<PathBuf>,

    /// Process ID of a running client
    #[arg(short, long, group = "memory_source")]
    pub pid: Option<u32>,

    /// Executable name of a running client (the largest match is used)
    #[arg(short = 'n', long, group = "memory_source")]
    pub process_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Type name of the UI root (uses configured default, else "UIRoot")
    #[arg(short, long)]
    pub type_name: Option<String>,

    /// Stop counting a candidate's tree after this many nodes
    #[arg(long)]
    pub max_nodes: Option<usize>,

    /// Do not descend below this depth (the written tree stops at 256 either way)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Only scan memory belonging to loaded modules
    #[arg(long)]
    pub modules_only: bool,

    /// Keep only type candidates whose metatype has this name (e.g. "type")
    #[arg(long)]
    pub metatype: Option<String>,

    /// Object layout file (TOML) overriding the configured one
    #[arg(short, long)]
    pub layout: Option<PathBuf>,
}
