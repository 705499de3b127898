//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::source::{ScanArgs, SourceArgs};

#[derive(Parser)]
#[command(name = "uitree")]
#[command(about = "Read the UI tree of a Python 2.7 process from memory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the UI root and optionally write the inspected tree as JSON
    #[command(visible_alias = "r")]
    Read {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        scan: ScanArgs,

        /// Directory to write the inspected tree into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every root candidate with its reachable node count
    #[command(visible_alias = "c")]
    Candidates {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        scan: ScanArgs,

        /// Print the scan report and scores as JSON
        #[arg(long)]
        json: bool,
    },

    /// List modules loaded in a live process
    #[command(visible_alias = "m")]
    Modules {
        /// Process ID
        #[arg(short, long, conflicts_with = "process_name")]
        pid: Option<u32>,

        /// Executable name to look up (e.g. "exefile.exe")
        #[arg(short = 'n', long)]
        process_name: Option<String>,
    },

    /// Print the effective object layout as TOML
    Layout {
        /// Layout file overriding the configured one
        #[arg(short, long)]
        layout: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read_from_sample() {
        let cli = Cli::try_parse_from([
            "uitree",
            "read",
            "--source",
            "sample.zip",
            "--max-nodes",
            "1000",
            "--output",
            "out",
        ])
        .unwrap();

        match cli.command {
            Commands::Read {
                source,
                scan,
                output,
            } => {
                assert_eq!(source.source, Some(PathBuf::from("sample.zip")));
                assert_eq!(source.pid, None);
                assert_eq!(scan.max_nodes, Some(1000));
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_sources_are_exclusive_and_required() {
        assert!(Cli::try_parse_from(["uitree", "read"]).is_err());
        assert!(
            Cli::try_parse_from(["uitree", "read", "--source", "a.zip", "--pid", "42"]).is_err()
        );
        let scoped = ["uitree", "candidates", "--pid", "42", "--modules-only"];
        assert!(Cli::try_parse_from(scoped).is_ok());
    }
}
