//! Read command handler
//!
//! Finds the UI root of a sample or live process and writes the inspected tree.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uitree::{find_ui_root, inspect, to_json_pretty, InspectedNode, ObjectReader};

use super::{open_source, OpenedSource, Settings};
use crate::cli::{ScanArgs, SourceArgs};
use crate::config::Config;

/// Handle the read command
pub fn handle(source: &SourceArgs, scan: &ScanArgs, output: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let settings = Settings::resolve(scan, &config)?;
    let opened = open_source(source)?;
    let reader = ObjectReader::new(opened.source(), &settings.layout);

    let Some(root) = find_ui_root(reader, &settings.type_name, &settings.scan, settings.limits)
    else {
        println!("No UI root found for type '{}'", settings.type_name);
        return Ok(());
    };

    println!("UI root: {} ({} nodes)", root.node.address, root.node_count);

    if let Some(dir) = output {
        let tree = inspect(reader, root.node.address, settings.limits);
        let path = write_tree(&opened, &tree, dir)?;
        println!("Wrote {} nodes to {}", tree.node_count(), path.display());
    }

    Ok(())
}

/// Write `tree` as pretty JSON into `dir`, named after the source
pub fn write_tree(opened: &OpenedSource, tree: &InspectedNode, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(opened.output_file_name());
    let json = to_json_pretty(tree).context("Failed to serialize UI tree")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
