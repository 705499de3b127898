//! Command handlers for uitree CLI
//!
//! Each subcommand has its own module with handler functions. Resolution of
//! sources and settings shared between them lives here.

pub mod candidates;
pub mod layout;
pub mod modules;
pub mod read;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;
use uitree::source::find_process_by_name;
use uitree::{
    sample_id, LiveProcess, MemorySource, ObjectLayout, ScanOptions, ScanScope, Snapshot,
    TraversalLimits,
};

use crate::cli::{ScanArgs, SourceArgs};
use crate::config::Config;

/// An opened memory source with what is needed to name its outputs
pub enum OpenedSource {
    Sample { snapshot: Snapshot, sample_id: String },
    Process(LiveProcess),
}

impl OpenedSource {
    pub fn source(&self) -> &dyn MemorySource {
        match self {
            OpenedSource::Sample { snapshot, .. } => snapshot,
            OpenedSource::Process(process) => process,
        }
    }

    /// File name for the inspected tree of this source
    pub fn output_file_name(&self) -> String {
        match self {
            OpenedSource::Sample { sample_id, .. } => {
                let short: String = sample_id.chars().take(8).collect();
                format!("memory-reading-from-sample-{}.json", short)
            }
            OpenedSource::Process(process) => {
                format!("memory-reading-from-process-{}.json", process.pid)
            }
        }
    }
}

pub fn open_source(args: &SourceArgs) -> Result<OpenedSource> {
    if let Some(path) = &args.source {
        return open_sample(path);
    }

    let pid = match (args.pid, &args.process_name) {
        (Some(pid), _) => pid,
        (None, Some(name)) => find_process_by_name(name)
            .with_context(|| format!("Failed to find process '{}'", name))?,
        (None, None) => {
            anyhow::bail!("No memory source given: use --source, --pid or --process-name")
        }
    };

    attach(pid)
}

pub fn attach(pid: u32) -> Result<OpenedSource> {
    let process = LiveProcess::attach(pid)
        .with_context(|| format!("Failed to attach to process {}", pid))?;
    info!("Attached to {} (pid {})", process.name, process.pid);
    Ok(OpenedSource::Process(process))
}

pub fn open_sample(path: &Path) -> Result<OpenedSource> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read sample {}", path.display()))?;
    let snapshot = Snapshot::from_zip_bytes(&bytes)
        .with_context(|| format!("Failed to load sample {}", path.display()))?;
    info!(
        "Loaded {} segments ({} bytes) from {}",
        snapshot.segment_count(),
        snapshot.total_bytes(),
        path.display()
    );

    Ok(OpenedSource::Sample {
        snapshot,
        sample_id: sample_id(&bytes),
    })
}

/// Effective settings after merging the config file and command-line flags
#[derive(Debug, Clone)]
pub struct Settings {
    pub type_name: String,
    pub layout: ObjectLayout,
    pub scan: ScanOptions,
    pub limits: TraversalLimits,
}

impl Settings {
    pub fn resolve(args: &ScanArgs, config: &Config) -> Result<Self> {
        let layout = match &args.layout {
            Some(path) => load_layout(path)?,
            None => config.layout.clone().unwrap_or_default(),
        };

        let type_name = args
            .type_name
            .clone()
            .unwrap_or_else(|| config.get_type_name().to_string());

        let scan = ScanOptions {
            scope: if args.modules_only {
                ScanScope::Modules
            } else {
                ScanScope::AllRegions
            },
            metatype_name: args.metatype.clone(),
            ..Default::default()
        };

        Ok(Settings {
            type_name,
            layout,
            scan,
            limits: TraversalLimits::new(args.max_nodes, args.max_depth),
        })
    }
}

pub fn load_layout(path: &Path) -> Result<ObjectLayout> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read layout from {}", path.display()))?;
    ObjectLayout::from_toml_str(&text)
        .with_context(|| format!("Failed to parse layout {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::resolve(&ScanArgs::default(), &Config::default()).unwrap();
        assert_eq!(settings.type_name, "UIRoot");
        assert_eq!(settings.layout, ObjectLayout::default());
        assert_eq!(settings.scan.scope, ScanScope::AllRegions);
        assert_eq!(settings.limits, TraversalLimits::default());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let layout_path = dir.path().join("layout.toml");
        fs::write(&layout_path, "string_data_offset = 24\n").unwrap();

        let config = Config::parse(
            "type_name = \"FromConfig\"\n[layout]\nstring_data_offset = 40\n",
        )
        .unwrap();

        let from_config = Settings::resolve(&ScanArgs::default(), &config).unwrap();
        assert_eq!(from_config.type_name, "FromConfig");
        assert_eq!(from_config.layout.string_data_offset, 40);

        let args = ScanArgs {
            type_name: Some("UIRoot".into()),
            layout: Some(layout_path),
            modules_only: true,
            max_depth: Some(3),
            ..Default::default()
        };
        let settings = Settings::resolve(&args, &config).unwrap();
        assert_eq!(settings.type_name, "UIRoot");
        assert_eq!(settings.layout.string_data_offset, 24);
        assert_eq!(settings.scan.scope, ScanScope::Modules);
        assert_eq!(settings.limits.max_depth, Some(3));
    }

    #[test]
    fn test_missing_layout_file_is_an_error() {
        let args = ScanArgs {
            layout: Some(PathBuf::from("/nonexistent/layout.toml")),
            ..Default::default()
        };
        assert!(Settings::resolve(&args, &Config::default()).is_err());
    }

    #[test]
    fn test_sample_output_file_name() {
        let opened = OpenedSource::Sample {
            snapshot: Snapshot::from_segments(Vec::new()),
            sample_id: "0123456789ABCDEF".to_string(),
        };
        assert_eq!(
            opened.output_file_name(),
            "memory-reading-from-sample-01234567.json"
        );
    }

    #[test]
    fn test_open_sample_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.zip");
        fs::write(&path, b"not a zip").unwrap();

        assert!(open_sample(&path).is_err());
        assert!(open_sample(&dir.path().join("missing.zip")).is_err());
    }
}
