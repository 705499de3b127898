//! Candidates command handler

use anyhow::{Context, Result};
use serde::Serialize;
use uitree::{score_candidates, CandidateScore, ObjectReader, ScanReport, TypeCandidateScanner};

use super::{open_source, Settings};
use crate::cli::{ScanArgs, SourceArgs};
use crate::config::Config;

#[derive(Serialize)]
struct CandidatesOutput<'a> {
    scan: &'a ScanReport,
    scores: &'a [CandidateScore],
}

/// Handle the candidates command
pub fn handle(source: &SourceArgs, scan: &ScanArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let settings = Settings::resolve(scan, &config)?;
    let opened = open_source(source)?;
    let reader = ObjectReader::new(opened.source(), &settings.layout);

    let scanner = TypeCandidateScanner::new(reader, settings.scan.clone());
    let report = scanner.scan(&settings.type_name);
    let scores = score_candidates(reader, &report.object_candidates, settings.limits);

    if json {
        let output = CandidatesOutput {
            scan: &report,
            scores: &scores,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize candidates")?
        );
        return Ok(());
    }

    println!(
        "Type '{}': {} type objects, {} instances ({} bytes scanned)",
        settings.type_name,
        report.type_candidates.len(),
        report.object_candidates.len(),
        report.bytes_scanned
    );
    for ty in &report.type_candidates {
        println!("  type {}", ty);
    }
    for score in &scores {
        println!("  {:#018x}  {:>8} nodes", score.address.get(), score.node_count);
    }

    Ok(())
}
