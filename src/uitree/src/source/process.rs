//! Live Process Memory Source
//!
//! Memory source implementation for reading from a running process.

use super::{MemoryRegion, MemorySource, Module};
use crate::{Address, Error, Result};

use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use std::fs::File;
use std::io::{BufRead, BufReader};
use sysinfo::{Pid, System};
use tracing::{debug, info};

/// Granularity used when a read has to be split to find its readable prefix
pub const PAGE_SIZE: u64 = 0x1000;

/// An attached target process
pub struct LiveProcess {
    pub pid: u32,
    pub name: String,
    handle: ProcessHandle,
    maps: Vec<MemoryRegion>,
}

// SAFETY: the handle is only used for cross-process reads, which are
// process-wide and may be issued from any thread.
unsafe impl Send for LiveProcess {}
unsafe impl Sync for LiveProcess {}

impl LiveProcess {
    /// Attach to a running process by id
    pub fn attach(pid: u32) -> Result<Self> {
        let mut system = System::new_all();
        system.refresh_all();

        let process = system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| Error::SourceUnavailable(format!("process {pid} not found")))?;
        let name = process.name().to_string_lossy().into_owned();

        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .map_err(|e| {
                Error::SourceUnavailable(format!("failed to open process {pid}: {e}"))
            })?;

        let maps: Vec<MemoryRegion> = parse_maps(pid)?
            .into_iter()
            .filter(MemoryRegion::is_readable)
            .collect();

        info!(
            "Attached to {} (PID {}), {} readable regions",
            name,
            pid,
            maps.len()
        );

        Ok(LiveProcess {
            pid,
            name,
            handle,
            maps,
        })
    }

    fn copy(&self, address: u64, buffer: &mut [u8]) -> bool {
        let Ok(address) = usize::try_from(address) else {
            return false;
        };
        self.handle.copy_address(address, buffer).is_ok()
    }

    /// Read page by page from `address`, stopping at the first unreadable page
    fn read_prefix(&self, address: u64, length: usize) -> Option<Vec<u8>> {
        let mut result = Vec::new();
        let mut cursor = address;
        let end = address.saturating_add(length as u64);

        while cursor < end {
            let page_end = (cursor / PAGE_SIZE + 1).saturating_mul(PAGE_SIZE);
            let chunk_len = (page_end.min(end) - cursor) as usize;
            let mut chunk = vec![0u8; chunk_len];
            if !self.copy(cursor, &mut chunk) {
                break;
            }
            result.extend_from_slice(&chunk);
            cursor += chunk_len as u64;
        }

        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }
}

impl MemorySource for LiveProcess {
    fn read_bytes(&self, address: Address, length: usize) -> Option<Vec<u8>> {
        if length == 0 || address.is_null() {
            return None;
        }

        let mut buffer = vec![0u8; length];
        if self.copy(address.get(), &mut buffer) {
            return Some(buffer);
        }

        // Part of the range may be unmapped or have changed since the maps were read
        self.read_prefix(address.get(), length)
    }

    fn enumerate_modules(&self) -> Result<Vec<Module>> {
        Ok(Module::from_regions(&self.maps))
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.maps
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Find a running process by executable name.
///
/// When several match, the one using the most memory wins.
pub fn find_process_by_name(name: &str) -> Result<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    let wanted = name.to_lowercase();
    let mut candidates: Vec<(u32, u64)> = system
        .processes()
        .values()
        .filter(|p| {
            let process_name = p.name().to_string_lossy().to_lowercase();
            process_name == wanted || process_name.trim_end_matches(".exe") == wanted
        })
        .map(|p| (p.pid().as_u32(), p.memory()))
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    for (pid, memory) in &candidates {
        debug!("Candidate process {}: PID {} ({} MB)", name, pid, memory / 1_000_000);
    }

    candidates
        .first()
        .map(|(pid, _)| *pid)
        .ok_or_else(|| Error::SourceUnavailable(format!("no process named {name:?} found")))
}

/// Parse /proc/pid/maps to get memory regions
pub fn parse_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let maps_path = format!("/proc/{}/maps", pid);
    let file = File::open(&maps_path).map_err(|e| {
        Error::SourceUnavailable(format!(
            "failed to open {maps_path}: {e}. Do you have permission?"
        ))
    })?;

    let mut regions = Vec::new();
    for line in BufReader::new(file).lines() {
        let line =
            line.map_err(|e| Error::SourceUnavailable(format!("failed to read {maps_path}: {e}")))?;
        if let Some(region) = parse_maps_line(&line) {
            regions.push(region);
        }
    }

    Ok(regions)
}

/// Parse one `/proc/pid/maps` line: `start-end perms offset dev inode [path]`
pub fn parse_maps_line(line: &str) -> Option<MemoryRegion> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (start, end) = parts.first()?.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    if end <= start {
        return None;
    }

    let perms = parts.get(1).copied().unwrap_or("");
    let path = if parts.len() > 5 {
        Some(parts[5..].join(" "))
    } else {
        None
    };

    Some(MemoryRegion::new(start, end, perms, path))
}
