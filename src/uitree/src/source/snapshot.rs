//! Snapshot Memory Source
//!
//! Memory source backed by a captured process sample: a zip archive whose
//! `Process/Memory/` entries each hold the raw bytes of one address range.

use super::{MemoryRegion, MemorySource, Module};
use crate::{Address, Error, Result};

use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Path prefix of archive entries holding captured memory
pub const MEMORY_ENTRY_PREFIX: &str = "Process/Memory/";

/// One captured address range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySegment {
    pub base: Address,
    pub content: Vec<u8>,
}

impl MemorySegment {
    pub fn new(base: impl Into<Address>, content: Vec<u8>) -> Self {
        Self {
            base: base.into(),
            content,
        }
    }
}

/// Captured memory, immutable once loaded
pub struct Snapshot {
    /// Segment contents keyed by base address
    segments: BTreeMap<u64, Vec<u8>>,
    regions: Vec<MemoryRegion>,
    /// Archive path, when loaded from disk
    pub path: Option<PathBuf>,
}

impl Snapshot {
    /// Open a snapshot archive from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            Error::SourceUnavailable(format!("failed to open snapshot {}: {e}", path.display()))
        })?;

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            Error::SourceUnavailable(format!("failed to mmap snapshot {}: {e}", path.display()))
        })?;

        info!(
            "Opened snapshot {} ({} MB)",
            path.display(),
            mmap.len() / 1_000_000
        );

        let mut snapshot = Self::from_zip_bytes(&mmap)?;
        snapshot.path = Some(path);
        Ok(snapshot)
    }

    /// Parse a snapshot from in-memory archive bytes
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_zip_reader(Cursor::new(bytes))
    }

    /// Parse a snapshot from any seekable archive stream
    pub fn from_zip_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| Error::SourceUnavailable(format!("not a snapshot archive: {e}")))?;

        let mut segments = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| {
                Error::SourceUnavailable(format!("unreadable archive entry #{index}: {e}"))
            })?;

            let name = entry.name().to_string();
            let Some(remainder) = memory_entry_remainder(&name) else {
                continue;
            };

            let Some(base) = base_address_from_entry_name(remainder) else {
                debug!("Skipping memory entry without a base address: {name}");
                continue;
            };

            let mut content = Vec::with_capacity(capacity_hint(entry.size()));
            entry.read_to_end(&mut content).map_err(|e| {
                Error::SourceUnavailable(format!("failed to read archive entry {name}: {e}"))
            })?;

            segments.push(MemorySegment::new(base, content));
        }

        let snapshot = Self::from_segments(segments);
        info!(
            "Loaded {} memory segments ({} bytes)",
            snapshot.segments.len(),
            snapshot.total_bytes()
        );
        Ok(snapshot)
    }

    /// Build a snapshot from segments, in order.
    ///
    /// Empty segments are dropped. A segment overlapping one already
    /// accepted is skipped.
    pub fn from_segments(segments: impl IntoIterator<Item = MemorySegment>) -> Self {
        let mut accepted: BTreeMap<u64, Vec<u8>> = BTreeMap::new();

        for segment in segments {
            let base = segment.base.get();
            let len = segment.content.len() as u64;
            if len == 0 {
                continue;
            }
            let Some(end) = base.checked_add(len) else {
                warn!("Skipping segment at {:#x}: range overflows", base);
                continue;
            };

            let overlaps_previous = accepted
                .range(..=base)
                .next_back()
                .is_some_and(|(&prev, content)| prev + content.len() as u64 > base);
            let overlaps_next = accepted
                .range(base..)
                .next()
                .is_some_and(|(&next, _)| next < end);

            if overlaps_previous || overlaps_next {
                warn!(
                    "Skipping segment {:#x}-{:#x}: overlaps an earlier segment",
                    base, end
                );
                continue;
            }

            accepted.insert(base, segment.content);
        }

        let regions = accepted
            .iter()
            .map(|(&base, content)| {
                MemoryRegion::new(base, base + content.len() as u64, "r--p", None)
            })
            .collect();

        Snapshot {
            segments: accepted,
            regions,
            path: None,
        }
    }

    /// Iterate segments in address order
    pub fn segments(&self) -> impl Iterator<Item = (Address, &[u8])> {
        self.segments
            .iter()
            .map(|(&base, content)| (Address(base), content.as_slice()))
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }
}

impl MemorySource for Snapshot {
    fn read_bytes(&self, address: Address, length: usize) -> Option<Vec<u8>> {
        if length == 0 {
            return None;
        }

        let (&base, content) = self.segments.range(..=address.get()).next_back()?;
        let offset = usize::try_from(address.get() - base).ok()?;
        if offset >= content.len() {
            return None;
        }

        let end = offset.saturating_add(length).min(content.len());
        Some(content[offset..end].to_vec())
    }

    fn enumerate_modules(&self) -> Result<Vec<Module>> {
        Err(Error::ModulesUnsupported)
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// The part of an entry name after `Process/Memory/`, if it is a memory entry.
///
/// Matching ignores case and accepts `\` separators.
fn memory_entry_remainder(full_name: &str) -> Option<&str> {
    let prefix_len = MEMORY_ENTRY_PREFIX.len();
    let head = full_name.get(..prefix_len)?;
    let normalized = head.replace('\\', "/");
    if normalized.eq_ignore_ascii_case(MEMORY_ENTRY_PREFIX) {
        Some(&full_name[prefix_len..])
    } else {
        None
    }
}

/// Largest buffer reserved up front for one archive entry
const MAX_ENTRY_PREALLOC: usize = 64 << 20;

/// Reservation for an entry whose header declares `declared` bytes.
/// The header is untrusted; larger entries still grow while reading.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_ENTRY_PREALLOC, |size| size.min(MAX_ENTRY_PREALLOC))
}

/// Parse the first `0x<hex-digits>` literal in an entry name
pub fn base_address_from_entry_name(name: &str) -> Option<u64> {
    let bytes = name.as_bytes();
    let mut search_from = 0;

    while let Some(pos) = memchr::memchr(b'0', &bytes[search_from..]) {
        let start = search_from + pos;
        search_from = start + 1;

        if !matches!(bytes.get(start + 1), Some(b'x') | Some(b'X')) {
            continue;
        }

        let digits_start = start + 2;
        let digits_len = bytes[digits_start..]
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits_len == 0 {
            continue;
        }

        return u64::from_str_radix(&name[digits_start..digits_start + digits_len], 16).ok();
    }

    None
}
