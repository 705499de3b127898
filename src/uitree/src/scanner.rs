//! Type Candidate Scanner
//!
//! Finds plausible instances of a named type without a symbol table. The scan
//! runs in two passes over every readable region:
//! 1. Find the name as a NUL-terminated string, then every aligned pointer to
//!    it. Each pointer location is a `tp_name` field of a candidate type object.
//! 2. Find every aligned pointer to a verified type object. Each is the
//!    `ob_type` field of a candidate instance.
//!
//! Candidates are possibilities, not facts. Root selection validates them.

use crate::pattern::{find_aligned_values, find_all, POINTER_ALIGNMENT};
use crate::reader::ObjectReader;
use crate::source::MemoryRegion;
use crate::{Address, Error};

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Which address ranges a scan reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanScope {
    /// Every readable region of the source
    #[default]
    AllRegions,
    /// Regions clipped to loaded module ranges
    Modules,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub scope: ScanScope,
    /// Regions larger than this are skipped
    pub max_region_size: u64,
    /// Bytes read per request
    pub chunk_size: usize,
    /// Keep only type candidates whose own type has this name (e.g. "type")
    pub metatype_name: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scope: ScanScope::AllRegions,
            max_region_size: 256 * 1024 * 1024,
            chunk_size: 16 * 1024 * 1024,
            metatype_name: None,
        }
    }
}

/// What a scan found, for diagnostics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub type_name: String,
    /// Addresses of the NUL-terminated name string
    pub name_strings: Vec<Address>,
    /// Verified type objects named `type_name`
    pub type_candidates: Vec<Address>,
    /// Sorted, deduplicated instance base addresses
    pub object_candidates: Vec<Address>,
    pub bytes_scanned: u64,
}

pub struct TypeCandidateScanner<'a> {
    reader: ObjectReader<'a>,
    options: ScanOptions,
}

impl<'a> TypeCandidateScanner<'a> {
    pub fn new(reader: ObjectReader<'a>, options: ScanOptions) -> Self {
        Self { reader, options }
    }

    /// Address ranges `[start, end)` this scanner reads, ascending
    pub fn scan_ranges(&self) -> Vec<(u64, u64)> {
        let source = self.reader.source();
        let regions: Vec<&MemoryRegion> = source
            .regions()
            .iter()
            .filter(|r| r.is_readable())
            .filter(|r| {
                if r.size() > self.options.max_region_size {
                    debug!(
                        "Skipping region {:#x}-{:#x} ({} bytes exceeds limit)",
                        r.start,
                        r.end,
                        r.size()
                    );
                    return false;
                }
                true
            })
            .collect();

        let mut ranges: Vec<(u64, u64)> = match self.options.scope {
            ScanScope::AllRegions => regions.iter().map(|r| (r.start, r.end)).collect(),
            ScanScope::Modules => match source.enumerate_modules() {
                Ok(modules) => {
                    let mut clipped = Vec::new();
                    for region in &regions {
                        for module in &modules {
                            let start = region.start.max(module.base.get());
                            let end = region.end.min(module.end());
                            if start < end {
                                clipped.push((start, end));
                            }
                        }
                    }
                    clipped
                }
                Err(Error::ModulesUnsupported) => {
                    debug!("Module enumeration unsupported, scanning all regions");
                    regions.iter().map(|r| (r.start, r.end)).collect()
                }
                Err(e) => {
                    debug!("Module enumeration failed ({}), scanning all regions", e);
                    regions.iter().map(|r| (r.start, r.end)).collect()
                }
            },
        };

        ranges.sort_unstable();
        ranges.dedup();
        ranges
    }

    /// Read every range in chunks. `visit` gets the chunk's base address, the
    /// bytes read (including up to `overlap` bytes past the chunk) and the
    /// number of leading bytes that belong to this chunk. Matches starting
    /// beyond that count are reported by the next chunk.
    fn for_each_chunk<F>(&self, ranges: &[(u64, u64)], overlap: usize, mut visit: F) -> u64
    where
        F: FnMut(u64, &[u8], usize),
    {
        let chunk_size = (self.options.chunk_size.max(8) as u64) & !(POINTER_ALIGNMENT - 1);
        let mut scanned = 0u64;

        for &(start, end) in ranges {
            let mut cursor = start;
            while cursor < end {
                let want = chunk_size.min(end - cursor);
                let read_len = (want + overlap as u64).min(end - cursor);

                let data = self
                    .reader
                    .source()
                    .read_bytes(Address(cursor), read_len as usize);
                if let Some(data) = data {
                    let owned = (want as usize).min(data.len());
                    scanned += owned as u64;
                    visit(cursor, &data, owned);
                }

                cursor += want;
            }
        }

        scanned
    }

    /// Addresses of every aligned qword whose value is in `values`
    fn find_pointers_to(&self, ranges: &[(u64, u64)], values: &HashSet<u64>) -> (Vec<u64>, u64) {
        let mut found = Vec::new();
        if values.is_empty() {
            return (found, 0);
        }

        let scanned = self.for_each_chunk(ranges, 7, |base, data, owned| {
            for offset in find_aligned_values(data, base, values) {
                if offset < owned {
                    found.push(base + offset as u64);
                }
            }
        });

        (found, scanned)
    }

    /// Every occurrence of `type_name` followed by a NUL byte
    pub fn find_name_strings(&self, ranges: &[(u64, u64)], type_name: &str) -> (Vec<Address>, u64) {
        let mut needle = type_name.as_bytes().to_vec();
        needle.push(0);

        let mut found = Vec::new();
        let scanned = self.for_each_chunk(ranges, needle.len() - 1, |base, data, owned| {
            for offset in find_all(data, &needle) {
                if offset < owned {
                    found.push(Address(base + offset as u64));
                }
            }
        });

        (found, scanned)
    }

    /// Verified type objects named `type_name`, given the addresses of its name strings
    pub fn find_type_candidates(
        &self,
        ranges: &[(u64, u64)],
        type_name: &str,
        name_strings: &[Address],
    ) -> (Vec<Address>, u64) {
        let targets: HashSet<u64> = name_strings.iter().map(|a| a.get()).collect();
        let (fields, scanned) = self.find_pointers_to(ranges, &targets);
        let layout = self.reader.layout();

        let candidates: BTreeSet<Address> = fields
            .into_iter()
            .filter_map(|field| field.checked_sub(layout.type_name_offset))
            .map(Address)
            .filter(|&candidate| {
                self.reader.read_type_name(candidate).as_deref() == Some(type_name)
            })
            .filter(|&candidate| match &self.options.metatype_name {
                None => true,
                Some(meta) => {
                    self.reader.read_object_type_name(candidate).as_deref() == Some(meta.as_str())
                }
            })
            .collect();

        (candidates.into_iter().collect(), scanned)
    }

    /// Objects whose type pointer field holds one of `types`
    pub fn find_instances_of_types(
        &self,
        ranges: &[(u64, u64)],
        types: &[Address],
    ) -> (Vec<Address>, u64) {
        let targets: HashSet<u64> = types.iter().map(|a| a.get()).collect();
        let (fields, scanned) = self.find_pointers_to(ranges, &targets);
        let offset = self.reader.layout().type_pointer_offset;

        let objects: BTreeSet<Address> = fields
            .into_iter()
            .filter_map(|field| field.checked_sub(offset))
            .map(Address)
            .collect();

        (objects.into_iter().collect(), scanned)
    }

    /// Run both passes for `type_name`
    pub fn scan(&self, type_name: &str) -> ScanReport {
        let ranges = self.scan_ranges();
        let total: u64 = ranges.iter().map(|(s, e)| e - s).sum();
        debug!("Scanning {} ranges ({} bytes) for type '{}'", ranges.len(), total, type_name);

        let mut report = ScanReport {
            type_name: type_name.to_string(),
            ..Default::default()
        };

        if type_name.is_empty() {
            return report;
        }

        let (name_strings, scanned) = self.find_name_strings(&ranges, type_name);
        report.bytes_scanned += scanned;
        debug!("Found {} occurrences of '{}'", name_strings.len(), type_name);

        if !name_strings.is_empty() {
            let (types, scanned) = self.find_type_candidates(&ranges, type_name, &name_strings);
            report.bytes_scanned += scanned;
            debug!("Found {} type candidates", types.len());

            if !types.is_empty() {
                let (objects, scanned) = self.find_instances_of_types(&ranges, &types);
                report.bytes_scanned += scanned;
                report.object_candidates = objects;
            }
            report.type_candidates = types;
        }
        report.name_strings = name_strings;

        info!(
            "Scan for '{}': {} type candidates, {} object candidates",
            type_name,
            report.type_candidates.len(),
            report.object_candidates.len()
        );

        report
    }

    /// Sorted, deduplicated instance candidates for `type_name`
    pub fn enumerate_candidate_addresses(&self, type_name: &str) -> Vec<Address> {
        self.scan(type_name).object_candidates
    }
}
