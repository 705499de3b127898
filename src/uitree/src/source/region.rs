//! Memory Region Types
//!
//! Scannable address ranges and loaded modules.

use crate::Address;
use serde::Serialize;

/// A scannable range `[start, end)` of the target address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    /// Permission string in /proc/pid/maps form ("r-xp")
    pub perms: String,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn new(start: u64, end: u64, perms: &str, path: Option<String>) -> Self {
        Self {
            start,
            end,
            perms: perms.to_string(),
            path,
        }
    }

    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, address: Address) -> bool {
        address.get() >= self.start && address.get() < self.end
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }

    /// Whether this mapping is backed by a file on disk (not `[heap]`, `[stack]`, anonymous)
    pub fn is_file_backed(&self) -> bool {
        self.path
            .as_deref()
            .map(|p| !p.is_empty() && !p.starts_with('['))
            .unwrap_or(false)
    }
}

/// A module loaded into the target: `(name, base, size)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub name: String,
    pub base: Address,
    pub size: u64,
}

impl Module {
    pub fn end(&self) -> u64 {
        self.base.get().saturating_add(self.size)
    }

    /// Group file-backed regions into modules, one per distinct path, ordered by base
    pub fn from_regions(regions: &[MemoryRegion]) -> Vec<Module> {
        let mut modules: Vec<Module> = Vec::new();

        for region in regions.iter().filter(|r| r.is_file_backed()) {
            let Some(path) = region.path.as_deref() else {
                continue;
            };

            match modules.iter_mut().find(|m| m.name == path) {
                Some(module) => {
                    let start = module.base.get().min(region.start);
                    let end = module.end().max(region.end);
                    module.base = Address(start);
                    module.size = end - start;
                }
                None => modules.push(Module {
                    name: path.to_string(),
                    base: Address(region.start),
                    size: region.size(),
                }),
            }
        }

        modules.sort_by_key(|m| m.base);
        modules
    }
}
