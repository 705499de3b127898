//! Root Selection
//!
//! Every scanned candidate is expanded into a tree; the largest tree wins.
//! False-positive candidates decode as tiny or empty trees and lose on size.
//! A lone readable candidate is still a root, even without descendants.

use crate::reader::ObjectReader;
use crate::scanner::{ScanOptions, TypeCandidateScanner};
use crate::tree::{TraversalLimits, UiNode};
use crate::Address;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Reachable node count of one candidate (itself included).
/// Zero when the candidate's header cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    pub address: Address,
    pub node_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedRoot {
    pub node: UiNode,
    pub node_count: usize,
}

/// Score every candidate in parallel. Scores come back in input order.
pub fn score_candidates(
    reader: ObjectReader<'_>,
    candidates: &[Address],
    limits: TraversalLimits,
) -> Vec<CandidateScore> {
    candidates
        .par_iter()
        .map(|&address| {
            let node = UiNode::new(address);
            let node_count = if node.is_readable(reader) {
                node.count_nodes(reader, limits)
            } else {
                0
            };
            CandidateScore {
                address,
                node_count,
            }
        })
        .collect()
}

/// Pick the score with the strictly largest count; the first one wins ties.
/// Unreadable candidates never win.
fn best_of(scores: &[CandidateScore]) -> Option<CandidateScore> {
    let mut best: Option<CandidateScore> = None;
    for score in scores.iter().filter(|s| s.node_count > 0) {
        if best.map_or(true, |b| score.node_count > b.node_count) {
            best = Some(*score);
        }
    }
    best
}

/// The candidate with the largest reachable tree
pub fn select_root(
    reader: ObjectReader<'_>,
    candidates: &[Address],
    limits: TraversalLimits,
) -> Option<SelectedRoot> {
    let scores = score_candidates(reader, candidates, limits);
    for score in &scores {
        debug!("Candidate {} reaches {} nodes", score.address, score.node_count);
    }

    let best = best_of(&scores)?;
    info!(
        "Selected root {} with {} nodes out of {} candidates",
        best.address,
        best.node_count,
        candidates.len()
    );
    Some(SelectedRoot {
        node: UiNode::new(best.address),
        node_count: best.node_count,
    })
}

/// Scan for instances of `type_name` and select the largest tree among them
pub fn find_ui_root(
    reader: ObjectReader<'_>,
    type_name: &str,
    options: &ScanOptions,
    limits: TraversalLimits,
) -> Option<SelectedRoot> {
    let scanner = TypeCandidateScanner::new(reader, options.clone());
    let candidates = scanner.enumerate_candidate_addresses(type_name);
    if candidates.is_empty() {
        info!("No candidates for type '{}'", type_name);
        return None;
    }
    select_root(reader, &candidates, limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ObjectLayout;
    use crate::source::Snapshot;
    use crate::testing::ImageBuilder;

    /// A node of type `ty` at `address` with `n` leaf children
    fn tree(image: &mut ImageBuilder<'_>, address: u64, ty: Address, list_type: Address, n: u64) {
        let children: Vec<Address> = (1..=n).map(|i| Address(address + i * 0x20)).collect();
        for &child in &children {
            image.object(child.get(), ty);
        }
        let list = image.list(address + 0x10000, list_type, &children);
        image.node(address, ty, None, Some(list));
    }

    #[test]
    fn test_largest_tree_wins() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        let list = image.type_object(0x1100, "list");
        tree(&mut image, 0x100000, ty, list, 2);
        tree(&mut image, 0x200000, ty, list, 49);
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);

        let candidates = [Address(0x100000), Address(0x200000)];
        let root = select_root(reader, &candidates, TraversalLimits::default()).unwrap();
        assert_eq!(root.node.address, Address(0x200000));
        assert_eq!(root.node_count, 50);

        let scores = score_candidates(reader, &candidates, TraversalLimits::default());
        assert_eq!(scores[0].node_count, 3);
        assert_eq!(scores[1].node_count, 50);
    }

    #[test]
    fn test_tie_keeps_first_candidate() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        let list = image.type_object(0x1100, "list");
        tree(&mut image, 0x100000, ty, list, 3);
        tree(&mut image, 0x200000, ty, list, 3);
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);

        let forward = [Address(0x200000), Address(0x100000)];
        let root = select_root(reader, &forward, TraversalLimits::default()).unwrap();
        assert_eq!(root.node.address, Address(0x200000));
    }

    #[test]
    fn test_no_readable_candidates_is_no_root() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        image.object(0x2000, ty);
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);
        let limits = TraversalLimits::default();

        assert!(select_root(reader, &[], limits).is_none());
        assert!(select_root(reader, &[Address(0xdead0000)], limits).is_none());
        assert_eq!(
            score_candidates(reader, &[Address(0xdead0000)], limits)[0].node_count,
            0
        );
    }

    #[test]
    fn test_leaf_candidate_is_a_root() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        image.object(0x2000, ty);
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);

        let candidates = [Address(0xdead0000), Address(0x2000)];
        let root = select_root(reader, &candidates, TraversalLimits::default()).unwrap();
        assert_eq!(root.node.address, Address(0x2000));
        assert_eq!(root.node_count, 1);
    }

    #[test]
    fn test_find_ui_root_on_leaf_with_string_key() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        let str_type = image.type_object(0x1100, "str");
        let key = image.str_object(0x2100, str_type, "k");
        let value = image.str_object(0x2200, str_type, "v");
        let dict = image.dict(0x2300, &[(key, value)]);
        image.node(0x2000, ty, Some(dict), None);
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);
        let limits = TraversalLimits::default();

        let root = find_ui_root(reader, "UIRoot", &ScanOptions::default(), limits).unwrap();
        assert_eq!(root.node.address, Address(0x2000));
        assert_eq!(root.node_count, 1);
        assert_eq!(root.node.string_entries(reader), vec![("k".to_string(), value)]);
        assert_eq!(reader.read_str(value).as_deref(), Some("v"));
    }

    #[test]
    fn test_find_ui_root_from_scan() {
        let layout = ObjectLayout::default();
        let mut image = ImageBuilder::new(&layout);
        let ty = image.type_object(0x1000, "UIRoot");
        let list = image.type_object(0x1100, "list");
        let children: Vec<Address> = (0..4).map(|i| Address(0x3000 + i * 0x100)).collect();
        for &child in &children {
            // Children are of another type, so only 0x2000 is a candidate
            image.object(child.get(), list);
        }
        let child_list = image.list(0x10000, list, &children);
        image.node(0x2000, ty, None, Some(child_list));
        let snapshot = image.build();
        let reader = ObjectReader::new(&snapshot, &layout);

        let limits = TraversalLimits::default();
        let root = find_ui_root(reader, "UIRoot", &ScanOptions::default(), limits).unwrap();
        assert_eq!(root.node.address, Address(0x2000));
        assert_eq!(root.node.enumerate_children_transitive(reader, limits).count(), 4);
    }

    #[test]
    fn test_find_ui_root_without_matches() {
        let layout = ObjectLayout::default();
        let snapshot = Snapshot::from_segments(Vec::new());
        let reader = ObjectReader::new(&snapshot, &layout);

        let limits = TraversalLimits::default();
        assert!(find_ui_root(reader, "UIRoot", &ScanOptions::default(), limits).is_none());
    }
}
