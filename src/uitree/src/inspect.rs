//! Inspection Output
//!
//! Materializes a selected root into a serializable tree of addresses and
//! string-keyed dict entries.

use crate::reader::ObjectReader;
use crate::tree::{TraversalLimits, UiNode};
use crate::{Address, Result};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

/// Deepest level expanded by [`inspect`], whatever the traversal limits say.
/// Keeps the nested output within what recursive drop and serialization handle.
pub const MAX_INSPECT_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringEntry {
    #[serde(rename = "keyString")]
    pub key: String,
    pub value_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedNode {
    pub address: Address,
    /// `None` when the instance dict could not be decoded
    #[serde(rename = "dictEntriesWithStringKey")]
    pub dict_entries_with_string_key: Option<Vec<StringEntry>>,
    /// `None` when the child list could not be resolved or was not expanded
    pub children: Option<Vec<InspectedNode>>,
}

impl InspectedNode {
    /// Nodes in this subtree, itself included
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter().flatten());
        }
        count
    }
}

/// One emitted node, in pre-order. `children` holds indices of later entries.
struct Entry {
    address: Address,
    dict_entries_with_string_key: Option<Vec<StringEntry>>,
    children: Option<Vec<usize>>,
}

struct Inspector<'a> {
    reader: ObjectReader<'a>,
    limits: TraversalLimits,
    max_depth: usize,
    visited: HashSet<Address>,
    entries: Vec<Entry>,
}

impl Inspector<'_> {
    fn at_node_limit(&self) -> bool {
        self.limits.max_nodes.is_some_and(|max| self.entries.len() >= max)
    }

    fn string_entries(&self, node: UiNode) -> Option<Vec<StringEntry>> {
        node.dict(self.reader).map(|slots| {
            slots
                .into_iter()
                .filter_map(|slot| {
                    slot.key_str().map(|key| StringEntry {
                        key: key.to_string(),
                        value_address: slot.value,
                    })
                })
                .collect()
        })
    }

    /// Children of `node` not yet claimed by another parent.
    /// Every sibling is claimed before any of them is expanded, so a node
    /// reachable from several parents lands under the first one.
    fn claim_children(&mut self, node: UiNode, depth: usize) -> Option<Vec<Address>> {
        if depth >= self.max_depth {
            if self.limits.max_depth.map_or(true, |max| max > depth) {
                debug!("Inspection stops expanding {} at depth {}", node.address, depth);
            }
            return None;
        }

        let children = node.children(self.reader)?;
        let mut accepted = Vec::with_capacity(children.len());
        for child in children {
            if self.visited.contains(&child) || !UiNode::new(child).is_readable(self.reader) {
                continue;
            }
            self.visited.insert(child);
            accepted.push(child);
        }
        Some(accepted)
    }

    /// Emit nodes depth first with an explicit stack
    fn run(&mut self, root: Address) {
        // (address, depth, parent entry)
        let mut stack: Vec<(Address, usize, Option<usize>)> = vec![(root, 0, None)];

        while let Some((address, depth, parent)) = stack.pop() {
            if parent.is_some() && self.at_node_limit() {
                break;
            }

            let node = UiNode::new(address);
            let index = self.entries.len();
            let dict_entries_with_string_key = self.string_entries(node);
            let claimed = self.claim_children(node, depth);

            if let Some(parent) = parent {
                if let Some(siblings) = self.entries[parent].children.as_mut() {
                    siblings.push(index);
                }
            }
            self.entries.push(Entry {
                address,
                dict_entries_with_string_key,
                children: claimed.as_ref().map(|_| Vec::new()),
            });

            for child in claimed.into_iter().flatten().rev() {
                stack.push((child, depth + 1, Some(index)));
            }
        }
    }

    /// Assemble the nested tree. Children always follow their parent in
    /// pre-order, so walking the entries backwards finds them built.
    fn into_tree(self, root: Address) -> InspectedNode {
        let mut built: Vec<Option<InspectedNode>> = Vec::with_capacity(self.entries.len());
        built.resize_with(self.entries.len(), || None);

        for (index, entry) in self.entries.into_iter().enumerate().rev() {
            let children = entry.children.map(|indices| {
                indices
                    .into_iter()
                    .filter_map(|child| built[child].take())
                    .collect()
            });
            built[index] = Some(InspectedNode {
                address: entry.address,
                dict_entries_with_string_key: entry.dict_entries_with_string_key,
                children,
            });
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or(InspectedNode {
                address: root,
                dict_entries_with_string_key: None,
                children: None,
            })
    }
}

/// Inspect the tree below `root`. Each address is emitted at most once.
/// Expansion never goes deeper than [`MAX_INSPECT_DEPTH`].
pub fn inspect(reader: ObjectReader<'_>, root: Address, limits: TraversalLimits) -> InspectedNode {
    let max_depth = limits
        .max_depth
        .map_or(MAX_INSPECT_DEPTH, |max| max.min(MAX_INSPECT_DEPTH));
    let mut inspector = Inspector {
        reader,
        limits,
        max_depth,
        visited: HashSet::from([root]),
        entries: Vec::new(),
    };
    inspector.run(root);
    inspector.into_tree(root)
}

pub fn to_json_pretty(node: &InspectedNode) -> Result<String> {
    Ok(serde_json::to_string_pretty(node)?)
}

/// Upper-case hex SHA-256 of a snapshot file, used to name outputs
pub fn sample_id(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}
