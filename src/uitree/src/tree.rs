//! UI Tree Traversal
//!
//! A [`UiNode`] is only an address. Its dict and children are decoded on
//! demand through an [`ObjectReader`], so nodes are cheap to create, compare,
//! and recreate. Traversals keep their own visited set and are restartable.

use crate::layout::ChildrenLocator;
use crate::reader::{DictSlot, ObjectReader};
use crate::Address;

use std::collections::HashSet;

/// Bounds for a single traversal. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Stop after yielding this many nodes
    pub max_nodes: Option<usize>,
    /// Do not expand nodes this deep (the start node is depth 0)
    pub max_depth: Option<usize>,
}

impl TraversalLimits {
    pub fn new(max_nodes: Option<usize>, max_depth: Option<usize>) -> Self {
        Self {
            max_nodes,
            max_depth,
        }
    }
}

/// A UI element identified by its base address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UiNode {
    pub address: Address,
}

impl UiNode {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Non-null with a decodable object header
    pub fn is_readable(&self, reader: ObjectReader<'_>) -> bool {
        !self.address.is_null() && reader.read_header(self.address).is_some()
    }

    pub fn type_name(&self, reader: ObjectReader<'_>) -> Option<String> {
        reader.read_object_type_name(self.address)
    }

    pub fn dict_address(&self, reader: ObjectReader<'_>) -> Option<Address> {
        reader.read_instance_dict(self.address)
    }

    /// Occupied slots of the instance dict
    pub fn dict(&self, reader: ObjectReader<'_>) -> Option<Vec<DictSlot>> {
        reader.read_dict_slots(self.dict_address(reader)?)
    }

    /// Instance dict entries whose key is a string, in table order
    pub fn string_entries(&self, reader: ObjectReader<'_>) -> Vec<(String, Address)> {
        self.dict(reader)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|slot| slot.key_str().map(|key| (key.to_string(), slot.value)))
            .collect()
    }

    /// Address of the list object holding this node's children
    pub fn children_list(&self, reader: ObjectReader<'_>) -> Option<Address> {
        match &reader.layout().children {
            ChildrenLocator::Field { offset } => {
                reader.source().read_pointer(self.address.checked_add(*offset)?)
            }
            ChildrenLocator::DictPath { keys } => {
                let (last, path) = keys.split_last()?;
                let mut owner = self.address;
                for key in path {
                    let dict = reader.read_instance_dict(owner)?;
                    owner = reader.lookup_str_key(dict, key)?;
                }
                reader.lookup_str_key(reader.read_instance_dict(owner)?, last)
            }
        }
    }

    /// Direct child addresses, unvalidated. `None` means the node is a leaf.
    pub fn children(&self, reader: ObjectReader<'_>) -> Option<Vec<Address>> {
        reader.read_list_items(self.children_list(reader)?)
    }

    /// Lazy pre-order iterator over every node reachable below this one,
    /// excluding this node
    pub fn enumerate_children_transitive<'a>(
        &self,
        reader: ObjectReader<'a>,
        limits: TraversalLimits,
    ) -> Descendants<'a> {
        Descendants::new(reader, self.address, limits, false)
    }

    /// Like [`enumerate_children_transitive`](Self::enumerate_children_transitive),
    /// but yields this node first
    pub fn walk<'a>(&self, reader: ObjectReader<'a>, limits: TraversalLimits) -> Descendants<'a> {
        Descendants::new(reader, self.address, limits, true)
    }

    /// 1 + number of reachable descendants
    pub fn count_nodes(&self, reader: ObjectReader<'_>, limits: TraversalLimits) -> usize {
        1 + self.enumerate_children_transitive(reader, limits).count()
    }
}

/// Depth-first traversal state: pending nodes and every address seen so far
pub struct Descendants<'a> {
    reader: ObjectReader<'a>,
    limits: TraversalLimits,
    stack: Vec<(Address, usize)>,
    visited: HashSet<Address>,
    yielded: usize,
}

impl<'a> Descendants<'a> {
    fn new(
        reader: ObjectReader<'a>,
        root: Address,
        limits: TraversalLimits,
        include_root: bool,
    ) -> Self {
        let mut iter = Self {
            reader,
            limits,
            stack: Vec::new(),
            visited: HashSet::new(),
            yielded: 0,
        };

        iter.visited.insert(root);
        if include_root {
            iter.stack.push((root, 0));
        } else {
            iter.expand(root, 0);
        }
        iter
    }

    /// Queue the unseen, readable children of `address`
    fn expand(&mut self, address: Address, depth: usize) {
        if self.limits.max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        let Some(children) = UiNode::new(address).children(self.reader) else {
            return;
        };

        let mut accepted = Vec::with_capacity(children.len());
        for child in children {
            if self.visited.contains(&child) || !UiNode::new(child).is_readable(self.reader) {
                continue;
            }
            self.visited.insert(child);
            accepted.push((child, depth + 1));
        }

        // Reversed so the first child is popped first
        self.stack.extend(accepted.into_iter().rev());
    }

    /// Number of nodes yielded so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl Iterator for Descendants<'_> {
    type Item = UiNode;

    fn next(&mut self) -> Option<UiNode> {
        if self.limits.max_nodes.is_some_and(|max| self.yielded >= max) {
            self.stack.clear();
            return None;
        }

        let (address, depth) = self.stack.pop()?;
        self.expand(address, depth);
        self.yielded += 1;
        Some(UiNode::new(address))
    }
}
