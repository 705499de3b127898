//! Synthetic memory images for tests.
//!
//! Writes little-endian objects at chosen addresses following an
//! [`ObjectLayout`], then packs every contiguous run of written bytes into
//! one snapshot segment.

use crate::layout::{ChildrenLocator, ObjectLayout};
use crate::source::{MemorySegment, Snapshot};
use crate::Address;

use std::collections::BTreeMap;

/// Offset of inline payloads (names, tables, items) from their owner
const PAYLOAD_OFFSET: u64 = 0x40;

pub struct ImageBuilder<'a> {
    layout: &'a ObjectLayout,
    bytes: BTreeMap<u64, u8>,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(layout: &'a ObjectLayout) -> Self {
        Self {
            layout,
            bytes: BTreeMap::new(),
        }
    }

    pub fn bytes(&mut self, address: u64, data: &[u8]) -> &mut Self {
        for (i, byte) in data.iter().enumerate() {
            self.bytes.insert(address + i as u64, *byte);
        }
        self
    }

    pub fn qword(&mut self, address: u64, value: i64) -> &mut Self {
        self.bytes(address, &value.to_le_bytes())
    }

    fn header(&mut self, address: u64, type_pointer: Address) {
        self.qword(address + self.layout.refcount_offset, 1);
        self.qword(
            address + self.layout.type_pointer_offset,
            type_pointer.get() as i64,
        );
    }

    /// A type object named `name`; the name string follows the object
    pub fn type_object(&mut self, address: u64, name: &str) -> Address {
        self.type_object_with_meta(address, name, Address::NULL)
    }

    pub fn type_object_with_meta(&mut self, address: u64, name: &str, meta: Address) -> Address {
        let name_address = address + PAYLOAD_OFFSET;
        self.header(address, meta);
        self.qword(address + self.layout.type_name_offset, name_address as i64);
        self.bytes(name_address, name.as_bytes());
        self.bytes(name_address + name.len() as u64, &[0]);
        Address(address)
    }

    /// A plain object with null dict and children fields
    pub fn object(&mut self, address: u64, type_pointer: Address) -> Address {
        self.node(address, type_pointer, None, None)
    }

    /// A UI node with optional instance dict and child list (fixed-field locator only)
    pub fn node(
        &mut self,
        address: u64,
        type_pointer: Address,
        dict: Option<Address>,
        children: Option<Address>,
    ) -> Address {
        self.header(address, type_pointer);
        self.qword(
            address + self.layout.node_dict_offset,
            dict.map_or(0, |d| d.get() as i64),
        );
        if let ChildrenLocator::Field { offset } = self.layout.children {
            self.qword(address + offset, children.map_or(0, |c| c.get() as i64));
        }
        Address(address)
    }

    pub fn str_object(&mut self, address: u64, str_type: Address, text: &str) -> Address {
        self.header(address, str_type);
        let data = address + self.layout.string_data_offset;
        self.bytes(data, text.as_bytes());
        self.bytes(data + text.len() as u64, &[0]);
        Address(address)
    }

    /// A dict object whose table holds `entries` (key, value) in order
    pub fn dict(&mut self, address: u64, entries: &[(Address, Address)]) -> Address {
        let slots = entries.len().max(1).next_power_of_two() as u64;
        let table = address + PAYLOAD_OFFSET;
        self.raw_dict(address, slots as i64 - 1, table);

        let stride = self.layout.dict_slot_stride;
        for i in 0..slots {
            let slot = table + i * stride;
            let (key, value) = entries
                .get(i as usize)
                .copied()
                .unwrap_or((Address::NULL, Address::NULL));
            self.qword(slot, 0x5eed + i as i64);
            self.qword(slot + self.layout.dict_slot_key_offset, key.get() as i64);
            self.qword(slot + self.layout.dict_slot_value_offset, value.get() as i64);
        }
        Address(address)
    }

    /// A dict header with an arbitrary mask and table pointer
    pub fn raw_dict(&mut self, address: u64, mask: i64, table: u64) -> Address {
        self.header(address, Address::NULL);
        self.qword(address + self.layout.dict_mask_offset, mask);
        self.qword(address + self.layout.dict_table_offset, table as i64);
        Address(address)
    }

    pub fn list(&mut self, address: u64, list_type: Address, items: &[Address]) -> Address {
        let storage = address + PAYLOAD_OFFSET;
        self.header(address, list_type);
        self.qword(address + self.layout.list_size_offset, items.len() as i64);
        self.qword(
            address + self.layout.list_items_offset,
            if items.is_empty() { 0 } else { storage as i64 },
        );
        for (i, item) in items.iter().enumerate() {
            self.qword(storage + 8 * i as u64, item.get() as i64);
        }
        Address(address)
    }

    pub fn build(&self) -> Snapshot {
        let mut segments: Vec<MemorySegment> = Vec::new();
        let mut current: Option<(u64, Vec<u8>)> = None;

        for (&address, &byte) in &self.bytes {
            match current.as_mut() {
                Some((base, content)) if *base + content.len() as u64 == address => {
                    content.push(byte);
                }
                _ => {
                    if let Some((base, content)) = current.take() {
                        segments.push(MemorySegment::new(base, content));
                    }
                    current = Some((address, vec![byte]));
                }
            }
        }
        if let Some((base, content)) = current {
            segments.push(MemorySegment::new(base, content));
        }

        Snapshot::from_segments(segments)
    }
}
