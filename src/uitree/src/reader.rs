//! Object Model Reader
//!
//! Decodes fixed-offset fields of interpreter objects through a
//! [`MemorySource`]. Every decode is fallible and local: a field that cannot
//! be read or parsed comes back as `None` and never poisons the caller.

use crate::layout::ObjectLayout;
use crate::source::{MemorySource, FIELD_WIDTH, PAGE_SIZE};
use crate::Address;

use byteorder::{ByteOrder, LE};
use std::collections::HashMap;

/// Common prefix of every object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub refcount: i64,
    pub type_pointer: Address,
}

/// An object believed to describe a runtime type. May be a false positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub address: Address,
    pub name: String,
}

/// How a dict key was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictKey {
    /// The key object is an instance of the layout's string type
    Str(String),
    Unclassified,
}

/// One occupied slot of a dict's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictSlot {
    pub key: DictKey,
    pub key_address: Address,
    pub value: Address,
}

impl DictSlot {
    pub fn key_str(&self) -> Option<&str> {
        match &self.key {
            DictKey::Str(s) => Some(s),
            DictKey::Unclassified => None,
        }
    }
}

/// Decoder for interpreter objects in target memory
#[derive(Clone, Copy)]
pub struct ObjectReader<'a> {
    source: &'a dyn MemorySource,
    layout: &'a ObjectLayout,
}

impl<'a> ObjectReader<'a> {
    pub fn new(source: &'a dyn MemorySource, layout: &'a ObjectLayout) -> Self {
        Self { source, layout }
    }

    pub fn source(&self) -> &'a dyn MemorySource {
        self.source
    }

    pub fn layout(&self) -> &'a ObjectLayout {
        self.layout
    }

    fn field(address: Address, offset: u64) -> Option<Address> {
        address.checked_add(offset)
    }

    /// The object's `ob_type` pointer
    pub fn read_type_pointer(&self, address: Address) -> Option<Address> {
        let field = Self::field(address, self.layout.type_pointer_offset)?;
        self.source.read_pointer(field)
    }

    /// Reference count and type pointer. Absent unless both decode.
    pub fn read_header(&self, address: Address) -> Option<ObjectHeader> {
        let refcount = self
            .source
            .read_i64(Self::field(address, self.layout.refcount_offset)?)?;
        let type_pointer = self.read_type_pointer(address)?;
        Some(ObjectHeader {
            refcount,
            type_pointer,
        })
    }

    /// Read ASCII bytes until a zero byte or `max_length` bytes.
    ///
    /// If any byte before the terminator (or before `max_length`) is
    /// unreadable the whole string is absent. Non-ASCII content is a decode
    /// failure.
    pub fn read_string_ascii_null_terminated(
        &self,
        address: Address,
        max_length: usize,
    ) -> Option<String> {
        if max_length == 0 {
            return Some(String::new());
        }

        let bytes = match self.source.read_bytes(address, max_length) {
            Some(bytes) => bytes,
            None => {
                // A short string may sit just before an unmapped page
                let to_page_end = (PAGE_SIZE - address.get() % PAGE_SIZE) as usize;
                if to_page_end >= max_length {
                    return None;
                }
                self.source.read_bytes(address, to_page_end)?
            }
        };

        let text = match memchr::memchr(0, &bytes) {
            Some(end) => &bytes[..end],
            None if bytes.len() >= max_length => &bytes[..max_length],
            None => return None,
        };

        if !text.is_ascii() {
            return None;
        }
        std::str::from_utf8(text).ok().map(str::to_string)
    }

    /// Decode `address` as a type object and read its `tp_name`
    pub fn read_type_name(&self, type_address: Address) -> Option<String> {
        let name_field = Self::field(type_address, self.layout.type_name_offset)?;
        let name_address = self.source.read_pointer(name_field)?;
        self.read_string_ascii_null_terminated(name_address, self.layout.max_string_length)
    }

    pub fn read_type_descriptor(&self, type_address: Address) -> Option<TypeDescriptor> {
        self.read_type_name(type_address).map(|name| TypeDescriptor {
            address: type_address,
            name,
        })
    }

    /// Name of the type of the object at `address`
    pub fn read_object_type_name(&self, address: Address) -> Option<String> {
        self.read_type_name(self.read_type_pointer(address)?)
    }

    /// Character data of a string object
    pub fn read_str(&self, address: Address) -> Option<String> {
        let data = Self::field(address, self.layout.string_data_offset)?;
        self.read_string_ascii_null_terminated(data, self.layout.max_string_length)
    }

    /// Instance dict pointer of an object
    pub fn read_instance_dict(&self, address: Address) -> Option<Address> {
        let field = Self::field(address, self.layout.node_dict_offset)?;
        self.source.read_pointer(field)
    }

    /// Occupied slots of the dict object at `dict_address`.
    ///
    /// Absent when the slot count is implausible or the table cannot be read
    /// in full. Empty and deleted slots are skipped.
    pub fn read_dict_slots(&self, dict_address: Address) -> Option<Vec<DictSlot>> {
        let layout = self.layout;

        let mask = self
            .source
            .read_i64(Self::field(dict_address, layout.dict_mask_offset)?)?;
        let count = u64::try_from(mask).ok()?.checked_add(1)?;
        if count > layout.max_dict_slots || !count.is_power_of_two() {
            return None;
        }

        let table = self
            .source
            .read_pointer(Self::field(dict_address, layout.dict_table_offset)?)?;
        let table_len = usize::try_from(count.checked_mul(layout.dict_slot_stride)?).ok()?;
        let bytes = self.source.read_bytes(table, table_len)?;
        if bytes.len() < table_len {
            return None;
        }

        let stride = layout.dict_slot_stride as usize;
        let key_offset = layout.dict_slot_key_offset as usize;
        let value_offset = layout.dict_slot_value_offset as usize;

        // type pointer -> is the string type, for this dict only
        let mut string_types: HashMap<Address, bool> = HashMap::new();
        let mut slots = Vec::new();

        for entry in bytes.chunks_exact(stride) {
            let key = LE::read_i64(&entry[key_offset..key_offset + FIELD_WIDTH]);
            let value = LE::read_i64(&entry[value_offset..value_offset + FIELD_WIDTH]);

            let (Some(key_address), Some(value)) = (
                Address::from_pointer_field(key),
                Address::from_pointer_field(value),
            ) else {
                continue;
            };

            slots.push(DictSlot {
                key: self.classify_key(key_address, &mut string_types),
                key_address,
                value,
            });
        }

        Some(slots)
    }

    fn classify_key(&self, key: Address, string_types: &mut HashMap<Address, bool>) -> DictKey {
        let Some(type_pointer) = self.read_type_pointer(key) else {
            return DictKey::Unclassified;
        };

        let is_string = *string_types.entry(type_pointer).or_insert_with(|| {
            self.read_type_name(type_pointer).as_deref()
                == Some(self.layout.string_type_name.as_str())
        });

        if !is_string {
            return DictKey::Unclassified;
        }

        match self.read_str(key) {
            Some(text) => DictKey::Str(text),
            None => DictKey::Unclassified,
        }
    }

    /// Value stored under string key `key`, if present
    pub fn lookup_str_key(&self, dict_address: Address, key: &str) -> Option<Address> {
        self.read_dict_slots(dict_address)?
            .into_iter()
            .find(|slot| slot.key_str() == Some(key))
            .map(|slot| slot.value)
    }

    /// Item pointers of a list object. Null items are dropped.
    pub fn read_list_items(&self, list_address: Address) -> Option<Vec<Address>> {
        let layout = self.layout;

        let size = self
            .source
            .read_i64(Self::field(list_address, layout.list_size_offset)?)?;
        let size = u64::try_from(size).ok()?;
        if size == 0 {
            return Some(Vec::new());
        }
        if size > layout.max_list_items {
            return None;
        }

        let items = self
            .source
            .read_pointer(Self::field(list_address, layout.list_items_offset)?)?;
        let len = usize::try_from(size).ok()? * FIELD_WIDTH;
        let bytes = self.source.read_bytes(items, len)?;
        if bytes.len() < len {
            return None;
        }

        Some(
            bytes
                .chunks_exact(FIELD_WIDTH)
                .filter_map(|item| Address::from_pointer_field(LE::read_i64(item)))
                .collect(),
        )
    }
}
