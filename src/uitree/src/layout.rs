//! Object Layout Configuration
//!
//! Field offsets of the target interpreter's objects. The defaults describe
//! CPython 2.7 built for 64-bit Windows:
//!
//! ```text
//! PyObject         { ob_refcnt @0x00, ob_type @0x08 }
//! PyTypeObject     { ..., ob_size @0x10, tp_name @0x18 }
//! PyStringObject   { ..., ob_size @0x10, ob_shash @0x18 (long, 4 bytes),
//!                    ob_sstate @0x1C, ob_sval @0x20 }
//! PyDictObject     { ..., ma_fill @0x10, ma_used @0x18, ma_mask @0x20, ma_table @0x28 }
//! PyDictEntry      { me_hash @0x00, me_key @0x08, me_value @0x10 }   // 0x18 bytes
//! PyListObject     { ..., ob_size @0x10, ob_item @0x18 }
//! ```
//!
//! Other builds are supported by loading a different table, never by code change.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a UI node's child list is found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChildrenLocator {
    /// A pointer field at a fixed offset in the node, pointing to a list object
    Field { offset: u64 },
    /// Follow string keys through successive instance dicts; the last value is the list
    DictPath { keys: Vec<String> },
}

impl Default for ChildrenLocator {
    fn default() -> Self {
        ChildrenLocator::Field { offset: 0x18 }
    }
}

/// Offsets and bounds for decoding target objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectLayout {
    pub refcount_offset: u64,
    pub type_pointer_offset: u64,

    /// `tp_name` pointer inside a type object
    pub type_name_offset: u64,

    /// First character of a string object's data
    pub string_data_offset: u64,

    pub dict_mask_offset: u64,
    pub dict_table_offset: u64,
    pub dict_slot_stride: u64,
    pub dict_slot_key_offset: u64,
    pub dict_slot_value_offset: u64,

    /// Instance `__dict__` pointer of a UI node
    pub node_dict_offset: u64,

    pub list_size_offset: u64,
    pub list_items_offset: u64,

    /// Type name that classifies a dict key as a string
    pub string_type_name: String,

    pub max_string_length: usize,
    pub max_dict_slots: u64,
    pub max_list_items: u64,

    // Kept last: it serializes as a TOML table.
    pub children: ChildrenLocator,
}

impl Default for ObjectLayout {
    fn default() -> Self {
        ObjectLayout {
            refcount_offset: 0x00,
            type_pointer_offset: 0x08,
            type_name_offset: 0x18,
            string_data_offset: 0x20,
            dict_mask_offset: 0x20,
            dict_table_offset: 0x28,
            dict_slot_stride: 0x18,
            dict_slot_key_offset: 0x08,
            dict_slot_value_offset: 0x10,
            node_dict_offset: 0x10,
            list_size_offset: 0x10,
            list_items_offset: 0x18,
            string_type_name: "str".to_string(),
            max_string_length: 0x100,
            max_dict_slots: 0x10000,
            max_list_items: 0x10000,
            children: ChildrenLocator::default(),
        }
    }
}

impl ObjectLayout {
    /// Parse a layout from TOML. Missing fields keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let layout: ObjectLayout =
            toml::from_str(text).map_err(|e| Error::Layout(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Layout(e.to_string()))
    }

    /// Reject tables that cannot describe any object layout
    pub fn validate(&self) -> Result<()> {
        if self.dict_slot_stride == 0 {
            return Err(Error::Layout("dict_slot_stride must be non-zero".into()));
        }
        if self.dict_slot_key_offset + 8 > self.dict_slot_stride
            || self.dict_slot_value_offset + 8 > self.dict_slot_stride
        {
            return Err(Error::Layout(
                "dict slot key/value fields must lie inside dict_slot_stride".into(),
            ));
        }
        if self.max_string_length == 0 {
            return Err(Error::Layout("max_string_length must be non-zero".into()));
        }
        if let ChildrenLocator::DictPath { keys } = &self.children {
            if keys.is_empty() {
                return Err(Error::Layout("children dict_path needs at least one key".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = ObjectLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.type_pointer_offset, 8);
        assert_eq!(layout.children, ChildrenLocator::Field { offset: 0x18 });
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let layout = ObjectLayout::from_toml_str(
            r#"
            string_data_offset = 20
            string_type_name = "unicode"
            "#,
        )
        .unwrap();
        assert_eq!(layout.string_data_offset, 20);
        assert_eq!(layout.string_type_name, "unicode");
        assert_eq!(layout.dict_slot_stride, 0x18);
    }

    #[test]
    fn test_dict_path_children_from_toml() {
        let layout = ObjectLayout::from_toml_str(
            r#"
            [children]
            kind = "dict_path"
            keys = ["children", "_childrenObjects"]
            "#,
        )
        .unwrap();
        assert_eq!(
            layout.children,
            ChildrenLocator::DictPath {
                keys: vec!["children".into(), "_childrenObjects".into()]
            }
        );
    }

    #[test]
    fn test_toml_round_trip_of_default() {
        let layout = ObjectLayout::default();
        let text = layout.to_toml_string().unwrap();
        assert_eq!(ObjectLayout::from_toml_str(&text).unwrap(), layout);
    }

    #[test]
    fn test_invalid_layouts_rejected() {
        assert!(matches!(
            ObjectLayout::from_toml_str("dict_slot_stride = 0"),
            Err(Error::Layout(_))
        ));
        assert!(matches!(
            ObjectLayout::from_toml_str("dict_slot_value_offset = 0x20"),
            Err(Error::Layout(_))
        ));
        assert!(matches!(
            ObjectLayout::from_toml_str("[children]\nkind = \"dict_path\"\nkeys = []"),
            Err(Error::Layout(_))
        ));
        assert!(ObjectLayout::from_toml_str("this is = = not toml").is_err());
    }
}
