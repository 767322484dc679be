//! Class-file constant pool: parsing and reference resolution.

use log::{debug, warn};

use crate::errors::ParseError;
use crate::reader::Reader;

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_INT: u8 = 3;
pub const CONSTANT_FLOAT: u8 = 4;
pub const CONSTANT_LONG: u8 = 5;
pub const CONSTANT_DOUBLE: u8 = 6;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELD_REF: u8 = 9;
pub const CONSTANT_METHOD_REF: u8 = 10;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub const CONSTANT_METHOD_HANDLE: u8 = 15;
pub const CONSTANT_METHOD_TYPE: u8 = 16;
pub const CONSTANT_DYNAMIC: u8 = 17;
pub const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub const CONSTANT_MODULE: u8 = 19;
pub const CONSTANT_PACKAGE: u8 = 20;

/// One constant pool entry. Entries the interpreter never consumes
/// (and the reserved slot 0) are held as `Unused`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpInfo {
    Utf8(String),
    Int(u32),
    Class {
        name_index: u16,
    },
    String {
        utf8_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    Unused,
}

/// The pool as parsed from the wire: 1-based, slot 0 reserved. Wide
/// entries (Long/Double) burn a second slot even though this
/// interpreter ignores their payload.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    /// Parses `count - 1` entries; `count` is one past the last valid
    /// index, exactly as it appears on the wire.
    pub fn parse(reader: &mut Reader) -> Result<Self, ParseError> {
        let count = reader.read_u16_be()?;
        let mut entries = vec![CpInfo::Unused; count.max(1) as usize];

        let mut index = 1u16;
        while index < count {
            let tag = reader.read_u8()?;
            match tag {
                CONSTANT_UTF8 => {
                    let length = reader.read_u16_be()?;
                    let bytes = reader.read_bytes(length as usize)?;
                    let text = String::from_utf8(bytes)
                        .map_err(|_| ParseError::InvalidUtf8 { index })?;
                    entries[index as usize] = CpInfo::Utf8(text);
                }
                CONSTANT_INT => {
                    entries[index as usize] = CpInfo::Int(reader.read_u32_be()?);
                }
                CONSTANT_CLASS => {
                    entries[index as usize] = CpInfo::Class {
                        name_index: reader.read_u16_be()?,
                    };
                }
                CONSTANT_STRING => {
                    entries[index as usize] = CpInfo::String {
                        utf8_index: reader.read_u16_be()?,
                    };
                }
                CONSTANT_FIELD_REF => {
                    entries[index as usize] = CpInfo::FieldRef {
                        class_index: reader.read_u16_be()?,
                        name_and_type_index: reader.read_u16_be()?,
                    };
                }
                CONSTANT_METHOD_REF => {
                    entries[index as usize] = CpInfo::MethodRef {
                        class_index: reader.read_u16_be()?,
                        name_and_type_index: reader.read_u16_be()?,
                    };
                }
                CONSTANT_NAME_AND_TYPE => {
                    entries[index as usize] = CpInfo::NameAndType {
                        name_index: reader.read_u16_be()?,
                        descriptor_index: reader.read_u16_be()?,
                    };
                }
                CONSTANT_METHOD_HANDLE => {
                    let ref_kind = reader.read_u8()?;
                    let ref_index = reader.read_u16_be()?;
                    debug!("ignoring MethodHandle entry {index} (kind {ref_kind}, ref {ref_index})");
                }
                CONSTANT_DYNAMIC | CONSTANT_INVOKE_DYNAMIC => {
                    let bootstrap_index = reader.read_u16_be()?;
                    let name_and_type = reader.read_u16_be()?;
                    debug!(
                        "ignoring dynamic entry {index} (bootstrap {bootstrap_index}, name-and-type {name_and_type})"
                    );
                }
                CONSTANT_FLOAT => {
                    warn!("skipping unsupported Float constant at index {index}");
                    reader.skip(4)?;
                }
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    warn!("skipping unsupported wide constant at index {index}");
                    reader.skip(8)?;
                    // Wide entries occupy two pool slots.
                    index += 1;
                }
                CONSTANT_METHOD_TYPE | CONSTANT_MODULE | CONSTANT_PACKAGE => {
                    warn!("skipping unsupported constant tag {tag} at index {index}");
                    reader.skip(2)?;
                }
                _ => return Err(ParseError::UnknownConstantTag { tag, index }),
            }
            index += 1;
        }

        Ok(Self { entries })
    }

    /// Builds a pool directly from entries; slot 0 is prepended.
    pub fn from_entries(entries: Vec<CpInfo>) -> Self {
        let mut all = Vec::with_capacity(entries.len() + 1);
        all.push(CpInfo::Unused);
        all.extend(entries);
        Self { entries: all }
    }

    /// One past the last valid index.
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn get(&self, index: u16) -> &CpInfo {
        self.entries.get(index as usize).unwrap_or(&CpInfo::Unused)
    }

    /// Collapses `Class -> Utf8` or `String -> Utf8` by one level of
    /// indirection; empty string if the chain does not end in a Utf8.
    pub fn resolve_string(&self, index: u16) -> &str {
        let mut info = self.get(index);
        if let CpInfo::Class { name_index } = info {
            info = self.get(*name_index);
        }
        if let CpInfo::String { utf8_index } = info {
            info = self.get(*utf8_index);
        }
        match info {
            CpInfo::Utf8(text) => text,
            _ => "",
        }
    }

    /// For a FieldRef/MethodRef (or a bare Class entry), the name of
    /// the class it refers to.
    pub fn resolve_class_name(&self, index: u16) -> &str {
        let mut info = self.get(index);
        match info {
            CpInfo::MethodRef { class_index, .. } | CpInfo::FieldRef { class_index, .. } => {
                info = self.get(*class_index);
            }
            _ => {}
        }
        match info {
            CpInfo::Class { name_index } => self.resolve_string(*name_index),
            _ => "",
        }
    }

    /// For a FieldRef/MethodRef, the member name from its NameAndType.
    pub fn resolve_field_name(&self, index: u16) -> &str {
        self.name_and_type(index)
            .map(|(name_index, _)| self.resolve_string(name_index))
            .unwrap_or("")
    }

    /// For a FieldRef/MethodRef, the descriptor string from its
    /// NameAndType. Method lookup matches on `(name, descriptor)`.
    pub fn resolve_descriptor(&self, index: u16) -> &str {
        self.name_and_type(index)
            .map(|(_, descriptor_index)| self.resolve_string(descriptor_index))
            .unwrap_or("")
    }

    /// The integer payload at `index`, or -1 if the entry is not Int.
    pub fn resolve_int(&self, index: u16) -> i32 {
        match self.get(index) {
            CpInfo::Int(value) => *value as i32,
            _ => -1,
        }
    }

    /// Names referenced by every Class entry in the pool, in order.
    pub fn class_references(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|info| match info {
            CpInfo::Class { name_index } => Some(self.resolve_string(*name_index)),
            _ => None,
        })
    }

    fn name_and_type(&self, index: u16) -> Option<(u16, u16)> {
        let mut info = self.get(index);
        match info {
            CpInfo::MethodRef {
                name_and_type_index,
                ..
            }
            | CpInfo::FieldRef {
                name_and_type_index,
                ..
            } => {
                info = self.get(*name_and_type_index);
            }
            _ => {}
        }
        match info {
            CpInfo::NameAndType {
                name_index,
                descriptor_index,
            } => Some((*name_index, *descriptor_index)),
            _ => None,
        }
    }
}
