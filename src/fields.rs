//! Field and method table entries, and live field slots.
//!
//! The same wire layout backs both the fields table and the methods
//! table, so the loader parses both through [`Fields`].

use crate::attribute::Attributes;
use crate::errors::ParseError;
use crate::pool::ConstantPool;
use crate::reader::Reader;
use crate::variant::Variant;

pub const ACC_STATIC: u16 = 0x0008;

/// One entry of a fields or methods table, with names resolved
/// eagerly through the constant pool.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Attributes,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fields {
    pub entries: Vec<FieldInfo>,
}

impl Fields {
    pub fn parse(reader: &mut Reader, pool: &ConstantPool) -> Result<Self, ParseError> {
        let count = reader.read_u16_be()?;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let access_flags = reader.read_u16_be()?;
            let name_index = reader.read_u16_be()?;
            let descriptor_index = reader.read_u16_be()?;
            entries.push(FieldInfo {
                access_flags,
                name: pool.resolve_string(name_index).to_string(),
                descriptor: pool.resolve_string(descriptor_index).to_string(),
                attributes: Attributes::parse(reader, pool)?,
            });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.entries.iter().find(|info| info.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.entries.iter()
    }
}

/// A live slot: one named [`Variant`] owned by a class (static field)
/// or an object (instance field).
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub value: Variant,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Variant::None,
        }
    }
}
