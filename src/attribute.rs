//! Attribute tables of classes, fields and methods.
//!
//! Only `Code` is materialized; every other attribute is recorded by
//! name and raw length and its payload skipped.

use std::collections::HashMap;

use crate::errors::ParseError;
use crate::pool::ConstantPool;
use crate::reader::Reader;

#[derive(Debug, Clone)]
pub enum AttributeInfo {
    Code {
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        attributes: Attributes,
    },
    Other {
        length: u32,
    },
}

/// A parsed attribute table, keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: HashMap<String, AttributeInfo>,
}

impl Attributes {
    pub fn parse(reader: &mut Reader, pool: &ConstantPool) -> Result<Self, ParseError> {
        let count = reader.read_u16_be()?;
        let mut entries = HashMap::new();

        for _ in 0..count {
            let name_index = reader.read_u16_be()?;
            let name = pool.resolve_string(name_index).to_string();
            let length = reader.read_u32_be()?;

            let info = if name == "Code" {
                let max_stack = reader.read_u16_be()?;
                let max_locals = reader.read_u16_be()?;
                let code_length = reader.read_u32_be()?;
                let code = reader.read_bytes(code_length as usize)?;
                // Exception handling is unsupported; drop the table.
                let exception_table_length = reader.read_u16_be()?;
                reader.skip(8 * exception_table_length as usize)?;
                let attributes = Attributes::parse(reader, pool)?;
                AttributeInfo::Code {
                    max_stack,
                    max_locals,
                    code,
                    attributes,
                }
            } else {
                reader.skip(length as usize)?;
                AttributeInfo::Other { length }
            };
            entries.insert(name, info);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&AttributeInfo> {
        self.entries.get(name)
    }

    /// The `Code` attribute, if this table carries one.
    pub fn code(&self) -> Option<(u16, u16, &[u8])> {
        match self.entries.get("Code") {
            Some(AttributeInfo::Code {
                max_stack,
                max_locals,
                code,
                ..
            }) => Some((*max_stack, *max_locals, code.as_slice())),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::CpInfo;

    fn pool() -> ConstantPool {
        ConstantPool::from_entries(vec![
            CpInfo::Utf8("Code".into()),
            CpInfo::Utf8("LineNumberTable".into()),
        ])
    }

    #[test]
    fn parses_code_attribute() {
        // count=1; Code: name_index=1, length, max_stack=2, max_locals=1,
        // code=[0x05, 0xAC], empty exception table, no nested attributes.
        let bytes = vec![
            0, 1, // attributes_count
            0, 1, // name_index -> "Code"
            0, 0, 0, 14, // attribute_length
            0, 2, // max_stack
            0, 1, // max_locals
            0, 0, 0, 2, // code_length
            0x05, 0xAC, // iconst_2, ireturn
            0, 0, // exception_table_length
            0, 0, // nested attributes_count
        ];
        let mut reader = Reader::new(&bytes);
        let attrs = Attributes::parse(&mut reader, &pool()).unwrap();
        let (max_stack, max_locals, code) = attrs.code().unwrap();
        assert_eq!(max_stack, 2);
        assert_eq!(max_locals, 1);
        assert_eq!(code, &[0x05, 0xAC]);
    }

    #[test]
    fn skips_unknown_attributes_by_length() {
        let bytes = vec![
            0, 2, // attributes_count
            0, 2, // name_index -> "LineNumberTable"
            0, 0, 0, 3, // attribute_length
            9, 9, 9, // opaque payload
            0, 1, // name_index -> "Code"
            0, 0, 0, 12, // attribute_length
            0, 1, 0, 0, 0, 0, 0, 0, // empty code
            0, 0, 0, 0,
        ];
        let mut reader = Reader::new(&bytes);
        let attrs = Attributes::parse(&mut reader, &pool()).unwrap();
        assert_eq!(attrs.len(), 2);
        assert!(matches!(
            attrs.get("LineNumberTable"),
            Some(AttributeInfo::Other { length: 3 })
        ));
        assert!(attrs.code().is_some());
    }

    #[test]
    fn exception_table_is_skipped() {
        let bytes = vec![
            0, 1, //
            0, 1, // "Code"
            0, 0, 0, 21, //
            0, 1, // max_stack
            0, 0, // max_locals
            0, 0, 0, 1, // code_length
            0xB1, // return
            0, 1, // exception_table_length = 1
            0, 0, 0, 0, 0, 0, 0, 0, // one skipped entry
            0, 0, // nested attributes_count
        ];
        let mut reader = Reader::new(&bytes);
        let attrs = Attributes::parse(&mut reader, &pool()).unwrap();
        assert_eq!(attrs.code().unwrap().2, &[0xB1]);
    }
}
