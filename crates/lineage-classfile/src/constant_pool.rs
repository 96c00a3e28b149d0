//! Class-file constant pool

use crate::class::ClassFileError;
use crate::reader::ByteReader;
#[cfg(feature = "writer")]
use crate::writer::ClassBuffer;

/// Constant pool tags (JVMS §4.4)
pub mod tag {
    /// CONSTANT_Utf8
    pub const UTF8: u8 = 1;
    /// CONSTANT_Integer
    pub const INTEGER: u8 = 3;
    /// CONSTANT_Float
    pub const FLOAT: u8 = 4;
    /// CONSTANT_Long
    pub const LONG: u8 = 5;
    /// CONSTANT_Double
    pub const DOUBLE: u8 = 6;
    /// CONSTANT_Class
    pub const CLASS: u8 = 7;
    /// CONSTANT_String
    pub const STRING: u8 = 8;
    /// CONSTANT_Fieldref
    pub const FIELD_REF: u8 = 9;
    /// CONSTANT_Methodref
    pub const METHOD_REF: u8 = 10;
    /// CONSTANT_InterfaceMethodref
    pub const INTERFACE_METHOD_REF: u8 = 11;
    /// CONSTANT_NameAndType
    pub const NAME_AND_TYPE: u8 = 12;
    /// CONSTANT_MethodHandle
    pub const METHOD_HANDLE: u8 = 15;
    /// CONSTANT_MethodType
    pub const METHOD_TYPE: u8 = 16;
    /// CONSTANT_Dynamic
    pub const DYNAMIC: u8 = 17;
    /// CONSTANT_InvokeDynamic
    pub const INVOKE_DYNAMIC: u8 = 18;
    /// CONSTANT_Module
    pub const MODULE: u8 = 19;
    /// CONSTANT_Package
    pub const PACKAGE: u8 = 20;
}

/// A single constant pool entry
///
/// Only the entries the reader actually resolves (`Utf8`, `Class`) keep their
/// payload; everything else is retained as an opaque marker so indices stay
/// aligned.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0, and the second slot of a long/double entry
    Unusable,
    /// Decoded string
    Utf8(String),
    /// 32-bit integer
    Integer(i32),
    /// 64-bit integer (occupies two slots)
    Long(i64),
    /// Reference to a class name (index of a `Utf8` entry)
    Class(u16),
    /// Any other entry, identified by its tag
    Other(u8),
}

/// Constant pool of a class file
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create a new pool holding only the reserved slot 0
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// Number of slots, including the reserved slot 0 (the on-disk `constant_pool_count`)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries besides slot 0
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Get an entry by index
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// Resolve a `Utf8` entry
    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ClassFileError::BadConstantRef {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a `Class` entry to its internal name
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => Err(ClassFileError::BadConstantRef {
                index,
                expected: "Class",
            }),
        }
    }

    #[cfg(feature = "writer")]
    /// Add a `Utf8` entry, reusing an existing identical one
    pub fn add_utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self
            .entries
            .iter()
            .position(|c| matches!(c, Constant::Utf8(s) if s == value))
        {
            return index as u16;
        }
        self.push(Constant::Utf8(value.to_string()))
    }

    #[cfg(feature = "writer")]
    /// Add a `Class` entry for an internal name, reusing an existing one
    pub fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        if let Some(index) = self
            .entries
            .iter()
            .position(|c| *c == Constant::Class(name_index))
        {
            return index as u16;
        }
        self.push(Constant::Class(name_index))
    }

    #[cfg(feature = "writer")]
    /// Add an `Integer` entry
    pub fn add_integer(&mut self, value: i32) -> u16 {
        self.push(Constant::Integer(value))
    }

    #[cfg(feature = "writer")]
    /// Add a `Long` entry (takes two slots)
    pub fn add_long(&mut self, value: i64) -> u16 {
        let index = self.push(Constant::Long(value));
        self.entries.push(Constant::Unusable);
        index
    }

    #[cfg(feature = "writer")]
    fn push(&mut self, constant: Constant) -> u16 {
        let index = self.entries.len();
        self.entries.push(constant);
        index as u16
    }

    #[cfg(feature = "writer")]
    /// Encode the pool, including its leading count
    pub fn encode(&self, buffer: &mut ClassBuffer) {
        buffer.emit_u16(self.entries.len() as u16);
        for constant in &self.entries[1..] {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(s) => {
                    buffer.emit_u8(tag::UTF8);
                    buffer.emit_modified_utf8(s);
                }
                Constant::Integer(v) => {
                    buffer.emit_u8(tag::INTEGER);
                    buffer.emit_u32(*v as u32);
                }
                Constant::Long(v) => {
                    buffer.emit_u8(tag::LONG);
                    buffer.emit_u32((*v >> 32) as u32);
                    buffer.emit_u32(*v as u32);
                }
                Constant::Class(name_index) => {
                    buffer.emit_u8(tag::CLASS);
                    buffer.emit_u16(*name_index);
                }
                // The writer never produces opaque entries
                Constant::Other(_) => {}
            }
        }
    }

    /// Decode the pool, including its leading count
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index: u16 = 1;
        while index < count {
            let tag = reader.read_u8()?;
            let constant = match tag {
                tag::UTF8 => Constant::Utf8(reader.read_modified_utf8()?),
                tag::INTEGER => Constant::Integer(reader.read_u32()? as i32),
                tag::FLOAT => {
                    reader.skip(4)?;
                    Constant::Other(tag)
                }
                tag::LONG => Constant::Long(reader.read_u64()? as i64),
                tag::DOUBLE => {
                    reader.skip(8)?;
                    Constant::Other(tag)
                }
                tag::CLASS => Constant::Class(reader.read_u16()?),
                tag::STRING | tag::METHOD_TYPE | tag::MODULE | tag::PACKAGE => {
                    reader.skip(2)?;
                    Constant::Other(tag)
                }
                tag::FIELD_REF
                | tag::METHOD_REF
                | tag::INTERFACE_METHOD_REF
                | tag::NAME_AND_TYPE
                | tag::DYNAMIC
                | tag::INVOKE_DYNAMIC => {
                    reader.skip(4)?;
                    Constant::Other(tag)
                }
                tag::METHOD_HANDLE => {
                    reader.skip(3)?;
                    Constant::Other(tag)
                }
                _ => return Err(ClassFileError::UnknownConstantTag { tag, index }),
            };

            let wide = matches!(tag, tag::LONG | tag::DOUBLE);
            entries.push(constant);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }
}
