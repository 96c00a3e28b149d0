//! Class-file structure
//!
//! Two parse depths are offered. [`ClassHeader::read`] stops after the
//! interface table and is enough to answer "who is my superclass?".
//! [`ClassInfo::read`] continues through fields, methods and class attributes.

use thiserror::Error;

use crate::annotation::{read_annotations, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS};
use crate::constant_pool::ConstantPool;
use crate::reader::{ByteReader, DecodeError};

/// Class-file magic number
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Descriptor of the mixin marker annotation
pub const MARKER_ANNOTATION: &str = "Lorg/spongepowered/asm/mixin/Mixin;";

/// Internal name of the universal root class
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Access flags (JVMS §4.1, §4.6)
pub mod access {
    /// ACC_PUBLIC
    pub const PUBLIC: u16 = 0x0001;
    /// ACC_PRIVATE
    pub const PRIVATE: u16 = 0x0002;
    /// ACC_PROTECTED
    pub const PROTECTED: u16 = 0x0004;
    /// ACC_STATIC
    pub const STATIC: u16 = 0x0008;
    /// ACC_FINAL
    pub const FINAL: u16 = 0x0010;
    /// ACC_SUPER (classes) / ACC_SYNCHRONIZED (methods)
    pub const SUPER: u16 = 0x0020;
    /// ACC_BRIDGE
    pub const BRIDGE: u16 = 0x0040;
    /// ACC_NATIVE
    pub const NATIVE: u16 = 0x0100;
    /// ACC_INTERFACE
    pub const INTERFACE: u16 = 0x0200;
    /// ACC_ABSTRACT
    pub const ABSTRACT: u16 = 0x0400;
    /// ACC_SYNTHETIC
    pub const SYNTHETIC: u16 = 0x1000;
    /// ACC_ANNOTATION
    pub const ANNOTATION: u16 = 0x2000;
    /// ACC_ENUM
    pub const ENUM: u16 = 0x4000;
}

/// Errors produced while reading a class file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    /// Low-level decode failure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The blob does not start with `CAFEBABE`
    #[error("Invalid magic number: expected 0xCAFEBABE, got {0:#010X}")]
    InvalidMagic(u32),

    /// Constant pool contains an unassigned tag
    #[error("Unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag {
        /// Tag byte
        tag: u8,
        /// Pool index of the entry
        index: u16,
    },

    /// A pool reference points at a missing or wrong-kind entry
    #[error("Constant pool index {index} is not a {expected} entry")]
    BadConstantRef {
        /// Referenced index
        index: u16,
        /// Entry kind the reference requires
        expected: &'static str,
    },

    /// Annotation nesting exceeds the reader's limit
    #[error("Annotation nesting too deep at offset {0}")]
    AnnotationTooDeep(usize),

    /// Unknown element-value tag in an annotation
    #[error("Invalid annotation element tag {tag:#04x} at offset {offset}")]
    BadElementTag {
        /// Tag byte
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },
}

/// Class-file version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassVersion {
    /// Major version (52 = Java 8)
    pub major: u16,
    /// Minor version
    pub minor: u16,
}

impl ClassVersion {
    /// Java 8
    pub const JAVA_8: ClassVersion = ClassVersion { major: 52, minor: 0 };
    /// Java 17
    pub const JAVA_17: ClassVersion = ClassVersion { major: 61, minor: 0 };
}

/// Everything up to and including the interface table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    /// Class-file version
    pub version: ClassVersion,
    /// Class access flags
    pub access_flags: u16,
    /// Internal name of this class
    pub name: String,
    /// Internal name of the superclass; `None` only for `java/lang/Object`
    pub super_name: Option<String>,
    /// Internal names of directly implemented interfaces
    pub interfaces: Vec<String>,
}

impl ClassHeader {
    /// Parse just the header of a class file
    pub fn read(blob: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ByteReader::new(blob);
        let (header, _) = Self::read_from(&mut reader)?;
        Ok(header)
    }

    fn read_from(reader: &mut ByteReader<'_>) -> Result<(Self, ConstantPool), ClassFileError> {
        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic(magic));
        }
        let minor = reader.read_u16()?;
        let major = reader.read_u16()?;

        let pool = ConstantPool::decode(reader)?;

        let access_flags = reader.read_u16()?;
        let name = pool.class_name(reader.read_u16()?)?.to_string();
        let super_name = match reader.read_u16()? {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };

        let interface_count = reader.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(reader.read_u16()?)?.to_string());
        }

        let header = Self {
            version: ClassVersion { major, minor },
            access_flags,
            name,
            super_name,
            interfaces,
        };
        Ok((header, pool))
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        self.access_flags & access::INTERFACE != 0
    }
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method access flags
    pub access_flags: u16,
    /// Method name
    pub name: String,
    /// Method descriptor, e.g. `(F)Z`
    pub descriptor: String,
}

impl MethodInfo {
    /// Whether the method is public
    pub fn is_public(&self) -> bool {
        self.access_flags & access::PUBLIC != 0
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.access_flags & access::STATIC != 0
    }

    /// Whether name and descriptor both match
    pub fn matches(&self, name: &str, descriptor: &str) -> bool {
        self.name == name && self.descriptor == descriptor
    }
}

/// Fully parsed class: header, methods and class annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Header fields
    pub header: ClassHeader,
    /// Declared methods in file order
    pub methods: Vec<MethodInfo>,
    /// Descriptors of class annotations (visible and invisible)
    pub annotations: Vec<String>,
}

impl ClassInfo {
    /// Parse a complete class file
    pub fn read(blob: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ByteReader::new(blob);
        let (header, pool) = ClassHeader::read_from(&mut reader)?;

        // Fields carry nothing of interest
        let field_count = reader.read_u16()?;
        for _ in 0..field_count {
            reader.skip(6)?;
            skip_attributes(&mut reader)?;
        }

        let method_count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access_flags = reader.read_u16()?;
            let name = pool.utf8(reader.read_u16()?)?.to_string();
            let descriptor = pool.utf8(reader.read_u16()?)?.to_string();
            skip_attributes(&mut reader)?;
            methods.push(MethodInfo {
                access_flags,
                name,
                descriptor,
            });
        }

        let mut annotations = Vec::new();
        let attribute_count = reader.read_u16()?;
        for _ in 0..attribute_count {
            let name = pool.utf8(reader.read_u16()?)?;
            let len = reader.read_u32()? as usize;
            let body = reader.read_bytes(len)?;
            if name == RUNTIME_VISIBLE_ANNOTATIONS || name == RUNTIME_INVISIBLE_ANNOTATIONS {
                read_annotations(body, &pool, &mut annotations)?;
            }
        }

        Ok(Self {
            header,
            methods,
            annotations,
        })
    }

    /// Internal name of this class
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Internal name of the superclass
    pub fn super_name(&self) -> Option<&str> {
        self.header.super_name.as_deref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[String] {
        &self.header.interfaces
    }

    /// Whether a class annotation with `descriptor` is present
    pub fn has_annotation(&self, descriptor: &str) -> bool {
        self.annotations.iter().any(|a| a == descriptor)
    }

    /// Whether the class carries the mixin marker
    pub fn has_marker_annotation(&self) -> bool {
        self.has_annotation(MARKER_ANNOTATION)
    }

    /// Find a method by name and descriptor
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.matches(name, descriptor))
    }
}

fn skip_attributes(reader: &mut ByteReader<'_>) -> Result<(), ClassFileError> {
    let count = reader.read_u16()?;
    for _ in 0..count {
        reader.skip(2)?;
        let len = reader.read_u32()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

/// Convert a dotted or internal class name to internal form
///
/// `com.example.Zombie` becomes `com/example/Zombie`; names already in
/// internal form are returned unchanged.
pub fn normalize_class_name(name: &str) -> String {
    name.replace('.', "/")
}

/// Convert an archive entry path to a class name, if it names a class file
///
/// `com/example/Zombie.class` becomes `com/example/Zombie`. Module and package
/// descriptors are ignored.
pub fn class_name_from_path(path: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    let stem = path.strip_suffix(".class")?;
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(stem.trim_start_matches('/').to_string())
}
