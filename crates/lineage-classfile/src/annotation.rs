//! Class-level annotation attributes
//!
//! Only annotation *types* are surfaced. Element values are walked so the
//! reader stays aligned, then discarded.

use crate::class::ClassFileError;
use crate::constant_pool::ConstantPool;
use crate::reader::ByteReader;
#[cfg(feature = "writer")]
use crate::writer::ClassBuffer;

/// Attribute carrying annotations retained at runtime
pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";

/// Attribute carrying class-retention annotations (e.g. mixin markers)
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// Nested annotations deeper than this are rejected as malformed
const MAX_NESTING: usize = 64;

/// An annotation to emit with [`crate::ClassWriter`]
#[cfg(feature = "writer")]
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Type descriptor, e.g. `Lorg/spongepowered/asm/mixin/Mixin;`
    pub descriptor: String,
    /// Element name/value pairs
    pub elements: Vec<(String, ElementValue)>,
}

#[cfg(feature = "writer")]
impl Annotation {
    /// Annotation without elements
    pub fn marker(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            elements: Vec::new(),
        }
    }

    /// Add an element
    pub fn with(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.elements.push((name.into(), value));
        self
    }

    pub(crate) fn encode(&self, pool: &mut ConstantPool, buffer: &mut ClassBuffer) {
        buffer.emit_u16(pool.add_utf8(&self.descriptor));
        buffer.emit_u16(self.elements.len() as u16);
        for (name, value) in &self.elements {
            buffer.emit_u16(pool.add_utf8(name));
            value.encode(pool, buffer);
        }
    }
}

/// Annotation element value
#[cfg(feature = "writer")]
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// `s`: string constant
    String(String),
    /// `I`: int constant
    Int(i32),
    /// `e`: enum constant
    Enum {
        /// Enum type descriptor
        type_descriptor: String,
        /// Constant name
        name: String,
    },
    /// `c`: class literal (return descriptor)
    Class(String),
    /// `@`: nested annotation
    Annotation(Annotation),
    /// `[`: array of values
    Array(Vec<ElementValue>),
}

#[cfg(feature = "writer")]
impl ElementValue {
    fn encode(&self, pool: &mut ConstantPool, buffer: &mut ClassBuffer) {
        match self {
            ElementValue::String(s) => {
                buffer.emit_u8(b's');
                buffer.emit_u16(pool.add_utf8(s));
            }
            ElementValue::Int(v) => {
                buffer.emit_u8(b'I');
                buffer.emit_u16(pool.add_integer(*v));
            }
            ElementValue::Enum {
                type_descriptor,
                name,
            } => {
                buffer.emit_u8(b'e');
                buffer.emit_u16(pool.add_utf8(type_descriptor));
                buffer.emit_u16(pool.add_utf8(name));
            }
            ElementValue::Class(descriptor) => {
                buffer.emit_u8(b'c');
                buffer.emit_u16(pool.add_utf8(descriptor));
            }
            ElementValue::Annotation(annotation) => {
                buffer.emit_u8(b'@');
                annotation.encode(pool, buffer);
            }
            ElementValue::Array(values) => {
                buffer.emit_u8(b'[');
                buffer.emit_u16(values.len() as u16);
                for value in values {
                    value.encode(pool, buffer);
                }
            }
        }
    }
}

/// Read a `Runtime(In)VisibleAnnotations` attribute body, appending the
/// descriptor of every top-level annotation to `out`.
pub(crate) fn read_annotations(
    data: &[u8],
    pool: &ConstantPool,
    out: &mut Vec<String>,
) -> Result<(), ClassFileError> {
    let mut reader = ByteReader::new(data);
    let count = reader.read_u16()?;
    for _ in 0..count {
        let type_index = skip_annotation(&mut reader, 0)?;
        out.push(pool.utf8(type_index)?.to_string());
    }
    Ok(())
}

/// Walk one annotation structure, returning its type index
fn skip_annotation(reader: &mut ByteReader<'_>, depth: usize) -> Result<u16, ClassFileError> {
    if depth > MAX_NESTING {
        return Err(ClassFileError::AnnotationTooDeep(reader.position()));
    }
    let type_index = reader.read_u16()?;
    let pairs = reader.read_u16()?;
    for _ in 0..pairs {
        reader.skip(2)?; // element_name_index
        skip_element_value(reader, depth + 1)?;
    }
    Ok(type_index)
}

fn skip_element_value(reader: &mut ByteReader<'_>, depth: usize) -> Result<(), ClassFileError> {
    if depth > MAX_NESTING {
        return Err(ClassFileError::AnnotationTooDeep(reader.position()));
    }
    let offset = reader.position();
    match reader.read_u8()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2)?,
        b'e' => reader.skip(4)?,
        b'@' => {
            skip_annotation(reader, depth + 1)?;
        }
        b'[' => {
            let count = reader.read_u16()?;
            for _ in 0..count {
                skip_element_value(reader, depth + 1)?;
            }
        }
        tag => return Err(ClassFileError::BadElementTag { tag, offset }),
    }
    Ok(())
}
