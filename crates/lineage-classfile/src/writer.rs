//! Class-file encoding
//!
//! [`ClassWriter`] produces small but well-formed class files. It exists for
//! building fixtures and synthetic corpora; method bodies are never emitted.

use crate::annotation::{Annotation, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS};
use crate::class::{access, ClassVersion, MAGIC};
use crate::constant_pool::ConstantPool;
use crate::reader::encode_modified_utf8;

/// Growable big-endian output buffer
#[derive(Debug, Default)]
pub struct ClassBuffer {
    buffer: Vec<u8>,
}

impl ClassBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Current length
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the buffer and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer (big-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 32-bit unsigned integer (big-endian)
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a u16-length-prefixed modified UTF-8 string
    pub fn emit_modified_utf8(&mut self, s: &str) {
        let bytes = encode_modified_utf8(s);
        self.emit_u16(bytes.len() as u16);
        self.buffer.extend_from_slice(&bytes);
    }
}

#[derive(Debug, Clone)]
struct MemberSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
}

/// Builder for a class file
///
/// ```ignore
/// let bytes = ClassWriter::new("com/example/Zombie")
///     .extends("com/example/Monster")
///     .method(access::PUBLIC, "damage", "(Lcom/example/DamageSource;F)Z")
///     .to_bytes();
/// ```
#[derive(Debug, Clone)]
pub struct ClassWriter {
    version: ClassVersion,
    access_flags: u16,
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
    visible: Vec<Annotation>,
    invisible: Vec<Annotation>,
    extra_attributes: Vec<(String, Vec<u8>)>,
    extra_constants: Vec<i64>,
}

impl ClassWriter {
    /// Start a public class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: ClassVersion::JAVA_8,
            access_flags: access::PUBLIC | access::SUPER,
            name: name.into(),
            super_name: Some(crate::OBJECT_CLASS.to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            visible: Vec::new(),
            invisible: Vec::new(),
            extra_attributes: Vec::new(),
            extra_constants: Vec::new(),
        }
    }

    /// Set the superclass
    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// Remove the superclass (only valid for `java/lang/Object` itself)
    pub fn without_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    /// Override the class access flags
    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    /// Override the class-file version
    pub fn version(mut self, version: ClassVersion) -> Self {
        self.version = version;
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declare a field
    pub fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push(MemberSpec {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Declare a method (no body)
    pub fn method(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.methods.push(MemberSpec {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Attach a class annotation
    ///
    /// `visible` selects between the runtime-visible and runtime-invisible
    /// attribute.
    pub fn annotation(mut self, annotation: Annotation, visible: bool) -> Self {
        if visible {
            self.visible.push(annotation);
        } else {
            self.invisible.push(annotation);
        }
        self
    }

    /// Attach an arbitrary class attribute
    pub fn attribute(mut self, name: &str, body: Vec<u8>) -> Self {
        self.extra_attributes.push((name.to_string(), body));
        self
    }

    /// Add a `Long` constant to the pool (exercises two-slot entries)
    pub fn long_constant(mut self, value: i64) -> Self {
        self.extra_constants.push(value);
        self
    }

    /// Encode the class file
    pub fn to_bytes(&self) -> Vec<u8> {
        // The pool must be complete before it is written, so the body is
        // encoded first into its own buffer.
        let mut pool = ConstantPool::new();
        for value in &self.extra_constants {
            pool.add_long(*value);
        }
        let mut body = ClassBuffer::new();

        body.emit_u16(self.access_flags);
        body.emit_u16(pool.add_class(&self.name));
        body.emit_u16(
            self.super_name
                .as_deref()
                .map(|s| pool.add_class(s))
                .unwrap_or(0),
        );

        body.emit_u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            body.emit_u16(pool.add_class(interface));
        }

        for members in [&self.fields, &self.methods] {
            body.emit_u16(members.len() as u16);
            for member in members {
                body.emit_u16(member.access_flags);
                body.emit_u16(pool.add_utf8(&member.name));
                body.emit_u16(pool.add_utf8(&member.descriptor));
                body.emit_u16(0); // attributes_count
            }
        }

        let mut attributes: Vec<(u16, Vec<u8>)> = Vec::new();
        for (name, annotations) in [
            (RUNTIME_VISIBLE_ANNOTATIONS, &self.visible),
            (RUNTIME_INVISIBLE_ANNOTATIONS, &self.invisible),
        ] {
            if annotations.is_empty() {
                continue;
            }
            let mut attr = ClassBuffer::new();
            attr.emit_u16(annotations.len() as u16);
            for annotation in annotations {
                annotation.encode(&mut pool, &mut attr);
            }
            attributes.push((pool.add_utf8(name), attr.into_bytes()));
        }
        for (name, bytes) in &self.extra_attributes {
            attributes.push((pool.add_utf8(name), bytes.clone()));
        }

        body.emit_u16(attributes.len() as u16);
        for (name_index, bytes) in &attributes {
            body.emit_u16(*name_index);
            body.emit_u32(bytes.len() as u32);
            body.emit_bytes(bytes);
        }

        let mut out = ClassBuffer::new();
        out.emit_u32(MAGIC);
        out.emit_u16(self.version.minor);
        out.emit_u16(self.version.major);
        pool.encode(&mut out);
        out.emit_bytes(&body.into_bytes());
        out.into_bytes()
    }
}
