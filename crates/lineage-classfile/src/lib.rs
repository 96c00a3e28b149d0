//! Structural reader for JVM class files
//!
//! Only the parts of the format needed to walk a class hierarchy are
//! decoded: names, the superclass link, interfaces, method signatures and
//! class annotations. Everything else is skipped by length.
//!
//! With the default `writer` feature, [`ClassWriter`] produces minimal class
//! files for building test corpora. Consumers that only read class files
//! depend on the crate with `default-features = false`.

#![warn(missing_docs)]

pub mod annotation;
pub mod class;
pub mod constant_pool;
pub mod reader;
#[cfg(feature = "writer")]
pub mod writer;

#[cfg(feature = "writer")]
pub use annotation::{Annotation, ElementValue};
pub use class::{
    access, class_name_from_path, normalize_class_name, ClassFileError, ClassHeader, ClassInfo,
    ClassVersion, MethodInfo, MAGIC, MARKER_ANNOTATION, OBJECT_CLASS,
};
pub use constant_pool::{Constant, ConstantPool};
pub use reader::{ByteReader, DecodeError};
#[cfg(feature = "writer")]
pub use writer::{ClassBuffer, ClassWriter};
