//! Corpus units
//!
//! A unit is one independently checksummed source of class files: a jar/zip
//! archive, a live directory tree, or an in-memory list of blobs.

use lineage_classfile::class_name_from_path;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Class files larger than this are skipped rather than read
pub const MAX_CLASS_BYTES: u64 = 64 * 1024 * 1024;

/// Errors raised while reading a unit
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// Archive could not be opened or listed
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),
}

/// Where a unit's class files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitSource {
    /// A jar or zip file
    Archive(PathBuf),
    /// A directory tree; never checksummed
    Directory(PathBuf),
    /// In-memory (entry path, blob) pairs
    Memory(Vec<(String, Vec<u8>)>),
}

/// One scannable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusUnit {
    /// Stable identifier, used as the cache key
    pub id: String,
    /// Content location
    pub source: UnitSource,
}

impl CorpusUnit {
    /// Archive unit
    pub fn archive(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source: UnitSource::Archive(path.into()),
        }
    }

    /// Live directory unit
    pub fn directory(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source: UnitSource::Directory(path.into()),
        }
    }

    /// In-memory unit
    pub fn memory(id: impl Into<String>, entries: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            id: id.into(),
            source: UnitSource::Memory(entries),
        }
    }

    /// Short name of the unit kind
    pub fn kind(&self) -> &'static str {
        match self.source {
            UnitSource::Archive(_) => "archive",
            UnitSource::Directory(_) => "directory",
            UnitSource::Memory(_) => "memory",
        }
    }

    /// Whether the unit is a live directory (always rescanned)
    pub fn is_live(&self) -> bool {
        matches!(self.source, UnitSource::Directory(_))
    }

    /// SHA-256 of the unit content as upper-case hex
    ///
    /// Live directories have no checksum and return `Ok(None)`.
    pub fn checksum(&self) -> Result<Option<String>, CorpusError> {
        match &self.source {
            UnitSource::Directory(_) => Ok(None),
            UnitSource::Archive(path) => {
                let mut file = fs::File::open(path)?;
                let mut hasher = Sha256::new();
                io::copy(&mut file, &mut hasher)?;
                Ok(Some(hex::encode_upper(hasher.finalize())))
            }
            UnitSource::Memory(entries) => {
                let mut hasher = Sha256::new();
                for (path, bytes) in entries {
                    hasher.update((path.len() as u64).to_be_bytes());
                    hasher.update(path.as_bytes());
                    hasher.update((bytes.len() as u64).to_be_bytes());
                    hasher.update(bytes);
                }
                Ok(Some(hex::encode_upper(hasher.finalize())))
            }
        }
    }

    /// Visit every class file in the unit
    ///
    /// `wanted` sees the class name derived from the entry path and decides
    /// whether the blob is read at all. Unreadable individual entries are
    /// logged and skipped; only failing to open the unit is an error.
    pub fn for_each_class<W, V>(&self, mut wanted: W, mut visit: V) -> Result<(), CorpusError>
    where
        W: FnMut(&str) -> bool,
        V: FnMut(&str, &[u8]),
    {
        match &self.source {
            UnitSource::Memory(entries) => {
                for (path, bytes) in entries {
                    if let Some(name) = class_name_from_path(path) {
                        if wanted(&name) {
                            visit(&name, bytes);
                        }
                    }
                }
                Ok(())
            }
            UnitSource::Archive(path) => {
                let file = fs::File::open(path)?;
                let mut archive = zip::ZipArchive::new(file)?;
                for i in 0..archive.len() {
                    let mut entry = match archive.by_index(i) {
                        Ok(entry) => entry,
                        Err(e) => {
                            tracing::warn!(unit = %self.id, index = i, error = %e, "unreadable archive entry");
                            continue;
                        }
                    };
                    if entry.is_dir() {
                        continue;
                    }
                    let Some(name) = class_name_from_path(entry.name()) else {
                        continue;
                    };
                    if !wanted(&name) {
                        continue;
                    }
                    let declared = entry.size();
                    match read_bounded(&mut entry, declared, MAX_CLASS_BYTES) {
                        Ok(Some(bytes)) => visit(&name, &bytes),
                        Ok(None) => {
                            tracing::warn!(unit = %self.id, class = %name, declared, "oversized class entry skipped");
                        }
                        Err(e) => {
                            tracing::warn!(unit = %self.id, class = %name, error = %e, "failed to read class");
                        }
                    }
                }
                Ok(())
            }
            UnitSource::Directory(root) => {
                let mut files = Vec::new();
                collect_class_files(root, &mut files)?;
                for path in files {
                    let Some(name) = path
                        .strip_prefix(root)
                        .ok()
                        .and_then(|rel| class_name_from_path(&rel.to_string_lossy()))
                    else {
                        continue;
                    };
                    if !wanted(&name) {
                        continue;
                    }
                    match fs::read(&path) {
                        Ok(bytes) => visit(&name, &bytes),
                        Err(e) => {
                            tracing::warn!(unit = %self.id, path = %path.display(), error = %e, "failed to read class");
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Read an entry whose header claims `declared` bytes
///
/// Returns `Ok(None)` when either the declared or the actual length exceeds
/// `cap`. The declared size is never trusted for allocation.
fn read_bounded<R: Read>(reader: R, declared: u64, cap: u64) -> io::Result<Option<Vec<u8>>> {
    if declared > cap {
        return Ok(None);
    }
    let mut bytes = Vec::with_capacity(declared as usize);
    reader.take(cap + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > cap {
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Recursively collect `.class` files, skipping hidden directories
///
/// Symlinked directories are not followed.
fn collect_class_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            collect_class_files(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("class") {
            files.push(path);
        }
    }
    Ok(())
}

/// Turn a mods directory into units
///
/// Each `*.jar` / `*.zip` file becomes an archive unit named after its file
/// stem; each non-hidden sub-directory becomes a live directory unit named
/// after the directory. Units are returned sorted by identifier.
pub fn discover_units(dir: &Path) -> Result<Vec<CorpusUnit>, CorpusError> {
    let mut units = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            units.push(CorpusUnit::directory(file_name, path));
            continue;
        }
        let is_archive = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"));
        if is_archive {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                units.push(CorpusUnit::archive(stem, path.clone()));
            }
        }
    }
    units.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::debug!(dir = %dir.display(), units = units.len(), "discovered corpus units");
    Ok(units)
}
