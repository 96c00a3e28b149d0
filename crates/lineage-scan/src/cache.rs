//! Scan result cache (scan_cache.toml)
//!
//! Records, per corpus unit, the checksum the unit had when it was last
//! scanned and the qualifying classes found in it. Deciding whether an entry
//! is stale is up to the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache document format version
pub const CACHE_VERSION: u32 = 1;

/// Default cache file name
pub const CACHE_FILE: &str = "scan_cache.toml";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse cache: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize the cache
    #[error("Failed to serialize cache: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Document written by an incompatible version
    #[error("Unsupported cache version: {found} (expected {expected})")]
    VersionMismatch {
        /// Version in the document
        found: u32,
        /// Version this build writes
        expected: u32,
    },
}

/// Cached result for one corpus unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Unit identifier
    pub unit: String,

    /// Checksum at scan time (absent for live directories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Qualifying classes found in the unit, sorted
    #[serde(default)]
    pub classes: Vec<String>,

    /// Superclass of each class in `classes`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub superclasses: BTreeMap<String, String>,
}

impl CacheEntry {
    /// Create an entry; class names are sorted and deduplicated
    pub fn new(unit: impl Into<String>, checksum: Option<String>, mut classes: Vec<String>) -> Self {
        classes.sort();
        classes.dedup();
        Self {
            unit: unit.into(),
            checksum,
            classes,
            superclasses: BTreeMap::new(),
        }
    }

    /// Attach superclass links
    pub fn with_superclasses(mut self, superclasses: BTreeMap<String, String>) -> Self {
        self.superclasses = superclasses;
        self
    }

    /// Whether the stored checksum equals `checksum`, ignoring case
    pub fn matches_checksum(&self, checksum: &str) -> bool {
        self.checksum
            .as_deref()
            .is_some_and(|stored| stored.eq_ignore_ascii_case(checksum))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    #[serde(default)]
    units: Vec<CacheEntry>,
}

/// Per-unit scan results backed by a TOML file
#[derive(Debug, Clone)]
pub struct ScanCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
}

/// `~/.lineage/scan_cache.toml`, if a home directory is known
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lineage").join(CACHE_FILE))
}

impl ScanCache {
    /// Create an empty cache that saves to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache at `path`
    ///
    /// A missing file yields an empty cache. An unreadable or unparsable file
    /// is logged and also yields an empty cache, so the next scan is cold.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(Some(cache)) => {
                tracing::info!(path = %path.display(), units = cache.len(), "loaded scan cache");
                cache
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "scan cache does not exist, starting cold");
                Self::new(path)
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load scan cache, starting cold");
                Self::new(path)
            }
        }
    }

    /// Load the cache at `path`, reporting every failure
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let document: CacheDocument = toml::from_str(&content)?;
        if document.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                found: document.version,
                expected: CACHE_VERSION,
            });
        }

        let entries = document
            .units
            .into_iter()
            .map(|entry| (entry.unit.clone(), entry))
            .collect();
        Ok(Some(Self {
            path: path.to_path_buf(),
            entries,
        }))
    }

    /// Write the complete mapping
    ///
    /// The document is written to a sibling temporary file which is then
    /// renamed over the target.
    pub fn save(&self) -> Result<(), CacheError> {
        let document = CacheDocument {
            version: CACHE_VERSION,
            units: self.entries.values().cloned().collect(),
        };
        let content = toml::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut tmp_file = fs::File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        tracing::info!(path = %self.path.display(), units = self.entries.len(), "saved scan cache");
        Ok(())
    }

    /// Location the cache saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry for a unit
    pub fn get(&self, unit: &str) -> Option<&CacheEntry> {
        self.entries.get(unit)
    }

    /// Insert or replace the entry for `entry.unit`
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.unit.clone(), entry);
    }

    /// Remove the entry for a unit
    pub fn remove(&mut self, unit: &str) -> Option<CacheEntry> {
        self.entries.remove(unit)
    }

    /// Keep only the entries whose unit satisfies `keep`
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|unit, _| keep(unit));
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries, ordered by unit identifier
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entry() -> CacheEntry {
        let mut links = BTreeMap::new();
        links.insert("com/example/Zombie".to_string(), "com/example/Monster".to_string());
        links.insert("com/example/Monster".to_string(), "net/minecraft/entity/Entity".to_string());
        CacheEntry::new(
            "example",
            Some("ABCDEF".to_string()),
            vec!["com/example/Zombie".to_string(), "com/example/Monster".to_string()],
        )
        .with_superclasses(links)
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(CACHE_FILE);

        let mut cache = ScanCache::new(&path);
        cache.put(sample_entry());
        cache.put(CacheEntry::new("devmod", None, vec!["a/B".to_string()]));
        cache.save().unwrap();

        let loaded = ScanCache::try_load(&path).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("example"), Some(&sample_entry()));
        assert_eq!(loaded.get("devmod").unwrap().checksum, None);
        assert_eq!(
            loaded.get("example").unwrap().classes,
            vec!["com/example/Monster", "com/example/Zombie"]
        );

        // No temporary file left behind
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CACHE_FILE)]);
    }

    #[test]
    fn test_missing_file_is_cold() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE);
        assert!(ScanCache::try_load(&path).unwrap().is_none());
        assert!(ScanCache::load(&path).is_empty());
    }

    #[test]
    fn test_corrupt_file_is_cold() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE);
        fs::write(&path, "version = [[[").unwrap();

        assert!(matches!(
            ScanCache::try_load(&path),
            Err(CacheError::ParseError(_))
        ));
        let cache = ScanCache::load(&path);
        assert!(cache.is_empty());
        assert_eq!(cache.path(), path);
    }

    #[test]
    fn test_version_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE);
        fs::write(&path, "version = 99\n").unwrap();
        assert!(matches!(
            ScanCache::try_load(&path),
            Err(CacheError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_save_supersedes_previous_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CACHE_FILE);
        fs::write(&path, "garbage from an interrupted write").unwrap();

        let mut cache = ScanCache::new(&path);
        cache.put(sample_entry());
        cache.save().unwrap();

        assert_eq!(ScanCache::try_load(&path).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_checksum_comparison_ignores_case() {
        let entry = sample_entry();
        assert!(entry.matches_checksum("abcdef"));
        assert!(entry.matches_checksum("ABCDEF"));
        assert!(!entry.matches_checksum("ABCDEE"));
        assert!(!CacheEntry::new("dir", None, Vec::new()).matches_checksum("ABCDEF"));
    }

    #[test]
    fn test_put_remove_retain() {
        let mut cache = ScanCache::new("unused.toml");
        cache.put(CacheEntry::new("a", None, Vec::new()));
        cache.put(CacheEntry::new("b", None, Vec::new()));
        cache.put(CacheEntry::new("c", None, Vec::new()));

        assert!(cache.remove("b").is_some());
        assert!(cache.remove("b").is_none());
        cache.retain(|unit| unit != "c");

        let units: Vec<_> = cache.entries().map(|e| e.unit.as_str()).collect();
        assert_eq!(units, vec!["a"]);
    }
}
