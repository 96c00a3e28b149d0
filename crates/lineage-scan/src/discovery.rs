//! Subclass discovery
//!
//! Computes the set of classes that transitively extend a root class, using
//! nothing but each class file's superclass link. A class qualifies once its
//! superclass is known to qualify, so the corpus is swept repeatedly until a
//! pass adds nothing. Classes carrying the marker annotation never qualify.
//!
//! Units whose checksum matches the cache contribute their stored classes
//! without being opened. Each pass spreads the remaining units over a pool of
//! worker threads; the end of the pass is the barrier.

use crossbeam_deque::{Injector, Steal};
use dashmap::{DashMap, DashSet};
use lineage_classfile::{ClassHeader, ClassInfo};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, ScanCache};
use crate::config::ScanConfig;
use crate::corpus::CorpusUnit;
use crate::error::ScanError;

/// Outcome of a scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Root class the closure was computed for
    pub root_class: String,
    /// Every qualifying class, including the root
    pub qualifying: BTreeSet<String>,
    /// Classes rejected because of the marker annotation
    pub excluded: BTreeSet<String>,
    /// Superclass of every qualifying class except the root
    pub superclasses: BTreeMap<String, String>,
    /// Passes run (0 when every unit came from the cache)
    pub passes: usize,
    /// Class files parsed, header or full
    pub classes_parsed: usize,
    /// Class files parsed in full
    pub full_parses: usize,
    /// Units answered from the cache
    pub units_cached: usize,
    /// Units scanned this run
    pub units_scanned: usize,
    /// Units on the skip list
    pub units_skipped: usize,
    /// Units that could not be read
    pub units_failed: usize,
    /// Classes added by this run's passes
    pub discovered: usize,
    /// Wall-clock time of the whole scan
    pub elapsed: Duration,
    /// Why saving the cache failed, if it did
    pub cache_error: Option<String>,
}

impl ScanReport {
    /// Whether `class` qualifies
    pub fn contains(&self, class: &str) -> bool {
        self.qualifying.contains(class)
    }

    /// Whether the cache was written back successfully
    pub fn cache_saved(&self) -> bool {
        self.cache_error.is_none()
    }
}

#[derive(Debug, Default)]
struct UnitProgress {
    classes: Vec<String>,
    failed: bool,
}

/// State shared by the workers of every pass
struct ScanState<'a> {
    marker: &'a str,
    qualifying: DashSet<String>,
    excluded: DashSet<String>,
    superclasses: DashMap<String, String>,
    found_new: AtomicBool,
    classes_parsed: AtomicUsize,
    full_parses: AtomicUsize,
}

impl ScanState<'_> {
    fn scan_unit(&self, unit: &CorpusUnit, progress: &Mutex<UnitProgress>) {
        tracing::debug!(unit = %unit.id, "scanning unit");
        let result = unit.for_each_class(
            |name| !self.qualifying.contains(name) && !self.excluded.contains(name),
            |path_name, bytes| {
                if let Some(class) = self.examine(unit, path_name, bytes) {
                    progress.lock().classes.push(class);
                }
            },
        );
        if let Err(e) = result {
            tracing::error!(unit = %unit.id, error = %e, "failed to scan unit");
            progress.lock().failed = true;
        }
    }

    /// Check one class file, returning its name if it newly qualifies
    fn examine(&self, unit: &CorpusUnit, path_name: &str, bytes: &[u8]) -> Option<String> {
        tracing::trace!(unit = %unit.id, class = path_name, "scanning class");
        self.classes_parsed.fetch_add(1, Ordering::Relaxed);
        let header = match ClassHeader::read(bytes) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(unit = %unit.id, class = path_name, error = %e, "failed to parse class header");
                return None;
            }
        };
        let super_name = header.super_name.as_deref()?;
        if !self.qualifying.contains(super_name) {
            return None;
        }

        self.full_parses.fetch_add(1, Ordering::Relaxed);
        let info = match ClassInfo::read(bytes) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(unit = %unit.id, class = path_name, error = %e, "failed to parse class");
                return None;
            }
        };
        if info.has_annotation(self.marker) {
            tracing::debug!(class = info.name(), "excluding marker-annotated class");
            self.excluded.insert(header.name);
            return None;
        }

        if self.qualifying.insert(header.name.clone()) {
            tracing::debug!(class = %header.name, superclass = super_name, "found subclass");
            self.superclasses
                .insert(header.name.clone(), super_name.to_string());
            self.found_new.store(true, Ordering::Release);
            Some(header.name)
        } else {
            None
        }
    }
}

/// Fixed-point subclass scanner
#[derive(Debug, Clone)]
pub struct SubclassScanner {
    config: ScanConfig,
}

impl SubclassScanner {
    /// Create a scanner; the config is validated and normalized
    pub fn new(mut config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `units`, consulting and updating `cache`
    ///
    /// The cache is saved before returning. A failed save is logged and
    /// recorded in the report; it does not fail the scan.
    pub fn scan(&self, units: &[CorpusUnit], cache: &mut ScanCache) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let root = self.config.root_class.as_str();
        let mut report = ScanReport {
            root_class: root.to_string(),
            ..ScanReport::default()
        };

        let state = ScanState {
            marker: &self.config.marker_annotation,
            qualifying: DashSet::new(),
            excluded: DashSet::new(),
            superclasses: DashMap::new(),
            found_new: AtomicBool::new(false),
            classes_parsed: AtomicUsize::new(0),
            full_parses: AtomicUsize::new(0),
        };

        // Partition into cached-valid and to-scan
        let mut present: HashSet<&str> = HashSet::new();
        let mut to_scan: Vec<(&CorpusUnit, Option<String>)> = Vec::new();
        let mut cached_classes = 0;
        for unit in units {
            if self.config.is_skipped(&unit.id) {
                report.units_skipped += 1;
                continue;
            }
            present.insert(unit.id.as_str());

            let checksum = match unit.checksum() {
                Ok(checksum) => checksum,
                Err(e) => {
                    tracing::error!(
                        unit = %unit.id,
                        error = %e,
                        "failed to compute unit checksum, rescanning"
                    );
                    None
                }
            };
            let cached = checksum
                .as_deref()
                .and_then(|sum| cache.get(&unit.id).filter(|entry| entry.matches_checksum(sum)));
            match cached {
                Some(entry) => {
                    report.units_cached += 1;
                    cached_classes += entry.classes.len();
                    for class in &entry.classes {
                        state.qualifying.insert(class.clone());
                    }
                    for (class, superclass) in &entry.superclasses {
                        state.superclasses.insert(class.clone(), superclass.clone());
                    }
                }
                None => to_scan.push((unit, checksum)),
            }
        }
        if cached_classes > 0 {
            tracing::info!(classes = cached_classes, "loaded subclass names from the cache");
        }
        state.qualifying.insert(root.to_string());

        let progress: Vec<Mutex<UnitProgress>> =
            to_scan.iter().map(|_| Mutex::default()).collect();

        if !to_scan.is_empty() {
            let threads = self.config.effective_threads(to_scan.len());
            tracing::info!(units = to_scan.len(), threads, "scanning for subclasses");
            let scan_units: Vec<&CorpusUnit> = to_scan.iter().map(|(unit, _)| *unit).collect();

            let mut pass = 1;
            loop {
                if pass > self.config.max_passes {
                    return Err(ScanError::PassCeilingExceeded {
                        ceiling: self.config.max_passes,
                    });
                }
                tracing::debug!(pass, "starting scan pass");
                state.found_new.store(false, Ordering::Release);
                run_pass(&state, &scan_units, &progress, threads)?;
                if !state.found_new.load(Ordering::Acquire) {
                    break;
                }
                pass += 1;
            }
            report.passes = pass;
            report.units_scanned = to_scan.len();
        }

        // Write back every unit scanned to completion
        for ((unit, checksum), progress) in to_scan.iter().zip(progress) {
            let progress = progress.into_inner();
            report.discovered += progress.classes.len();
            if progress.failed {
                report.units_failed += 1;
                cache.remove(&unit.id);
                continue;
            }
            let links = progress
                .classes
                .iter()
                .filter_map(|class| {
                    state
                        .superclasses
                        .get(class)
                        .map(|sup| (class.clone(), sup.value().clone()))
                })
                .collect();
            cache.put(
                CacheEntry::new(&unit.id, checksum.clone(), progress.classes)
                    .with_superclasses(links),
            );
        }
        cache.retain(|unit| present.contains(unit));

        report.cache_error = match cache.save() {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(path = %cache.path().display(), error = %e, "failed to save scan cache");
                Some(e.to_string())
            }
        };

        report.classes_parsed = state.classes_parsed.load(Ordering::Relaxed);
        report.full_parses = state.full_parses.load(Ordering::Relaxed);
        report.qualifying = state.qualifying.into_iter().collect();
        report.excluded = state.excluded.into_iter().collect();
        report.superclasses = state.superclasses.into_iter().collect();
        report.elapsed = started.elapsed();

        tracing::info!(
            qualifying = report.qualifying.len(),
            discovered = report.discovered,
            passes = report.passes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "subclass scan finished"
        );
        Ok(report)
    }
}

/// Run one pass: every unit is handed to exactly one worker
fn run_pass(
    state: &ScanState<'_>,
    units: &[&CorpusUnit],
    progress: &[Mutex<UnitProgress>],
    threads: usize,
) -> Result<(), ScanError> {
    let injector = Injector::new();
    for index in 0..units.len() {
        injector.push(index);
    }
    let injector = &injector;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        let mut first_error = None;
        for id in 0..threads {
            let spawned = thread::Builder::new()
                .name(format!("lineage-scan-{}", id))
                .spawn_scoped(scope, move || loop {
                    match injector.steal() {
                        Steal::Success(index) => state.scan_unit(units[index], &progress[index]),
                        Steal::Empty => break,
                        Steal::Retry => continue,
                    }
                });
            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    first_error = Some(ScanError::Spawn(e));
                    break;
                }
            }
        }
        for (id, handle) in handles {
            if handle.join().is_err() && first_error.is_none() {
                first_error = Some(ScanError::WorkerPanicked(id));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
}

/// Validate `config` and run a single scan
pub fn scan_with(
    config: ScanConfig,
    units: &[CorpusUnit],
    cache: &mut ScanCache,
) -> Result<ScanReport, ScanError> {
    SubclassScanner::new(config)?.scan(units, cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_classfile::{Annotation, ClassWriter, MARKER_ANNOTATION};
    use tempfile::TempDir;

    fn class(name: &str, super_name: &str) -> (String, Vec<u8>) {
        (
            format!("{}.class", name),
            ClassWriter::new(name).extends(super_name).to_bytes(),
        )
    }

    fn config() -> ScanConfig {
        ScanConfig {
            threads: 2,
            ..ScanConfig::for_root("root/Entity")
        }
    }

    #[test]
    fn test_root_only_when_nothing_extends_it() {
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        let units = vec![CorpusUnit::memory("m", vec![class("a/Other", "java/lang/Object")])];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert_eq!(report.qualifying.len(), 1);
        assert!(report.contains("root/Entity"));
        assert_eq!(report.passes, 1);
        assert!(report.cache_saved());
    }

    #[test]
    fn test_skip_list() {
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        let units = vec![
            CorpusUnit::memory("java", vec![class("j/Hidden", "root/Entity")]),
            CorpusUnit::memory("mod", vec![class("m/Seen", "root/Entity")]),
        ];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert!(report.contains("m/Seen"));
        assert!(!report.contains("j/Hidden"));
        assert_eq!(report.units_skipped, 1);
        assert!(cache.get("java").is_none());
    }

    #[test]
    fn test_same_pass_siblings_defer() {
        // Child listed before its parent: needs a second discovering pass
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        let units = vec![CorpusUnit::memory(
            "m",
            vec![class("a/Child", "a/Parent"), class("a/Parent", "root/Entity")],
        )];

        let report = scan_with(ScanConfig { threads: 1, ..config() }, &units, &mut cache).unwrap();
        assert!(report.contains("a/Child"));
        assert_eq!(report.passes, 3);
        assert_eq!(report.discovered, 2);
    }

    #[test]
    fn test_unparsable_class_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        let units = vec![CorpusUnit::memory(
            "m",
            vec![
                ("a/Broken.class".to_string(), vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00]),
                class("a/Fine", "root/Entity"),
            ],
        )];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert!(report.contains("a/Fine"));
        assert!(!report.contains("a/Broken"));
    }

    #[test]
    fn test_unreadable_unit_not_persisted() {
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        cache.put(CacheEntry::new("gone", Some("OLD".to_string()), vec!["x/Y".to_string()]));
        let units = vec![
            CorpusUnit::archive("gone", temp.path().join("gone.jar")),
            CorpusUnit::memory("m", vec![class("a/Fine", "root/Entity")]),
        ];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert_eq!(report.units_failed, 1);
        assert!(!report.contains("x/Y"));
        assert!(cache.get("gone").is_none());
        assert!(cache.get("m").is_some());
    }

    #[test]
    fn test_marker_annotation_excludes() {
        let temp = TempDir::new().unwrap();
        let mut cache = ScanCache::new(temp.path().join("cache.toml"));
        let mixin = ClassWriter::new("a/Mixin")
            .extends("root/Entity")
            .annotation(Annotation::marker(MARKER_ANNOTATION), false)
            .to_bytes();
        let units = vec![CorpusUnit::memory("m", vec![("a/Mixin.class".to_string(), mixin)])];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert!(!report.contains("a/Mixin"));
        assert!(report.excluded.contains("a/Mixin"));
        assert!(cache.get("m").unwrap().classes.is_empty());
    }

    #[test]
    fn test_unwritable_cache_reported() {
        let temp = TempDir::new().unwrap();
        // The cache path is an existing directory, so the rename fails
        let blocked = temp.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();
        let mut cache = ScanCache::new(&blocked);
        let units = vec![CorpusUnit::memory("m", vec![class("a/Fine", "root/Entity")])];

        let report = scan_with(config(), &units, &mut cache).unwrap();
        assert!(report.contains("a/Fine"));
        assert!(!report.cache_saved());
    }
}
