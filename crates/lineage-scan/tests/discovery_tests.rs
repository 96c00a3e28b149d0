//! Integration tests for subclass discovery
//!
//! Builds jar and directory corpora on disk and checks closure, exclusion,
//! caching and termination behavior end to end.

use lineage_classfile::{Annotation, ClassWriter, MARKER_ANNOTATION};
use lineage_scan::{
    discover_units, CorpusUnit, ScanCache, ScanConfig, ScanError, SubclassScanner,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const ROOT: &str = "net/minecraft/entity/Entity";

fn class(name: &str, super_name: &str) -> (String, Vec<u8>) {
    (name.to_string(), ClassWriter::new(name).extends(super_name).to_bytes())
}

fn mixin(name: &str, super_name: &str) -> (String, Vec<u8>) {
    let bytes = ClassWriter::new(name)
        .extends(super_name)
        .annotation(Annotation::marker(MARKER_ANNOTATION), false)
        .to_bytes();
    (name.to_string(), bytes)
}

fn write_jar(path: &Path, classes: &[(String, Vec<u8>)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("fabric.mod.json", options).unwrap();
    zip.write_all(b"{}").unwrap();
    for (name, bytes) in classes {
        zip.start_file(format!("{}.class", name), options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

fn write_dir(root: &Path, classes: &[(String, Vec<u8>)]) {
    for (name, bytes) in classes {
        let path = root.join(format!("{}.class", name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
}

fn scanner() -> SubclassScanner {
    SubclassScanner::new(ScanConfig {
        threads: 4,
        ..ScanConfig::for_root(ROOT)
    })
    .unwrap()
}

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("mods")).unwrap();
        Self { temp }
    }

    fn mods(&self) -> std::path::PathBuf {
        self.temp.path().join("mods")
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.temp.path().join("config").join("scan_cache.toml")
    }

    fn units(&self) -> Vec<CorpusUnit> {
        discover_units(&self.mods()).unwrap()
    }

    fn scan(&self) -> lineage_scan::ScanReport {
        let mut cache = ScanCache::load(self.cache_path());
        scanner().scan(&self.units(), &mut cache).unwrap()
    }
}

fn standard_corpus(fixture: &Fixture) {
    // minecraft: the root and its vanilla subclasses
    write_jar(
        &fixture.mods().join("minecraft.jar"),
        &[
            (ROOT.to_string(), ClassWriter::new(ROOT).to_bytes()),
            class("net/minecraft/entity/LivingEntity", ROOT),
            class("net/minecraft/entity/mob/ZombieEntity", "net/minecraft/entity/mob/HostileEntity"),
            class("net/minecraft/entity/mob/HostileEntity", "net/minecraft/entity/LivingEntity"),
            class("net/minecraft/block/Block", "java/lang/Object"),
        ],
    );
    // a mod extending vanilla classes, with a mixin in between
    write_jar(
        &fixture.mods().join("moremobs-1.2.jar"),
        &[
            class("com/moremobs/Ghoul", "net/minecraft/entity/mob/ZombieEntity"),
            class("com/moremobs/GhoulKing", "com/moremobs/Ghoul"),
            mixin("com/moremobs/mixin/ZombieMixin", "net/minecraft/entity/mob/ZombieEntity"),
            class("com/moremobs/mixin/ZombieMixinChild", "com/moremobs/mixin/ZombieMixin"),
            class("com/moremobs/MobBlock", "net/minecraft/block/Block"),
        ],
    );
}

#[test]
fn test_closure_across_units() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);

    let report = fixture.scan();

    let expected = [
        ROOT,
        "net/minecraft/entity/LivingEntity",
        "net/minecraft/entity/mob/HostileEntity",
        "net/minecraft/entity/mob/ZombieEntity",
        "com/moremobs/Ghoul",
        "com/moremobs/GhoulKing",
    ];
    assert_eq!(report.qualifying.len(), expected.len());
    for class in expected {
        assert!(report.contains(class), "missing {}", class);
    }
    assert!(!report.contains("net/minecraft/block/Block"));
    assert!(!report.contains("com/moremobs/MobBlock"));

    assert_eq!(
        report.superclasses.get("com/moremobs/GhoulKing").map(String::as_str),
        Some("com/moremobs/Ghoul")
    );
    assert!(!report.superclasses.contains_key(ROOT));
    assert_eq!(report.units_scanned, 2);
    assert_eq!(report.discovered, 5);
}

#[test]
fn test_exclusion_precedence() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);

    let report = fixture.scan();

    assert!(report.excluded.contains("com/moremobs/mixin/ZombieMixin"));
    assert!(!report.contains("com/moremobs/mixin/ZombieMixin"));
    // The chain to the root passes through an excluded class
    assert!(!report.contains("com/moremobs/mixin/ZombieMixinChild"));
    // Siblings of the excluded class are unaffected
    assert!(report.contains("com/moremobs/Ghoul"));
}

#[test]
fn test_cache_soundness() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);

    let first = fixture.scan();
    assert!(first.cache_saved());
    assert!(first.classes_parsed > 0);

    let second = fixture.scan();
    assert_eq!(second.classes_parsed, 0);
    assert_eq!(second.passes, 0);
    assert_eq!(second.units_cached, 2);
    assert_eq!(second.units_scanned, 0);
    assert_eq!(second.qualifying, first.qualifying);
    assert_eq!(second.superclasses, first.superclasses);
}

#[test]
fn test_cache_invalidation_rescans_only_changed_unit() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);
    fixture.scan();

    write_jar(
        &fixture.mods().join("moremobs-1.2.jar"),
        &[
            class("com/moremobs/Ghoul", "net/minecraft/entity/mob/ZombieEntity"),
            class("com/moremobs/Wraith", "net/minecraft/entity/LivingEntity"),
        ],
    );

    let report = fixture.scan();
    assert_eq!(report.units_cached, 1);
    assert_eq!(report.units_scanned, 1);
    assert!(report.contains("com/moremobs/Wraith"));
    assert!(!report.contains("com/moremobs/GhoulKing"));

    let cache = ScanCache::try_load(&fixture.cache_path()).unwrap().unwrap();
    assert_eq!(
        cache.get("moremobs-1.2").unwrap().classes,
        vec!["com/moremobs/Ghoul", "com/moremobs/Wraith"]
    );
    assert_eq!(cache.get("minecraft").unwrap().classes.len(), 3);
}

#[test]
fn test_checksum_case_is_ignored() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);
    fixture.scan();

    // Lower-case every stored checksum
    let path = fixture.cache_path();
    let mut cache = ScanCache::try_load(&path).unwrap().unwrap();
    let entries: Vec<_> = cache.entries().cloned().collect();
    for mut entry in entries {
        entry.checksum = entry.checksum.map(|c| c.to_lowercase());
        cache.put(entry);
    }
    cache.save().unwrap();

    let report = fixture.scan();
    assert_eq!(report.units_cached, 2);
    assert_eq!(report.classes_parsed, 0);
}

#[test]
fn test_live_directory_always_rescanned() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);
    write_dir(
        &fixture.mods().join("devmod"),
        &[class("dev/TestMob", "net/minecraft/entity/mob/HostileEntity")],
    );

    let first = fixture.scan();
    assert!(first.contains("dev/TestMob"));

    let second = fixture.scan();
    assert_eq!(second.units_cached, 2);
    assert_eq!(second.units_scanned, 1);
    assert!(second.contains("dev/TestMob"));
}

#[test]
fn test_removed_unit_entry_dropped() {
    let fixture = Fixture::new();
    standard_corpus(&fixture);
    fixture.scan();

    fs::remove_file(fixture.mods().join("moremobs-1.2.jar")).unwrap();
    let report = fixture.scan();
    assert!(!report.contains("com/moremobs/Ghoul"));

    let cache = ScanCache::try_load(&fixture.cache_path()).unwrap().unwrap();
    assert!(cache.get("moremobs-1.2").is_none());
    assert_eq!(cache.len(), 1);
}

/// Each generation is stored before its parent, so a single worker finds
/// exactly one new class per pass.
fn deep_chain(depth: usize) -> Vec<(String, Vec<u8>)> {
    let mut classes: Vec<_> = (1..=depth)
        .map(|i| {
            let parent = if i == 1 {
                ROOT.to_string()
            } else {
                format!("deep/Gen{}", i - 1)
            };
            (
                format!("deep/Gen{}.class", i),
                ClassWriter::new(format!("deep/Gen{}", i)).extends(parent).to_bytes(),
            )
        })
        .collect();
    classes.reverse();
    classes
}

#[test]
fn test_pass_ceiling_aborts() {
    let temp = TempDir::new().unwrap();
    let mut cache = ScanCache::new(temp.path().join("cache.toml"));
    let units = vec![CorpusUnit::memory("deep", deep_chain(25))];
    let scanner = SubclassScanner::new(ScanConfig {
        threads: 1,
        ..ScanConfig::for_root(ROOT)
    })
    .unwrap();

    let err = scanner.scan(&units, &mut cache).unwrap_err();
    assert!(matches!(err, ScanError::PassCeilingExceeded { ceiling: 20 }));
}

#[test]
fn test_chain_within_ceiling_converges() {
    let temp = TempDir::new().unwrap();
    let mut cache = ScanCache::new(temp.path().join("cache.toml"));
    let units = vec![CorpusUnit::memory("deep", deep_chain(19))];
    let scanner = SubclassScanner::new(ScanConfig {
        threads: 1,
        ..ScanConfig::for_root(ROOT)
    })
    .unwrap();

    let report = scanner.scan(&units, &mut cache).unwrap();
    assert_eq!(report.passes, 20);
    assert!(report.contains("deep/Gen19"));
    assert_eq!(report.qualifying.len(), 20);
}

#[test]
fn test_many_units_many_workers() {
    let fixture = Fixture::new();
    for unit in 0..16 {
        let classes: Vec<_> = (0..8)
            .map(|i| {
                let parent = if unit == 0 && i == 0 {
                    ROOT.to_string()
                } else if i == 0 {
                    format!("u{}/C7", unit - 1)
                } else {
                    format!("u{}/C{}", unit, i - 1)
                };
                class(&format!("u{}/C{}", unit, i), &parent)
            })
            .collect();
        write_jar(&fixture.mods().join(format!("unit{:02}.jar", unit)), &classes);
    }

    let report = fixture.scan();
    assert_eq!(report.qualifying.len(), 1 + 16 * 8);
    assert!(report.passes <= 20);
}
