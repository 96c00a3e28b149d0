//! Subclass discovery over class-file corpora
//!
//! This crate provides:
//! - Corpus units (archives, live directories, in-memory blobs)
//! - The per-unit checksum cache (scan_cache.toml)
//! - The fixed-point subclass scanner
//! - Hook-site selection for the qualifying classes
//! - Scanner configuration (lineage.toml)

pub mod cache;
pub mod config;
pub mod corpus;
pub mod discovery;
pub mod error;
pub mod hooks;

pub use cache::{default_cache_path, CacheEntry, CacheError, ScanCache};
pub use config::{ConfigError, LineageConfig, ScanConfig};
pub use corpus::{discover_units, CorpusError, CorpusUnit, UnitSource};
pub use discovery::{scan_with, ScanReport, SubclassScanner};
pub use error::ScanError;
pub use hooks::{hook_sites, plan, HookPlan, HookSite, HookSpec};
