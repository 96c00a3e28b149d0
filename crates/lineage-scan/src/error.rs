//! Scan errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::corpus::CorpusError;

/// Errors that abort a scan
///
/// Per-class parse failures and unreadable units are not in here: they are
/// logged and the class or unit is treated as not qualifying.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The fixed point was not reached within the pass ceiling
    #[error("Subclass scan did not converge within {ceiling} passes")]
    PassCeilingExceeded {
        /// Configured ceiling
        ceiling: usize,
    },

    /// Invalid scanner configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Corpus enumeration failed
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// A worker thread could not be started
    #[error("Failed to spawn scan worker: {0}")]
    Spawn(std::io::Error),

    /// A worker thread panicked
    #[error("Scan worker {0} panicked")]
    WorkerPanicked(usize),
}
