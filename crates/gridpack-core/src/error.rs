//! Domain-specific errors for the packaging pipeline.
//!
//! Every variant is fatal: no kind is retried or locally recovered, each
//! propagates to the orchestrator and aborts the whole packaging run with
//! the originating cause attached.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::fetch::FetchError;
use crate::types::PlatformId;

/// Failure of a packaging run.
#[derive(Error, Debug)]
pub enum PackageError {
    /// A platform id was requested that the built-in catalog does not know.
    /// Raised before any I/O happens.
    #[error("unknown platform: {0}")]
    UnknownPlatform(PlatformId),

    /// Every default platform was disabled and nothing was enabled instead.
    #[error("effective platform set is empty")]
    EmptyPlatformSet,

    /// Fetching an archive failed. The cache is left clean: no partial file
    /// is visible under the final name.
    #[error("download of {filename} failed: {source}")]
    Download {
        /// Archive filename inside the cache directory.
        filename: String,
        /// Underlying network, storage, or integrity failure.
        source: FetchError,
    },

    /// A cached archive could not be extracted (corrupt, unsupported
    /// format, or write failure).
    #[error("failed to extract {archive}: {source}")]
    Extraction {
        /// Path of the archive being extracted.
        archive: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// The archive contents do not match what the catalog expects; signals
    /// a catalog/archive version mismatch.
    #[error("expected file '{logical_name}' missing after extraction into {dir}")]
    MissingExtractedFile {
        /// Logical name the catalog expected the archive to contain.
        logical_name: String,
        /// Directory the archive was extracted into.
        dir: PathBuf,
    },

    /// A generated descriptor document could not be written.
    #[error("failed to write manifest {path}: {source}")]
    ManifestWrite {
        /// Target path of the descriptor.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The assimilator wrapper script could not be written.
    #[error("failed to write assimilator script {path}: {source}")]
    ScriptWrite {
        /// Target path of the script.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// A configured assimilator template path does not exist; a
    /// configuration or installation defect.
    #[error("assimilator script template not found: {0}")]
    TemplateMissing(PathBuf),

    /// Filesystem failure in orchestration work (directory setup, copies).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
