//! gridpack-core: per-platform distributable bundle assembly for a
//! volunteer-computing grid application.
//!
//! For each supported platform the pipeline fetches a matching runtime
//! image, task wrapper, and application archive, then emits the XML
//! descriptors the grid's scheduler needs to validate, transfer, and
//! launch the bundle.

pub mod bundle;
pub mod catalog;
pub mod config;
pub mod error;
pub mod io;
pub mod manifest;
pub mod script;
pub mod types;
pub mod xml;

pub use bundle::Packager;
pub use catalog::PlatformCatalog;
pub use config::PackageConfig;
pub use error::PackageError;
pub use types::{ArtifactFile, InstallKind, PlatformId, VersionKey};

/// User Agent string for archive downloads
pub const USER_AGENT: &str = concat!("gridpack/", env!("CARGO_PKG_VERSION"));
