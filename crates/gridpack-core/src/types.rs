//! Core identifier and artifact types shared across the packaging pipeline.

use std::fmt;
use std::path::PathBuf;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;

/// Identifier for an OS/architecture combination a bundle targets,
/// e.g. `x86_64-pc-linux-gnu` or `windows_x86_64`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct PlatformId(String);

impl PlatformId {
    /// Wrap a raw platform string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this platform targets Windows. Windows platforms get `.exe`
    /// suffixed executables and a different default wrapper build.
    pub fn is_windows(&self) -> bool {
        self.0.starts_with("windows_")
    }

    /// Executable filename suffix for this platform (`.exe` or empty).
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier embedded in every versioned physical filename so that two
/// packaging runs sharing an output root never collide.
///
/// Stable for the lifetime of one packaging invocation: resolved once from
/// the caller-supplied key, or freshly generated when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionKey(String);

impl VersionKey {
    /// Use the explicit key if the caller supplied one, otherwise generate
    /// a random alphanumeric key.
    pub fn resolve(explicit: Option<&str>) -> Self {
        match explicit {
            Some(key) => Self(key.to_string()),
            None => Self(
                rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(12)
                    .map(char::from)
                    .collect(),
            ),
        }
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an artifact reaches worker hosts, which decides the shape of its
/// `version.xml` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallKind {
    /// Shipped inline with the app version; the grid copies it verbatim.
    CopiedFromSource,
    /// Fetched by the grid itself from these URLs, in order, first success
    /// wins. Not shipped inline.
    DownloadedByUrl(Vec<String>),
    /// The task wrapper the grid client launches. Exactly one per platform.
    MainProgram,
}

/// One installed file of a platform bundle, ready to be described in that
/// platform's version manifest.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Stable name the job descriptor references the artifact by.
    pub logical_name: String,
    /// The versioned file on disk inside the platform directory.
    pub physical_path: PathBuf,
    /// Distribution mode for this artifact.
    pub kind: InstallKind,
}

impl ArtifactFile {
    /// The physical (on-disk, versioned) filename.
    pub fn physical_name(&self) -> &str {
        self.physical_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}
