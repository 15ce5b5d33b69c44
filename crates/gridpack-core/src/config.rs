//! Packaging configuration.
//!
//! A [`PackageConfig`] is supplied by the invoking command line, optionally
//! seeded from a `gridpack.toml` file. The core consumes it as plain data.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::script::AssimilatorSpec;
use crate::types::{PlatformId, VersionKey};

/// Default request timeout for archive downloads, in seconds.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 600;

/// Everything one packaging run needs to know.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    /// The application uberjar to bundle.
    pub uberjar: PathBuf,

    /// Main class of the bundled application. Carried as metadata; the
    /// launcher reads it from the jar manifest.
    #[serde(default)]
    pub main_class: Option<String>,

    /// Per-platform enable/disable overrides applied to the default set.
    #[serde(default)]
    pub platforms: BTreeMap<PlatformId, bool>,

    /// Directory copied verbatim into the output root as `templates/`,
    /// if it exists.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Explicit version key; a random one is generated when absent.
    #[serde(default)]
    pub version_key: Option<String>,

    /// Output root the bundle tree is assembled in.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cache directory for downloaded wrapper and launcher archives.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Custom assimilator stage; the grid's sample assimilator is used
    /// when absent.
    #[serde(default)]
    pub assimilator: Option<AssimilatorSpec>,

    /// Per-platform wrapper archive URL overrides.
    #[serde(default)]
    pub wrapper_urls: BTreeMap<PlatformId, String>,

    /// Global wrapper version override.
    #[serde(default)]
    pub wrapper_version: Option<String>,

    /// Optional `archive filename -> sha256` integrity expectations.
    #[serde(default)]
    pub checksums: HashMap<String, String>,

    /// Download timeout in seconds.
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

impl PackageConfig {
    /// Minimal configuration for an uberjar, everything else defaulted.
    pub fn for_uberjar(uberjar: impl Into<PathBuf>) -> Self {
        Self {
            uberjar: uberjar.into(),
            main_class: None,
            platforms: BTreeMap::new(),
            templates_dir: None,
            version_key: None,
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            assimilator: None,
            wrapper_urls: BTreeMap::new(),
            wrapper_version: None,
            checksums: HashMap::new(),
            fetch_timeout_secs: None,
        }
    }

    /// Load a configuration from a `gridpack.toml` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    /// conforming to the configuration schema.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: PackageConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Resolved download deadline.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// The uberjar's logical name: its plain filename, stable across
    /// versions.
    pub fn uberjar_name(&self) -> String {
        self.uberjar
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// The uberjar's version-qualified physical name,
    /// `<base>_<key>.jar`.
    pub fn uberjar_physical_name(&self, key: &VersionKey) -> String {
        let base = self
            .uberjar
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{base}_{key}.jar")
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("boinc")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("target")
}
