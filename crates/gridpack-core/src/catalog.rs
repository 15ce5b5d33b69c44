//! Platform catalog: the static mapping from platform id to its runtime
//! descriptor and artifact naming rules.
//!
//! The catalog is a plain immutable value constructed once at startup and
//! passed explicitly into every stage, so tests can substitute a smaller
//! one. Pure lookup, no I/O.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::PackageError;
use crate::types::PlatformId;

/// Logical name every platform's runtime image is referenced by.
pub const RUNTIME_IMAGE_LOGICAL_NAME: &str = "jdk.zip";

/// Wrapper build shipped for non-Windows platforms.
pub const DEFAULT_WRAPPER_VERSION: &str = "26014";

/// Wrapper build shipped for Windows platforms.
pub const WINDOWS_WRAPPER_VERSION: &str = "26016";

/// Release tag of the packaged runtime launcher.
pub const LAUNCHER_VERSION: &str = "v0.5";

/// Default host serving task wrapper archives.
pub const WRAPPER_BASE_URL: &str = "https://boinc.berkeley.edu/dl/";

/// Release host serving launcher archives.
pub const LAUNCHER_BASE_URL: &str = "https://github.com/jkutner/mjava/releases/download/";

/// Host serving prebuilt runtime images.
const RUNTIME_IMAGE_BASE_URL: &str = "https://s3.amazonaws.com/boinc4j/";

/// Per-platform record describing the runtime image the bundle ships.
#[derive(Debug, Clone)]
pub struct RuntimeDescriptor {
    /// Stable name the job descriptor and manifests reference the image by.
    pub logical_name: &'static str,
    /// Archive basename, which doubles as the physical name on disk.
    pub image_name: String,
    /// Where the image can be fetched from, in preference order.
    pub urls: Vec<String>,
}

impl RuntimeDescriptor {
    /// The image's archive filename (`<image_name>.zip`).
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.image_name)
    }

    /// The URL the packager itself fetches the image from: the first of
    /// the ordered source list. The full list still goes into the version
    /// manifest for the grid's own fetch.
    pub fn primary_url(&self) -> &str {
        self.urls.first().map_or("", String::as_str)
    }
}

/// Immutable platform table consulted by every pipeline stage.
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    runtimes: BTreeMap<PlatformId, RuntimeDescriptor>,
}

impl PlatformCatalog {
    /// The built-in catalog covering every default platform.
    pub fn builtin() -> Self {
        let images = [
            ("x86_64-apple-darwin", "openjdk-1.7.0-u80-unofficial-macosx-x86_64-image"),
            ("windows_x86_64", "openjdk-1.7.0-u80-unofficial-windows-amd64-image"),
            ("windows_intelx86", "openjdk-1.7.0-u80-unofficial-windows-i586-image"),
            ("i686-pc-linux-gnu", "openjdk-1.7.0-u80-unofficial-linux-i586-image"),
            ("x86_64-pc-linux-gnu", "openjdk-1.7.0-u80-unofficial-linux-amd64-image"),
        ];

        let runtimes = images
            .into_iter()
            .map(|(platform, image)| {
                (
                    PlatformId::from(platform),
                    RuntimeDescriptor {
                        logical_name: RUNTIME_IMAGE_LOGICAL_NAME,
                        image_name: image.to_string(),
                        urls: vec![format!("{RUNTIME_IMAGE_BASE_URL}{image}.zip")],
                    },
                )
            })
            .collect();

        Self { runtimes }
    }

    /// All platforms the catalog covers, which is also the default set.
    pub fn default_platforms(&self) -> impl Iterator<Item = &PlatformId> {
        self.runtimes.keys()
    }

    /// Look up the runtime descriptor for a platform.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownPlatform`] for ids outside the
    /// built-in table.
    pub fn descriptor_for(&self, platform: &PlatformId) -> Result<&RuntimeDescriptor, PackageError> {
        self.runtimes
            .get(platform)
            .ok_or_else(|| PackageError::UnknownPlatform(platform.clone()))
    }

    /// Resolve the effective platform set: every default platform unless
    /// explicitly disabled in `overrides`, plus every override id marked
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnknownPlatform`] if an enabled override is
    /// outside the catalog, and [`PackageError::EmptyPlatformSet`] if
    /// nothing remains enabled.
    pub fn effective_platforms(
        &self,
        overrides: &BTreeMap<PlatformId, bool>,
    ) -> Result<BTreeSet<PlatformId>, PackageError> {
        let mut platforms = BTreeSet::new();

        for (platform, enabled) in overrides {
            if *enabled {
                // Fail on a catalog miss before any I/O has happened.
                self.descriptor_for(platform)?;
                platforms.insert(platform.clone());
            }
        }

        for platform in self.runtimes.keys() {
            if overrides.get(platform).copied().unwrap_or(true) {
                platforms.insert(platform.clone());
            }
        }

        if platforms.is_empty() {
            return Err(PackageError::EmptyPlatformSet);
        }
        Ok(platforms)
    }

    /// Default wrapper version for a platform. Windows builds lag behind
    /// the other platforms, so they resolve to their own release number.
    pub fn wrapper_version(&self, platform: &PlatformId) -> &'static str {
        if platform.is_windows() {
            WINDOWS_WRAPPER_VERSION
        } else {
            DEFAULT_WRAPPER_VERSION
        }
    }

    /// Unsuffixed wrapper name, e.g. `wrapper_26014_x86_64-pc-linux-gnu`.
    /// This is both the archive basename and the extracted executable's
    /// versioned name.
    pub fn wrapper_name(&self, platform: &PlatformId, version: &str) -> String {
        format!("wrapper_{version}_{platform}")
    }

    /// Default download URL for a platform's wrapper archive.
    pub fn wrapper_url(&self, platform: &PlatformId, version: &str) -> String {
        format!("{WRAPPER_BASE_URL}{}.zip", self.wrapper_name(platform, version))
    }

    /// Logical name of the runtime launcher (`mjava`, `mjava.exe` on
    /// Windows). This is what the archive contains and what the job
    /// descriptor launches.
    pub fn launcher_logical_name(&self, platform: &PlatformId) -> String {
        format!("mjava{}", platform.exe_suffix())
    }

    /// Version-qualified physical name of the runtime launcher.
    pub fn launcher_physical_name(&self, platform: &PlatformId) -> String {
        format!("mjava_{LAUNCHER_VERSION}_{platform}{}", platform.exe_suffix())
    }

    /// Archive filename of a platform's launcher build.
    pub fn launcher_archive_name(&self, platform: &PlatformId) -> String {
        format!("mjava_{platform}.zip")
    }

    /// Download URL for a platform's launcher archive.
    pub fn launcher_url(&self, platform: &PlatformId) -> String {
        format!(
            "{LAUNCHER_BASE_URL}{LAUNCHER_VERSION}/{}",
            self.launcher_archive_name(platform)
        )
    }

    /// Runtime flags prepended to the launcher command line for a platform.
    /// Currently none for any platform.
    pub fn launcher_options(&self, _platform: &PlatformId) -> String {
        String::new()
    }
}
