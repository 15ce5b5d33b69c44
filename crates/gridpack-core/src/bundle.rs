//! Top-level packaging orchestrator.
//!
//! Drives the run through its stages: clean the output root, initialize
//! the bundle skeleton and global daemon list, then assemble every
//! platform's artifact set and manifests. Per-platform work is
//! embarrassingly parallel and runs concurrently; the shared archive
//! cache coalesces duplicate downloads. Any platform failure aborts the
//! whole run.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::catalog::PlatformCatalog;
use crate::config::PackageConfig;
use crate::error::PackageError;
use crate::io::archive;
use crate::io::fetch::{ArchiveFetcher, ArtifactCache};
use crate::manifest;
use crate::script;
use crate::types::{ArtifactFile, InstallKind, PlatformId, VersionKey};

/// Remove `root` entirely, or in keep-archives mode every non-`.zip`
/// file under it while leaving the directory structure in place.
///
/// # Errors
///
/// Propagates filesystem failures as [`PackageError::Io`].
pub async fn clean_output_root(root: &Path, keep_archives: bool) -> Result<(), PackageError> {
    if !root.exists() {
        return Ok(());
    }

    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if keep_archives {
            for entry in walkdir::WalkDir::new(&root) {
                let entry = entry.map_err(std::io::Error::other)?;
                let is_zip = entry.path().extension().and_then(|e| e.to_str()) == Some("zip");
                if entry.file_type().is_file() && !is_zip {
                    std::fs::remove_file(entry.path())?;
                }
            }
        } else {
            std::fs::remove_dir_all(&root)?;
        }
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

/// One packaging invocation: catalog, configuration, cache, and the
/// version key that stamps every physical filename.
#[derive(Debug)]
pub struct Packager {
    catalog: PlatformCatalog,
    config: PackageConfig,
    cache: ArtifactCache,
    key: VersionKey,
}

impl Packager {
    /// Assemble a packager. The version key is resolved here, once, so it
    /// stays stable for the lifetime of the invocation.
    pub fn new(
        catalog: PlatformCatalog,
        config: PackageConfig,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Self {
        let key = VersionKey::resolve(config.version_key.as_deref());
        let cache = ArtifactCache::new(fetcher, config.checksums.clone());
        Self {
            catalog,
            config,
            cache,
            key,
        }
    }

    /// The version key stamping this run's physical filenames.
    pub fn version_key(&self) -> &VersionKey {
        &self.key
    }

    /// Remove the output root, or in keep-archives mode every non-`.zip`
    /// file under it. Keeping the archives lets a rerun skip re-downloading
    /// runtime images while still regenerating all derived output.
    ///
    /// # Errors
    ///
    /// Propagates filesystem failures as [`PackageError::Io`].
    pub async fn clean(&self, keep_archives: bool) -> Result<(), PackageError> {
        clean_output_root(&self.config.output_dir, keep_archives).await
    }

    /// Run the whole pipeline and return the set of platforms packaged.
    ///
    /// # Errors
    ///
    /// Any failure aborts the entire run; there is no partial-success
    /// policy. The output root is left in whatever state the last
    /// completed step produced, and a rerun starts from the cleaning
    /// stage.
    pub async fn package(&self) -> Result<BTreeSet<PlatformId>, PackageError> {
        let platforms = self.catalog.effective_platforms(&self.config.platforms)?;
        info!(platforms = platforms.len(), key = %self.key, "packaging bundle");

        self.clean(true).await?;

        let root = self.config.output_dir.as_path();
        let app_dir = root.join("app");
        let bin_dir = root.join("bin");
        tokio::fs::create_dir_all(&app_dir).await?;
        tokio::fs::create_dir_all(&bin_dir).await?;
        self.copy_templates(root).await?;

        let uberjar_physical = self.config.uberjar_physical_name(&self.key);

        // Barrier: the daemon list (and assimilator script) must exist
        // before any per-platform work begins.
        if let Some(spec) = &self.config.assimilator {
            script::materialize_script(&bin_dir, &uberjar_physical, spec).await?;
        }
        manifest::write_document(
            &root.join("daemons.xml"),
            &manifest::daemon_list(self.config.assimilator.is_some()),
        )
        .await?;

        futures::future::try_join_all(
            platforms
                .iter()
                .map(|p| self.package_platform(p, &app_dir, &uberjar_physical)),
        )
        .await?;

        info!(root = %root.display(), "bundle ready");
        Ok(platforms)
    }

    /// Copy the static template directory into the output root verbatim,
    /// if one is configured and present.
    async fn copy_templates(&self, root: &Path) -> Result<(), PackageError> {
        let Some(src) = &self.config.templates_dir else {
            return Ok(());
        };
        if !src.exists() {
            return Ok(());
        }

        let src = src.clone();
        let dest = root.join("templates");
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dest)?;
            let mut options = fs_extra::dir::CopyOptions::new();
            options.content_only = true;
            options.overwrite = true;
            fs_extra::dir::copy(&src, &dest, &options).map_err(std::io::Error::other)?;
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }

    /// Assemble one platform's directory: uberjar, job descriptor, task
    /// wrapper, runtime image, launcher, and finally the version manifest
    /// describing them all.
    async fn package_platform(
        &self,
        platform: &PlatformId,
        app_dir: &Path,
        uberjar_physical: &str,
    ) -> Result<(), PackageError> {
        info!(%platform, "packaging platform");
        let platform_dir = app_dir.join(platform.as_str());
        tokio::fs::create_dir_all(&platform_dir).await?;

        let mut files: Vec<ArtifactFile> = Vec::new();

        // Uberjar, shipped inline under its version-qualified name.
        let jar_dest = platform_dir.join(uberjar_physical);
        tokio::fs::copy(&self.config.uberjar, &jar_dest).await?;
        files.push(ArtifactFile {
            logical_name: self.config.uberjar_name(),
            physical_path: jar_dest,
            kind: InstallKind::CopiedFromSource,
        });

        // Job descriptor.
        let application = self.catalog.launcher_logical_name(platform);
        let job = manifest::job_descriptor(
            &application,
            &self.catalog.launcher_options(platform),
            &self.config.uberjar_name(),
        );
        let job_path = platform_dir.join(format!("job_{platform}_{}.xml", self.key));
        manifest::write_document(&job_path, &job).await?;
        files.push(ArtifactFile {
            logical_name: "job.xml".to_string(),
            physical_path: job_path,
            kind: InstallKind::CopiedFromSource,
        });

        // Task wrapper: fetched, extracted, and verified under its
        // versioned name. This is the bundle's main program.
        let wrapper_version = self
            .config
            .wrapper_version
            .as_deref()
            .unwrap_or_else(|| self.catalog.wrapper_version(platform));
        let wrapper_name = self.catalog.wrapper_name(platform, wrapper_version);
        let wrapper_url = self
            .config
            .wrapper_urls
            .get(platform)
            .cloned()
            .unwrap_or_else(|| self.catalog.wrapper_url(platform, wrapper_version));
        let wrapper_zip = self
            .cache
            .fetch(&self.config.cache_dir, &format!("{wrapper_name}.zip"), &wrapper_url)
            .await?;
        archive::install_archive(&wrapper_zip, &platform_dir).await?;

        let wrapper_physical = format!("{wrapper_name}{}", platform.exe_suffix());
        let wrapper_path = platform_dir.join(&wrapper_physical);
        if !wrapper_path.exists() {
            return Err(PackageError::MissingExtractedFile {
                logical_name: wrapper_physical,
                dir: platform_dir,
            });
        }
        files.push(ArtifactFile {
            logical_name: "wrapper".to_string(),
            physical_path: wrapper_path,
            kind: InstallKind::MainProgram,
        });

        // Runtime image: cached directly in the platform directory under
        // its original archive name and not extracted. The grid fetches it
        // from the listed URLs itself.
        let descriptor = self.catalog.descriptor_for(platform)?;
        let image_path = self
            .cache
            .fetch(&platform_dir, &descriptor.archive_name(), descriptor.primary_url())
            .await?;
        files.push(ArtifactFile {
            logical_name: descriptor.logical_name.to_string(),
            physical_path: image_path,
            kind: InstallKind::DownloadedByUrl(descriptor.urls.clone()),
        });

        // Launcher: extracted, then renamed from its logical name to the
        // versioned physical name with the executable bit set.
        let launcher_zip = self
            .cache
            .fetch(
                &self.config.cache_dir,
                &self.catalog.launcher_archive_name(platform),
                &self.catalog.launcher_url(platform),
            )
            .await?;
        archive::install_archive(&launcher_zip, &platform_dir).await?;
        let launcher_path = archive::rewrite_physical_name(
            &platform_dir,
            &application,
            &self.catalog.launcher_physical_name(platform),
        )
        .await?;
        files.push(ArtifactFile {
            logical_name: application,
            physical_path: launcher_path,
            kind: InstallKind::CopiedFromSource,
        });

        manifest::write_document(
            &platform_dir.join("version.xml"),
            &manifest::version_manifest(&files),
        )
        .await
    }
}
