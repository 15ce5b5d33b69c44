//! Archive installation: extraction into a platform directory and
//! physical-name rewriting of extracted executables.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PackageError;

/// Extract every entry of `archive` into `out_dir`, preserving relative
/// paths. Runs the zip work on a blocking thread.
///
/// # Errors
///
/// Returns [`PackageError::Extraction`] on a corrupt archive, unsupported
/// format, or write failure. Fatal for the enclosing platform's packaging.
pub async fn install_archive(archive: &Path, out_dir: &Path) -> Result<(), PackageError> {
    info!(archive = %archive.display(), "extracting archive");

    let archive_path = archive.to_path_buf();
    let out_path = out_dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive_path)?;
        let mut zip = zip::ZipArchive::new(file)?;
        zip.extract(&out_path)?;
        Ok::<(), zip::result::ZipError>(())
    })
    .await
    .map_err(std::io::Error::other)?;

    result.map_err(|source| PackageError::Extraction {
        archive: archive.to_path_buf(),
        source,
    })
}

/// Move the extracted file at `logical_name` to its version-qualified
/// `physical_name` within `dir` and mark it executable for everyone.
///
/// # Errors
///
/// Returns [`PackageError::MissingExtractedFile`] if the logical file was
/// not present after extraction, which signals a catalog/archive version
/// mismatch.
pub async fn rewrite_physical_name(
    dir: &Path,
    logical_name: &str,
    physical_name: &str,
) -> Result<PathBuf, PackageError> {
    let src = dir.join(logical_name);
    if !src.exists() {
        return Err(PackageError::MissingExtractedFile {
            logical_name: logical_name.to_string(),
            dir: dir.to_path_buf(),
        });
    }

    let dest = dir.join(physical_name);
    tokio::fs::rename(&src, &dest).await?;
    set_executable(&dest).await?;
    Ok(dest)
}

/// Set owner+others executable permissions (no-op on non-Unix hosts).
pub async fn set_executable(path: &Path) -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(path, perms).await?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
