//! Descriptor document builders: job descriptor, version manifest, and
//! daemon list.
//!
//! Each document is an immutable [`Element`] tree with construction-order
//! element ordering, so regenerating a platform under a fixed version key
//! yields byte-identical XML.

use std::path::Path;

use crate::error::PackageError;
use crate::types::{ArtifactFile, InstallKind};
use crate::xml::Element;

/// Script filename the daemon list references when a custom assimilator
/// is configured.
pub const ASSIMILATOR_SCRIPT_NAME: &str = "java_assimilator";

/// Build one platform's job descriptor.
///
/// `application` is the launcher's logical name; the command line prepends
/// the platform's runtime flags to the literal `-jar <uberjar>` tokens,
/// where `uberjar` is the jar's logical (unversioned) filename.
pub fn job_descriptor(application: &str, launcher_options: &str, uberjar_name: &str) -> Element {
    Element::new("job_desc").child(
        Element::new("task")
            .child(Element::text("application", application))
            .child(Element::text(
                "command_line",
                format!("{launcher_options}-jar {uberjar_name}"),
            ))
            .child(Element::new("append_cmdline_args")),
    )
}

/// Build one platform's version manifest from its installed artifacts, in
/// the order they were installed.
///
/// Exactly one entry must be the [`InstallKind::MainProgram`]; the
/// orchestrator constructs the artifact list that way, and a violation
/// here is an internal invariant failure rather than a user error.
pub fn version_manifest(files: &[ArtifactFile]) -> Element {
    debug_assert_eq!(
        files
            .iter()
            .filter(|f| f.kind == InstallKind::MainProgram)
            .count(),
        1,
        "a version manifest needs exactly one main_program entry"
    );

    Element::new("version").children(files.iter().map(file_entry))
}

fn file_entry(file: &ArtifactFile) -> Element {
    let entry = Element::new("file").child(Element::text("physical_name", file.physical_name()));

    match &file.kind {
        InstallKind::CopiedFromSource => entry
            .child(Element::new("copy_file"))
            .child(Element::text("logical_name", &file.logical_name)),
        InstallKind::DownloadedByUrl(urls) => entry
            .children(urls.iter().map(|url| Element::text("url", url)))
            .child(Element::text("logical_name", &file.logical_name)),
        InstallKind::MainProgram => entry
            .child(Element::new("copy_file"))
            .child(Element::new("main_program")),
    }
}

/// Build the project-wide daemon list.
///
/// The assimilator stage is the pipeline's only conditional branch with
/// externally visible structure: with a custom assimilator configured the
/// list invokes the generated wrapper script, otherwise the grid's sample
/// assimilator. `${HEROKU_APP_NAME}` is left for the grid's shell to
/// expand.
pub fn daemon_list(script_assimilator: bool) -> Element {
    let assimilator_cmd = if script_assimilator {
        format!("script_assimilator --script {ASSIMILATOR_SCRIPT_NAME} -d 2 --app ${{HEROKU_APP_NAME}}")
    } else {
        "sample_assimilator -d 2 --app ${HEROKU_APP_NAME}".to_string()
    };

    Element::new("daemons")
        .child(daemon("feeder -d 3"))
        .child(daemon("transitioner -d 3"))
        .child(daemon(
            "file_deleter -d 2 --preserve_wu_files --preserve_result_files",
        ))
        .child(daemon("sample_trivial_validator -d 2 --app ${HEROKU_APP_NAME}"))
        .child(daemon(&assimilator_cmd))
}

fn daemon(cmd: &str) -> Element {
    Element::new("daemon").child(Element::text("cmd", cmd))
}

/// Serialize a descriptor document to `path`.
///
/// # Errors
///
/// Returns [`PackageError::ManifestWrite`] if the file cannot be written.
pub async fn write_document(path: &Path, document: &Element) -> Result<(), PackageError> {
    tokio::fs::write(path, document.render())
        .await
        .map_err(|source| PackageError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        })
}
