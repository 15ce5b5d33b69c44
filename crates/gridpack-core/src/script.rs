//! Assimilator wrapper script materialization.
//!
//! When a custom assimilator class is configured, the daemon list points
//! at a generated shell script. The script is rendered from a template by
//! substituting the uberjar's physical filename, a JVM options string, and
//! the assimilator class name.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PackageError;
use crate::io::archive::set_executable;
use crate::manifest::ASSIMILATOR_SCRIPT_NAME;

/// Template shipped with the crate, used unless the caller configures an
/// override path.
const DEFAULT_TEMPLATE: &str = include_str!("../assets/java_assimilator.sh");

/// Configuration of the custom assimilator stage.
#[derive(Debug, Clone, Deserialize)]
pub struct AssimilatorSpec {
    /// Fully qualified class name invoked per completed workunit.
    pub class: String,
    /// JVM options substituted into the script, joined with spaces.
    #[serde(default)]
    pub jvm_opts: Vec<String>,
    /// Optional template override. Missing file is a configuration defect.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Render the assimilator script into `bin_dir` and mark it executable.
///
/// # Errors
///
/// [`PackageError::TemplateMissing`] if a configured template override
/// cannot be read, [`PackageError::ScriptWrite`] on write failure. Both
/// abort the whole packaging run: the daemon list cannot reference a
/// script that does not exist.
pub async fn materialize_script(
    bin_dir: &Path,
    uberjar_physical_name: &str,
    spec: &AssimilatorSpec,
) -> Result<PathBuf, PackageError> {
    let template = match &spec.template {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|_| PackageError::TemplateMissing(path.clone()))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let rendered = template
        .replace("%uberjar_name%", uberjar_physical_name)
        .replace("%java_opts%", &spec.jvm_opts.join(" "))
        .replace("%assimilator_class%", &spec.class);

    let path = bin_dir.join(ASSIMILATOR_SCRIPT_NAME);
    let write = async {
        tokio::fs::write(&path, rendered).await?;
        set_executable(&path).await
    };
    write.await.map_err(|source| PackageError::ScriptWrite {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn substitutes_all_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let spec = AssimilatorSpec {
            class: "org.example.GridAssimilator".to_string(),
            jvm_opts: vec!["-Xmx512m".to_string()],
            template: None,
        };

        let path = materialize_script(dir.path(), "app_v1.jar", &spec)
            .await
            .unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert_eq!(path.file_name().unwrap(), "java_assimilator");
        assert!(script.contains("-cp app_v1.jar org.example.GridAssimilator"));
        assert!(script.contains("-Xmx512m"));
        assert!(!script.contains('%'));
    }

    #[tokio::test]
    async fn missing_template_override_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let spec = AssimilatorSpec {
            class: "org.example.GridAssimilator".to_string(),
            jvm_opts: Vec::new(),
            template: Some(dir.path().join("no-such-template.sh")),
        };

        let err = materialize_script(dir.path(), "app_v1.jar", &spec)
            .await
            .unwrap_err();
        assert!(matches!(err, PackageError::TemplateMissing(_)));
    }

    #[tokio::test]
    async fn custom_template_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("custom.sh");
        std::fs::write(&template, "run %assimilator_class% against %uberjar_name%\n").unwrap();

        let spec = AssimilatorSpec {
            class: "A".to_string(),
            jvm_opts: Vec::new(),
            template: Some(template),
        };

        let path = materialize_script(dir.path(), "jar_v2.jar", &spec)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "run A against jar_v2.jar\n"
        );
    }
}
