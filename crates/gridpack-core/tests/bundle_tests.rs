//! End-to-end packaging runs against an in-memory fetcher.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gridpack_core::config::PackageConfig;
use gridpack_core::error::PackageError;
use gridpack_core::io::fetch::{ArchiveFetcher, FetchError};
use gridpack_core::script::AssimilatorSpec;
use gridpack_core::{Packager, PlatformCatalog, PlatformId};

/// Serves canned bytes per URL and counts how often each URL is hit.
struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    fn new(responses: HashMap<String, Vec<u8>>) -> Self {
        Self {
            responses,
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hits_for(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        match self.responses.get(url) {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            None => Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no fake response for {url}"),
            ))),
        }
    }
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut buf);
    for (name, contents) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
    buf.into_inner()
}

/// Register wrapper, launcher, and runtime image responses for a platform.
fn register_platform(catalog: &PlatformCatalog, platform: &str, into: &mut HashMap<String, Vec<u8>>) {
    let platform = PlatformId::from(platform);
    let version = catalog.wrapper_version(&platform);
    let wrapper_file = format!(
        "{}{}",
        catalog.wrapper_name(&platform, version),
        platform.exe_suffix()
    );
    into.insert(
        catalog.wrapper_url(&platform, version),
        zip_bytes(&[(wrapper_file.as_str(), b"wrapper-binary")]),
    );

    let launcher_logical = catalog.launcher_logical_name(&platform);
    into.insert(
        catalog.launcher_url(&platform),
        zip_bytes(&[(launcher_logical.as_str(), b"launcher-binary")]),
    );

    let descriptor = catalog.descriptor_for(&platform).unwrap();
    into.insert(descriptor.primary_url().to_string(), b"runtime-image".to_vec());
}

struct Scenario {
    _workspace: tempfile::TempDir,
    fetcher: Arc<FakeFetcher>,
    packager: Packager,
    out: PathBuf,
}

/// A run restricted to `platforms`, with version key `v1` and the standard
/// fake artifact set.
fn scenario(platforms: &[&str], tweak: impl FnOnce(&mut PackageConfig)) -> Scenario {
    let workspace = tempfile::tempdir().unwrap();
    let catalog = PlatformCatalog::builtin();

    let uberjar = workspace.path().join("app.jar");
    std::fs::write(&uberjar, b"jar-bytes").unwrap();

    let mut responses = HashMap::new();
    for platform in platforms {
        register_platform(&catalog, platform, &mut responses);
    }
    let fetcher = Arc::new(FakeFetcher::new(responses));

    let mut config = PackageConfig::for_uberjar(&uberjar);
    config.version_key = Some("v1".to_string());
    config.output_dir = workspace.path().join("boinc");
    config.cache_dir = workspace.path().join("cache");
    config.platforms = catalog
        .default_platforms()
        .map(|p| (p.clone(), platforms.contains(&p.as_str())))
        .collect::<BTreeMap<_, _>>();
    tweak(&mut config);

    let out = config.output_dir.clone();
    let packager = Packager::new(catalog, config, fetcher.clone());
    Scenario {
        _workspace: workspace,
        fetcher,
        packager,
        out,
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

#[tokio::test]
async fn linux_end_to_end() {
    let s = scenario(&["x86_64-pc-linux-gnu"], |_| {});
    let packaged = s.packager.package().await.unwrap();
    assert_eq!(packaged.len(), 1);

    let platform_dir = s.out.join("app/x86_64-pc-linux-gnu");
    assert!(platform_dir.join("app_v1.jar").exists());
    assert!(platform_dir.join("wrapper_26014_x86_64-pc-linux-gnu").exists());
    assert!(platform_dir.join("mjava_v0.5_x86_64-pc-linux-gnu").exists());
    assert!(
        platform_dir
            .join("openjdk-1.7.0-u80-unofficial-linux-amd64-image.zip")
            .exists()
    );

    let job = read(&platform_dir.join("job_x86_64-pc-linux-gnu_v1.xml"));
    assert!(job.contains("<application>mjava</application>"));
    assert!(job.contains("<command_line>-jar app.jar</command_line>"));

    let version = read(&platform_dir.join("version.xml"));
    // Exactly one main_program entry: the wrapper.
    assert_eq!(version.matches("<main_program/>").count(), 1);
    assert!(version.contains("<physical_name>wrapper_26014_x86_64-pc-linux-gnu</physical_name>"));
    // Inline artifacts are copy_file entries with logical names.
    assert!(version.contains("<logical_name>app.jar</logical_name>"));
    assert!(version.contains("<logical_name>mjava</logical_name>"));
    assert!(version.contains("<logical_name>job.xml</logical_name>"));
    // The runtime image is grid-fetched: url entry, no rename.
    assert!(version.contains(
        "<url>https://s3.amazonaws.com/boinc4j/openjdk-1.7.0-u80-unofficial-linux-amd64-image.zip</url>"
    ));
    assert!(version.contains("<logical_name>jdk.zip</logical_name>"));

    // Without an assimilator the daemon list uses the grid's sample.
    let daemons = read(&s.out.join("daemons.xml"));
    assert!(daemons.contains("<cmd>sample_assimilator -d 2 --app ${HEROKU_APP_NAME}</cmd>"));
    assert!(!s.out.join("bin/java_assimilator").exists());
}

#[tokio::test]
async fn windows_names_carry_exe_suffix() {
    let s = scenario(&["windows_x86_64"], |_| {});
    s.packager.package().await.unwrap();

    let platform_dir = s.out.join("app/windows_x86_64");
    // The Windows wrapper default is a release distinct from the others.
    assert!(platform_dir.join("wrapper_26016_windows_x86_64.exe").exists());
    assert!(platform_dir.join("mjava_v0.5_windows_x86_64.exe").exists());

    let job = read(&platform_dir.join("job_windows_x86_64_v1.xml"));
    assert!(job.contains("<application>mjava.exe</application>"));

    let version = read(&platform_dir.join("version.xml"));
    assert!(version.contains("<logical_name>mjava.exe</logical_name>"));
}

#[tokio::test]
async fn every_platform_gets_a_directory_with_both_manifests() {
    let all = [
        "i686-pc-linux-gnu",
        "windows_intelx86",
        "windows_x86_64",
        "x86_64-apple-darwin",
        "x86_64-pc-linux-gnu",
    ];
    let s = scenario(&all, |_| {});
    let packaged = s.packager.package().await.unwrap();
    assert_eq!(packaged.len(), all.len());

    for platform in all {
        let dir = s.out.join("app").join(platform);
        assert!(dir.join("version.xml").exists(), "missing version.xml for {platform}");
        assert!(
            dir.join(format!("job_{platform}_v1.xml")).exists(),
            "missing job descriptor for {platform}"
        );
    }
}

#[tokio::test]
async fn job_and_version_manifests_agree_on_the_application() {
    let s = scenario(&["x86_64-apple-darwin"], |_| {});
    s.packager.package().await.unwrap();

    let dir = s.out.join("app/x86_64-apple-darwin");
    let job = read(&dir.join("job_x86_64-apple-darwin_v1.xml"));
    let version = read(&dir.join("version.xml"));

    let application = job
        .split("<application>")
        .nth(1)
        .and_then(|rest| rest.split("</application>").next())
        .unwrap();
    assert!(version.contains(&format!("<logical_name>{application}</logical_name>")));
}

#[tokio::test]
async fn rerun_is_deterministic_and_keeps_cached_archives() {
    let s = scenario(&["x86_64-pc-linux-gnu"], |_| {});
    s.packager.package().await.unwrap();

    let platform_dir = s.out.join("app/x86_64-pc-linux-gnu");
    let job_path = platform_dir.join("job_x86_64-pc-linux-gnu_v1.xml");
    let version_path = platform_dir.join("version.xml");
    let first_job = read(&job_path);
    let first_version = read(&version_path);

    s.packager.package().await.unwrap();

    // Derived XML regenerates byte-identically under a fixed version key.
    assert_eq!(read(&job_path), first_job);
    assert_eq!(read(&version_path), first_version);

    // The rerun's cleaning stage preserved every .zip, so each archive was
    // fetched exactly once across both runs.
    let catalog = PlatformCatalog::builtin();
    let platform = PlatformId::from("x86_64-pc-linux-gnu");
    let descriptor = catalog.descriptor_for(&platform).unwrap();
    assert_eq!(s.fetcher.hits_for(descriptor.primary_url()), 1);
    assert_eq!(s.fetcher.hits_for(&catalog.launcher_url(&platform)), 1);
    assert_eq!(
        s.fetcher
            .hits_for(&catalog.wrapper_url(&platform, catalog.wrapper_version(&platform))),
        1
    );
}

#[tokio::test]
async fn assimilator_branch_materializes_script_and_daemon() {
    let s = scenario(&["x86_64-pc-linux-gnu"], |config| {
        config.assimilator = Some(AssimilatorSpec {
            class: "org.example.GridAssimilator".to_string(),
            jvm_opts: vec!["-Xmx512m".to_string()],
            template: None,
        });
    });
    s.packager.package().await.unwrap();

    let script = read(&s.out.join("bin/java_assimilator"));
    assert!(script.contains("org.example.GridAssimilator"));
    assert!(script.contains("app_v1.jar"));
    assert!(script.contains("-Xmx512m"));

    let daemons = read(&s.out.join("daemons.xml"));
    assert!(daemons.contains(
        "<cmd>script_assimilator --script java_assimilator -d 2 --app ${HEROKU_APP_NAME}</cmd>"
    ));
    assert!(!daemons.contains("<cmd>sample_assimilator"));
}

#[tokio::test]
async fn templates_directory_is_copied_verbatim() {
    let s = scenario(&["x86_64-pc-linux-gnu"], |config| {
        let src = config.uberjar.parent().unwrap().join("tmpl");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("wu_template.xml"), b"<input/>").unwrap();
        config.templates_dir = Some(src);
    });
    s.packager.package().await.unwrap();

    assert_eq!(
        std::fs::read(s.out.join("templates/wu_template.xml")).unwrap(),
        b"<input/>"
    );
}

#[tokio::test]
async fn wrapper_archive_mismatch_aborts_the_run() {
    let workspace = tempfile::tempdir().unwrap();
    let catalog = PlatformCatalog::builtin();
    let platform = PlatformId::from("x86_64-pc-linux-gnu");

    let uberjar = workspace.path().join("app.jar");
    std::fs::write(&uberjar, b"jar-bytes").unwrap();

    // Serve a wrapper archive whose contents don't match the expected
    // versioned executable name.
    let stale_url = "https://mirror.example.org/stale-wrapper.zip";
    let mut responses = HashMap::new();
    register_platform(&catalog, platform.as_str(), &mut responses);
    responses.insert(
        stale_url.to_string(),
        zip_bytes(&[("wrapper_25000_x86_64-pc-linux-gnu", b"old")]),
    );

    let mut config = PackageConfig::for_uberjar(&uberjar);
    config.version_key = Some("v1".to_string());
    config.output_dir = workspace.path().join("boinc");
    config.cache_dir = workspace.path().join("cache");
    config.platforms = catalog
        .default_platforms()
        .map(|p| (p.clone(), p == &platform))
        .collect();
    config
        .wrapper_urls
        .insert(platform.clone(), stale_url.to_string());

    let packager = Packager::new(catalog, config, Arc::new(FakeFetcher::new(responses)));
    let err = packager.package().await.unwrap_err();
    assert!(matches!(err, PackageError::MissingExtractedFile { .. }));
}
