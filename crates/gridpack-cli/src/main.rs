//! `gridpack` - BOINC bundle packager for grid applications.
//!
//! Assembles per-platform distributable bundles: runtime image, task
//! wrapper, launcher, and the application uberjar, plus the XML
//! descriptors the grid's scheduler consumes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gridpack_core::bundle::clean_output_root;
use gridpack_core::io::fetch::HttpFetcher;
use gridpack_core::script::AssimilatorSpec;
use gridpack_core::{PackageConfig, Packager, PlatformCatalog, PlatformId};

#[derive(Parser)]
#[command(name = "gridpack")]
#[command(about = "Assemble BOINC distributable bundles for a grid application", long_about = None)]
struct Cli {
    /// Optional gridpack.toml seeding the configuration; flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the bundle tree under the output root
    Package {
        /// Application uberjar to bundle
        #[arg(long)]
        uberjar: Option<PathBuf>,
        /// Main class of the bundled application
        #[arg(long)]
        main_class: Option<String>,
        /// Enable a platform on top of the defaults
        #[arg(long = "enable-platform")]
        enable: Vec<String>,
        /// Disable a default platform
        #[arg(long = "disable-platform")]
        disable: Vec<String>,
        /// Explicit version key (random if omitted)
        #[arg(long)]
        version_key: Option<String>,
        /// Output root for the bundle tree
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Cache directory for downloaded archives
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Directory copied verbatim into the bundle as templates/
        #[arg(long)]
        templates_dir: Option<PathBuf>,
        /// Custom assimilator class (enables the script assimilator stage)
        #[arg(long)]
        assimilator_class: Option<String>,
        /// JVM option passed to the assimilator script (repeatable)
        #[arg(long = "assimilator-jvm-opt")]
        assimilator_jvm_opts: Vec<String>,
        /// Wrapper version override for all platforms
        #[arg(long)]
        wrapper_version: Option<String>,
        /// Wrapper URL override, as platform=url (repeatable)
        #[arg(long = "wrapper-url")]
        wrapper_urls: Vec<String>,
        /// Download timeout in seconds
        #[arg(long)]
        fetch_timeout_secs: Option<u64>,
    },
    /// Remove the output root (or just its derived, non-zip files)
    Clean {
        /// Keep previously downloaded .zip archives in place
        #[arg(long)]
        keep_archives: bool,
        /// Output root to clean
        #[arg(long, default_value = "boinc")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package {
            uberjar,
            main_class,
            enable,
            disable,
            version_key,
            output_dir,
            cache_dir,
            templates_dir,
            assimilator_class,
            assimilator_jvm_opts,
            wrapper_version,
            wrapper_urls,
            fetch_timeout_secs,
        } => {
            let mut config = match (&cli.config, &uberjar) {
                (Some(path), _) => PackageConfig::load(path).await?,
                (None, Some(jar)) => PackageConfig::for_uberjar(jar),
                (None, None) => bail!("either --config or --uberjar is required"),
            };

            if let Some(jar) = uberjar {
                config.uberjar = jar;
            }
            if main_class.is_some() {
                config.main_class = main_class;
            }
            for platform in enable {
                config.platforms.insert(PlatformId::new(platform), true);
            }
            for platform in disable {
                config.platforms.insert(PlatformId::new(platform), false);
            }
            if version_key.is_some() {
                config.version_key = version_key;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }
            if templates_dir.is_some() {
                config.templates_dir = templates_dir;
            }
            if let Some(class) = assimilator_class {
                config.assimilator = Some(AssimilatorSpec {
                    class,
                    jvm_opts: assimilator_jvm_opts,
                    template: None,
                });
            }
            if wrapper_version.is_some() {
                config.wrapper_version = wrapper_version;
            }
            for entry in wrapper_urls {
                let (platform, url) = entry
                    .split_once('=')
                    .with_context(|| format!("expected platform=url, got '{entry}'"))?;
                config
                    .wrapper_urls
                    .insert(PlatformId::new(platform), url.to_string());
            }
            if fetch_timeout_secs.is_some() {
                config.fetch_timeout_secs = fetch_timeout_secs;
            }

            let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
            let packager = Packager::new(PlatformCatalog::builtin(), config, fetcher);

            let platforms = packager.package().await?;
            println!(
                "packaged {} platform(s) with version key {}",
                platforms.len(),
                packager.version_key()
            );
            Ok(())
        }
        Commands::Clean {
            keep_archives,
            output_dir,
        } => {
            clean_output_root(&output_dir, keep_archives).await?;
            println!("cleaned {}", output_dir.display());
            Ok(())
        }
    }
}
