//! # varpress CLI Interface (Module)
//!
//! This module implements the full CLI interface for varpress: command
//! parsing, argument validation, and the async entrypoint shared by `main`
//! and integration tests. All non-trivial business logic (ledger, markup,
//! publishing pipeline) lives in the `varpress-core` crate; this module is
//! strictly CLI glue and wiring of the concrete Moodle clients.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use varpress_core::contract::LmsApi;
use varpress_core::ledger::{self, LedgerError};
use varpress_core::publish::{self, PublishOptions};
use varpress_core::token;

use crate::client::MoodleClient;
use crate::generate::{self, GenerateOptions, DEFAULT_MODEL};
use crate::provision::{DockerProvisioner, DEFAULT_CONTAINER};
use crate::rest::MoodleRest;
use crate::session::MoodleSession;

/// Single-line token cache, relative to the invocation directory.
pub const TOKEN_CACHE_FILE: &str = ".moodle-token";

/// CLI for varpress: adapt training modules per audience and publish them.
#[derive(Parser)]
#[clap(
    name = "varpress",
    version,
    about = "Generate audience-adapted training module variants and publish them to a Moodle LMS"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate one audience-adapted variant of a module
    Generate {
        /// Path to the module directory (must contain base.md and metadata.yaml)
        #[clap(long)]
        module: PathBuf,
        /// Target audience preset (developer | executive | champion |
        /// technical-writer) or a custom audience string
        #[clap(long)]
        audience: String,
        /// Output locale as a BCP 47 tag (e.g. es-MX, fr-FR, ja-JP)
        #[clap(long, default_value = "en-US")]
        locale: String,
        /// Output directory for generated variants and the ledger
        #[clap(long, default_value = "variants")]
        output: PathBuf,
        /// Model identifier for the completion API
        #[clap(long, default_value = DEFAULT_MODEL)]
        model: String,
    },
    /// Publish generated variants from the ledger into the LMS
    Publish {
        /// Moodle base URL
        #[clap(long, default_value = "http://localhost:8080")]
        url: String,
        /// Moodle API token (skips cache and auto-setup if provided)
        #[clap(long)]
        token: Option<String>,
        /// Moodle admin username
        #[clap(long, default_value = "admin")]
        user: String,
        /// Moodle admin password (or set MOODLE_ADMIN_PASS)
        #[clap(long)]
        password: Option<String>,
        /// Only publish variants recorded for this course id
        #[clap(long)]
        course_id: Option<String>,
        /// Path to the generation ledger
        #[clap(long, default_value = "variants/manifest.yaml")]
        ledger: PathBuf,
        /// Docker container running the LMS (first-time setup target)
        #[clap(long, default_value = DEFAULT_CONTAINER)]
        container: String,
        /// Run first-time LMS web-services setup via docker exec
        #[clap(long)]
        setup_lms: bool,
        /// Print the cached/minted token and exit
        #[clap(long)]
        get_token: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate {
            module,
            audience,
            locale,
            output,
            model,
        } => {
            if !module.is_dir() {
                bail!(
                    "module path does not exist or is not a directory: {}",
                    module.display()
                );
            }
            let manifest = output.join("manifest.yaml");
            let opts = GenerateOptions {
                module,
                audience,
                locale,
                output,
                model,
            };
            let output_file = generate::generate(&opts).await?;
            println!("\nDone.");
            println!("  Variant : {}", output_file.display());
            println!("  Ledger  : {}", manifest.display());
            Ok(())
        }
        Commands::Publish {
            url,
            token,
            user,
            password,
            course_id,
            ledger,
            container,
            setup_lms,
            get_token,
        } => {
            let url = url.trim_end_matches('/').to_string();
            let provisioner = DockerProvisioner::new(&url, &container).map_err(|e| anyhow!("{e}"))?;
            let cache_path = PathBuf::from(TOKEN_CACHE_FILE);

            if get_token {
                let resolved = token::resolve(token, &cache_path, setup_lms, &provisioner)
                    .await
                    .map_err(|e| anyhow!("{e}"))?;
                println!("{resolved}");
                return Ok(());
            }

            // Ledger first: nothing else matters when there is nothing to
            // publish, and the missing-file guidance must not require a
            // reachable LMS.
            let entries = match ledger::load(&ledger) {
                Ok(entries) => entries,
                Err(LedgerError::Missing(path)) => {
                    bail!(
                        "no ledger found at {}.\nGenerate variants first: \
                         varpress generate --module example-course/01-concept --audience developer",
                        path.display()
                    );
                }
                Err(e) => return Err(e.into()),
            };
            if entries.is_empty() {
                println!("Ledger is empty, nothing to publish.");
                return Ok(());
            }

            let entries = match &course_id {
                Some(filter) => {
                    let filtered: Vec<_> = entries
                        .into_iter()
                        .filter(|e| e.course_id.as_deref() == Some(filter.as_str()))
                        .collect();
                    if filtered.is_empty() {
                        bail!("no variants found for course_id='{filter}'");
                    }
                    filtered
                }
                None => entries,
            };

            let resolved_token = token::resolve(token, &cache_path, setup_lms, &provisioner)
                .await
                .map_err(|e| anyhow!("{e}"))?;

            let password = password
                .or_else(|| std::env::var("MOODLE_ADMIN_PASS").ok())
                .unwrap_or_default();
            let rest = MoodleRest::new(&url, &resolved_token).map_err(|e| anyhow!("{e}"))?;
            let session = MoodleSession::new(&url, &user, &password).map_err(|e| anyhow!("{e}"))?;
            let client = MoodleClient::new(rest, session);

            match client.site_info().await {
                Ok(site) => {
                    println!("Connected to Moodle: {} ({})", site.sitename, site.release)
                }
                Err(e) => {
                    bail!(
                        "token validation failed: {e}\n\
                         Try running with --setup-lms to regenerate the token."
                    );
                }
            }

            let groups = ledger::group_by_course(&entries);
            println!(
                "\nUploading {} variant(s) across {} course(s)...\n",
                entries.len(),
                groups.len()
            );

            let opts = PublishOptions::new(ledger_root_of(&ledger));
            let report = publish::publish(&client, &groups, &opts)
                .await
                .map_err(|e| anyhow!("{e}"))?;

            for course in &report.courses {
                println!(
                    "  Done. Open your course at: {url}/course/view.php?id={}",
                    course.remote_id
                );
            }
            println!("\nAll done.");
            println!("Open Moodle: {url}/my/courses.php");
            Ok(())
        }
    }
}

/// Ledger-relative paths (`output_file`, `module_path`) resolve against the
/// directory above the variants directory, i.e. the project root the
/// generation step ran from.
fn ledger_root_of(ledger_path: &Path) -> PathBuf {
    ledger_path
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
