//! # patchmeta CLI
//!
//! Reads an Oracle combo patch archive and prints the metadata the
//! deployment toolkit's patch registry needs, or checks the registry
//! against locally downloaded archives.
//!
//! ## Usage
//!
//! ```bash
//! patchmeta --config ./config/patchmeta.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `patchmeta inspect <zip>` | List component subdirectories and their documentation |
//! | `patchmeta parse <zip>` | Full report plus registry snippets (or `--json`) |
//! | `patchmeta hash <zip>` | Base64 MD5 of the archive |
//! | `patchmeta validate` | Re-derive every combo in the registry and compare |
//! | `patchmeta opatch --base <release> <url>...` | Pick the OPatch download for a release |

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use patchmeta::harness::{self, CaseOutcome};
use patchmeta::models::Inspection;
use patchmeta::progress::ProgressMode;
use patchmeta::{archive, config, emit, opatch};

/// patchmeta: derive patch registry metadata from Oracle combo RU archives.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "patchmeta",
    about = "Derive patch registry metadata from Oracle combo Release Update archives",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/patchmeta.toml")]
    config: PathBuf,

    /// Verbose logging (same as `RUST_LOG=debug`).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the component subdirectories found in an archive.
    Inspect {
        archive: PathBuf,

        /// Top-level patch directory, when it differs from the file name.
        #[arg(long)]
        patch: Option<String>,
    },

    /// Resolve an archive and print the report and registry snippets.
    Parse {
        archive: PathBuf,

        #[arg(long)]
        patch: Option<String>,

        /// Print JSON instead of the human report.
        #[arg(long)]
        json: bool,

        /// OPatch file name for the "files to copy" line.
        ///
        /// Defaults to the expected name for the resolved base release.
        #[arg(long)]
        opatch_file: Option<String>,

        /// Patch number of the OPatch utility.
        #[arg(long, default_value_t = opatch::OPATCH_PATCHNUM)]
        opatch_patch: u32,
    },

    /// Print the base64-encoded MD5 of an archive.
    Hash { archive: PathBuf },

    /// Check every combo archive in the registry against what is derived.
    ///
    /// Archives not found under the archive directory are skipped.
    Validate {
        /// Overrides `[harness].archive_dir`.
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Pick the OPatch download URL for a base release.
    Opatch {
        /// Base release, e.g. `19.3.0.0.0`.
        #[arg(long)]
        base: String,

        #[arg(long, default_value_t = opatch::OPATCH_PATCHNUM)]
        patchnum: u32,

        /// Candidate download URLs.
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = if debug {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_inspection(inspection: &Inspection) {
    println!("Archive:  {}", inspection.archive_path.display());
    println!("Patch:    {}", inspection.patch_number);
    println!("Abstract: {}", inspection.abstract_text());
    if let Some(release) = inspection
        .patch_search
        .as_ref()
        .and_then(|p| p.release_name.as_deref())
    {
        println!("Release:  {}", release);
    }
    println!("Components:");
    for c in &inspection.candidates {
        let docs = c.documentation.as_ref().map_or(0, |d| d.len());
        let manifest = c.manifest.as_ref().map_or(0, |m| m.len());
        println!(
            "  /{:<12} readme: {:>7} bytes  manifest: {:>7} bytes",
            c.id, docs, manifest
        );
    }
    for w in &inspection.warnings {
        println!("WARNING: {}", w);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Inspect {
            archive: path,
            patch,
        } => {
            let inspection = archive::inspect(&path, patch.as_deref())?;
            print_inspection(&inspection);
        }
        Commands::Parse {
            archive: path,
            patch,
            json,
            opatch_file,
            opatch_patch,
        } => {
            let resolution = patchmeta::resolve(&path, patch.as_deref())?;
            if json {
                println!("{}", emit::render_json(&resolution)?);
            } else {
                let opatch_file = opatch_file.unwrap_or_else(|| {
                    opatch::expected_file_name(
                        opatch_patch,
                        &resolution.record.base_release,
                        &cfg.emit.platform,
                    )
                });
                print!("{}", emit::render_report(&resolution));
                println!();
                print!("{}", emit::render_snippets(&resolution, &opatch_file));
            }
        }
        Commands::Hash { archive: path } => {
            let hash = archive::content_hash(&path)?;
            println!("{}", hash);
        }
        Commands::Validate {
            archive_dir,
            progress,
            json,
        } => {
            let mode = progress.map_or_else(ProgressMode::default_for_tty, ProgressMode::from);
            let reporter = mode.reporter();
            let report = harness::run_harness(&cfg, archive_dir.as_deref(), reporter.as_ref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for result in &report.results {
                    println!("{:<5} {}", result.outcome.status(), result.patchfile);
                    match &result.outcome {
                        CaseOutcome::Mismatch(diffs) => {
                            for d in diffs {
                                println!("      {}", d);
                            }
                        }
                        CaseOutcome::Skipped(reason) | CaseOutcome::Failed(reason) => {
                            println!("      {}", reason);
                        }
                        CaseOutcome::Passed => {}
                    }
                }
                for excluded in &report.excluded {
                    info!("excluded {}: {}", excluded.patchfile, excluded.reason);
                }
                println!("{}", report.summary());
            }

            if !report.is_success() {
                bail!(
                    "validation failed: {} mismatched, {} errors",
                    report.mismatched(),
                    report.failed()
                );
            }
        }
        Commands::Opatch {
            base,
            patchnum,
            urls,
        } => {
            let url = opatch::select_download_url(&urls, patchnum, &base, &cfg.emit.platform)
                .with_context(|| {
                    format!(
                        "no OPatch download for release {} on {}",
                        base, cfg.emit.platform
                    )
                })?;
            let file = opatch::file_name_from_url(url)
                .unwrap_or_else(|| opatch::expected_file_name(patchnum, &base, &cfg.emit.platform));
            println!("{}", file);
            println!("{}", url);
        }
    }

    Ok(())
}
