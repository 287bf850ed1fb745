//! Validation harness.
//!
//! Replays the resolver against every combo archive recorded in the patch
//! registry and compares what it derives with what the registry says:
//! base release, patch release, and the set of component subdirectories.
//! Archives not present locally are skipped, never failed.
//!
//! ```text
//! gi_patches.yml ─┐
//!                 ├─► group_combo_cases() ─► ComboCase ─► ArchiveSource::locate()
//! rdbms_patches ──┘                                              │
//!                                                                ▼
//!                                                   resolve() ─► CaseOutcome
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::progress::{HarnessProgressEvent, HarnessProgressReporter};
use crate::registry::{self, ComboCase, SkippedFile};
use crate::resolve;

/// Where the harness finds archives named by the registry.
pub trait ArchiveSource: Send + Sync {
    /// Local path of `patchfile`, or `None` when it is not available.
    fn locate(&self, patchfile: &str) -> Result<Option<PathBuf>>;
}

/// Archives already downloaded into a local directory tree.
#[derive(Debug, Default)]
pub struct LocalDirSource {
    by_name: HashMap<String, PathBuf>,
}

impl LocalDirSource {
    /// Indexes every file under `root` matching one of `globs`, keyed by
    /// file name. A missing root gives an empty index.
    pub fn scan(root: &Path, globs: &[String]) -> Result<Self> {
        let mut by_name = HashMap::new();
        if !root.exists() {
            warn!("archive directory does not exist: {}", root.display());
            return Ok(Self { by_name });
        }
        let include = build_globset(globs)?;
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if !include.is_match(relative) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(prev) = by_name.get(&name) {
                debug!("duplicate archive {}, keeping {}", name, prev.display());
                continue;
            }
            by_name.insert(name, path.to_path_buf());
        }
        info!("indexed {} archives under {}", by_name.len(), root.display());
        Ok(Self { by_name })
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl ArchiveSource for LocalDirSource {
    fn locate(&self, patchfile: &str) -> Result<Option<PathBuf>> {
        Ok(self.by_name.get(patchfile).cloned())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid archive glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    /// One line per field that disagrees with the registry.
    Mismatch(Vec<String>),
    Skipped(String),
    /// The resolver returned an error.
    Failed(String),
}

impl CaseOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            CaseOutcome::Passed => "PASS",
            CaseOutcome::Mismatch(_) => "FAIL",
            CaseOutcome::Skipped(_) => "SKIP",
            CaseOutcome::Failed(_) => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub patchfile: String,
    pub outcome: CaseOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarnessReport {
    /// In registry order.
    pub results: Vec<CaseResult>,
    /// Registry files that never became cases.
    pub excluded: Vec<SkippedFile>,
}

impl HarnessReport {
    fn count(&self, status: &str) -> usize {
        self.results.iter().filter(|r| r.outcome.status() == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count("PASS")
    }

    pub fn mismatched(&self) -> usize {
        self.count("FAIL")
    }

    pub fn skipped(&self) -> usize {
        self.count("SKIP")
    }

    pub fn failed(&self) -> usize {
        self.count("ERROR")
    }

    /// No mismatches and no resolver errors.
    pub fn is_success(&self) -> bool {
        self.mismatched() == 0 && self.failed() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} mismatched, {} errors, {} skipped ({} registry files excluded)",
            self.passed(),
            self.mismatched(),
            self.failed(),
            self.skipped(),
            self.excluded.len()
        )
    }
}

/// Resolves one case's archive and compares it with the registry.
pub fn run_case(case: &ComboCase, source: &dyn ArchiveSource) -> CaseOutcome {
    let path = match source.locate(&case.patchfile) {
        Ok(Some(p)) => p,
        Ok(None) => return CaseOutcome::Skipped("archive not found locally".to_string()),
        Err(e) => return CaseOutcome::Failed(format!("{:#}", e)),
    };

    let resolution = match resolve::resolve(&path, Some(&case.patchnum)) {
        Ok(r) => r,
        Err(e) => return CaseOutcome::Failed(e.to_string()),
    };
    let record = &resolution.record;

    let mut diffs = Vec::new();
    if record.base_release != case.base_release {
        diffs.push(format!(
            "base release: expected {}, got {}",
            case.base_release, record.base_release
        ));
    }
    if record.patch_release != case.patch_release {
        diffs.push(format!(
            "patch release: expected {}, got {}",
            case.patch_release, record.patch_release
        ));
    }

    let expected: BTreeSet<&str> = [
        case.expected_ojvm_subdir.as_str(),
        case.expected_other_subdir.as_str(),
    ]
    .into_iter()
    .collect();
    let found: BTreeSet<&str> = record.subdir_classification.keys().map(String::as_str).collect();
    if expected != found {
        diffs.push(format!("subdirs: expected {:?}, got {:?}", expected, found));
    }

    if diffs.is_empty() {
        CaseOutcome::Passed
    } else {
        CaseOutcome::Mismatch(diffs)
    }
}

/// Runs every case, in parallel when `jobs > 1`. Results keep case order.
pub fn run_cases(
    cases: &[ComboCase],
    source: &dyn ArchiveSource,
    jobs: usize,
    progress: &dyn HarnessProgressReporter,
) -> Result<Vec<CaseResult>> {
    let total = cases.len() as u64;
    let done = AtomicU64::new(0);

    let check = |case: &ComboCase| {
        let outcome = run_case(case, source);
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        progress.report(HarnessProgressEvent::Checked {
            patchfile: case.patchfile.clone(),
            status: outcome.status(),
            n,
            total,
        });
        CaseResult {
            patchfile: case.patchfile.clone(),
            outcome,
        }
    };

    if jobs <= 1 {
        return Ok(cases.iter().map(check).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build harness thread pool")?;
    Ok(pool.install(|| cases.par_iter().map(check).collect()))
}

/// Loads both registries, indexes the archive directory, and checks every combo.
pub fn run_harness(
    config: &Config,
    archive_dir: Option<&Path>,
    progress: &dyn HarnessProgressReporter,
) -> Result<HarnessReport> {
    let mut entries = registry::load_registry(&config.registry.gi_patches, "gi_patches")?;
    entries.extend(registry::load_registry(
        &config.registry.rdbms_patches,
        "rdbms_patches",
    )?);
    if entries.is_empty() {
        warn!("no registry entries loaded");
    }

    let set = registry::group_combo_cases(&entries, &config.harness.obsolete_patch_files);
    info!("{} combo cases to validate", set.cases.len());

    let dir = archive_dir.unwrap_or(&config.harness.archive_dir);
    progress.report(HarnessProgressEvent::Indexing {
        dir: dir.display().to_string(),
    });
    let source = LocalDirSource::scan(dir, &config.harness.archive_globs)?;

    let results = run_cases(&set.cases, &source, config.harness.jobs, progress)?;
    Ok(HarnessReport {
        results,
        excluded: set.skipped,
    })
}
