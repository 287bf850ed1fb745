use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::opatch;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub emit: EmitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_gi_patches")]
    pub gi_patches: PathBuf,
    #[serde(default = "default_rdbms_patches")]
    pub rdbms_patches: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            gi_patches: default_gi_patches(),
            rdbms_patches: default_rdbms_patches(),
        }
    }
}

fn default_gi_patches() -> PathBuf {
    PathBuf::from("roles/common/defaults/main/gi_patches.yml")
}
fn default_rdbms_patches() -> PathBuf {
    PathBuf::from("roles/common/defaults/main/rdbms_patches.yml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarnessConfig {
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    #[serde(default = "default_archive_globs")]
    pub archive_globs: Vec<String>,
    #[serde(default = "default_obsolete_patch_files")]
    pub obsolete_patch_files: Vec<String>,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            archive_globs: default_archive_globs(),
            obsolete_patch_files: default_obsolete_patch_files(),
            jobs: default_jobs(),
        }
    }
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./patch_test_temp")
}
fn default_archive_globs() -> Vec<String> {
    vec!["**/*.zip".to_string()]
}
/// 12.1.0.2 bundles no longer available for download.
fn default_obsolete_patch_files() -> Vec<String> {
    vec![
        "p32126899_121020_Linux-x86-64.zip".to_string(),
        "p32579077_121020_Linux-x86-64.zip".to_string(),
    ]
}
fn default_jobs() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmitConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
        }
    }
}

fn default_platform() -> String {
    opatch::DEFAULT_PLATFORM.to_string()
}

impl Config {
    /// Defaults used when no configuration file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.harness.jobs == 0 {
        anyhow::bail!("harness.jobs must be >= 1");
    }

    if config.harness.archive_globs.is_empty() {
        anyhow::bail!("harness.archive_globs must name at least one pattern");
    }

    if config.emit.platform.trim().is_empty() {
        anyhow::bail!("emit.platform must not be empty");
    }

    Ok(config)
}

/// Loads `path` when it exists, otherwise falls back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_gets_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("patchmeta.toml");
        std::fs::write(&path, "").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.harness.jobs, 1);
        assert_eq!(cfg.emit.platform, "Linux-x86-64");
        assert_eq!(cfg.harness.obsolete_patch_files.len(), 2);
    }

    #[test]
    fn overrides_are_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("patchmeta.toml");
        std::fs::write(
            &path,
            r#"
[registry]
gi_patches = "/srv/toolkit/gi_patches.yml"

[harness]
archive_dir = "/srv/patches"
jobs = 4
"#,
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.registry.gi_patches, PathBuf::from("/srv/toolkit/gi_patches.yml"));
        assert_eq!(cfg.registry.rdbms_patches, default_rdbms_patches());
        assert_eq!(cfg.harness.archive_dir, PathBuf::from("/srv/patches"));
        assert_eq!(cfg.harness.jobs, 4);
    }

    #[test]
    fn zero_jobs_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("patchmeta.toml");
        std::fs::write(&path, "[harness]\njobs = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("harness.jobs"));
    }

    #[test]
    fn example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/patchmeta.example.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.harness.jobs, 4);
        assert_eq!(cfg.harness.archive_globs, vec!["**/*.zip".to_string()]);
    }

    #[test]
    fn missing_file_falls_back_to_minimal() {
        let cfg = load_or_default(Path::new("/nonexistent/patchmeta.toml")).unwrap();
        assert_eq!(cfg.harness.archive_dir, default_archive_dir());
    }
}
