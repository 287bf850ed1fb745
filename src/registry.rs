//! Patch registry loading.
//!
//! The toolkit records every supported patch in two YAML files,
//! `gi_patches.yml` (key `gi_patches`) and `rdbms_patches.yml` (key
//! `rdbms_patches`), one flow mapping per component:
//!
//! ```yaml
//! gi_patches:
//!   - { category: "RU", base: "19.3.0.0.0", release: "19.9.0.0.201020", patchnum: "31720429",
//!       patchfile: "p31720429_190000_Linux-x86-64.zip", patch_subdir: "/31750108",
//!       prereq_check: FALSE, method: "opatchauto apply", ocm: FALSE, upgrade: FALSE,
//!       md5sum: "tWOb4Ns4LxpAVNHJr4Xcsg==" }
//! ```
//!
//! A combo archive appears twice, once per component, sharing `patchfile`.
//! [`group_combo_cases`] folds those pairs into test cases for the
//! validation harness. The registry is only ever read.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::models::Label;
use crate::version;

/// Categories filed for the OJVM side of a combo.
pub const OJVM_CATEGORIES: &[&str] = &["RU_Combo", "DB_OJVM_RU", "PSU_Combo"];
/// Categories filed for the GI/DB side of a combo.
pub const OTHER_CATEGORIES: &[&str] = &["RU", "DB_RU", "PSU"];

/// One registry line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistryEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub base: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub release: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patchnum: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patchfile: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub patch_subdir: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub prereq_check: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub ocm: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub upgrade: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub md5sum: Option<String>,
}

impl RegistryEntry {
    /// Which combo side this entry's category belongs to.
    pub fn side(&self) -> Option<Label> {
        let cat = self.category.as_deref()?;
        if OJVM_CATEGORIES.contains(&cat) {
            Some(Label::Ojvm)
        } else if OTHER_CATEGORIES.contains(&cat) {
            Some(Label::Other)
        } else {
            None
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Bool(b) => Some(b),
        serde_yaml::Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Parses registry YAML text and returns the list under `key`.
pub fn parse_registry(text: &str, key: &str) -> Result<Vec<RegistryEntry>> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(text).with_context(|| format!("Failed to parse YAML for '{}'", key))?;
    let Some(list) = doc.get(key) else {
        warn!("key '{}' not found in registry", key);
        return Ok(Vec::new());
    };
    let Some(items) = list.as_sequence() else {
        warn!("expected a list under key '{}'", key);
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_mapping() {
            warn!("skipping non-mapping registry item under '{}'", key);
            continue;
        }
        let entry: RegistryEntry = serde_yaml::from_value(item.clone())
            .with_context(|| format!("Invalid registry item under '{}'", key))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Reads one registry file. A missing file yields an empty list.
pub fn load_registry(path: &Path, key: &str) -> Result<Vec<RegistryEntry>> {
    if !path.exists() {
        warn!("registry file not found: {}", path.display());
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
    let entries = parse_registry(&text, key)?;
    info!("loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Expected metadata for one combo archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboCase {
    pub patchfile: String,
    pub patchnum: String,
    /// Already normalized (`19.0.0.0.0` becomes `19.3.0.0.0`).
    pub base_release: String,
    pub patch_release: String,
    /// Without the leading `/`.
    pub expected_ojvm_subdir: String,
    pub expected_other_subdir: String,
    pub md5sum: Option<String>,
}

/// A registry patch file left out of the harness, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub patchfile: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CaseSet {
    pub cases: Vec<ComboCase>,
    pub skipped: Vec<SkippedFile>,
}

pub fn strip_subdir(subdir: &str) -> String {
    subdir.trim_matches('/').to_string()
}

/// Groups entries by `patchfile` (first-seen order) and keeps those that
/// form one OJVM + one Other pair.
pub fn group_combo_cases(entries: &[RegistryEntry], obsolete: &[String]) -> CaseSet {
    let mut order: Vec<String> = Vec::new();
    let mut by_file: HashMap<String, Vec<&RegistryEntry>> = HashMap::new();
    for entry in entries {
        let Some(file) = entry.patchfile.as_ref() else {
            warn!("registry entry missing 'patchfile': {:?}", entry);
            continue;
        };
        if !by_file.contains_key(file) {
            order.push(file.clone());
        }
        by_file.entry(file.clone()).or_default().push(entry);
    }

    let mut set = CaseSet::default();
    let mut skip = |patchfile: &str, reason: String| {
        info!("skipping {}: {}", patchfile, reason);
        set.skipped.push(SkippedFile {
            patchfile: patchfile.to_string(),
            reason,
        });
    };
    let mut cases = Vec::new();

    for file in order {
        if obsolete.contains(&file) {
            skip(&file, "obsolete or unavailable patch".to_string());
            continue;
        }
        let components = &by_file[&file];
        let (a, b) = match components.as_slice() {
            [a, b] => (*a, *b),
            [_] => {
                skip(&file, "not a 2-component combo patch".to_string());
                continue;
            }
            many => {
                skip(&file, format!("found {} entries, expected 2 for a combo patch", many.len()));
                continue;
            }
        };

        let (Some(base), Some(release), Some(_), Some(_)) = (
            a.base.as_deref(),
            a.release.as_deref(),
            a.patch_subdir.as_deref(),
            b.patch_subdir.as_deref(),
        ) else {
            skip(&file, "missing required keys in component definitions".to_string());
            continue;
        };
        if a.category.is_none() || b.category.is_none() {
            skip(&file, "one or both components missing 'category'".to_string());
            continue;
        }

        let (ojvm, other) = match (a.side(), b.side()) {
            (Some(Label::Ojvm), Some(Label::Other)) => (a, b),
            (Some(Label::Other), Some(Label::Ojvm)) => (b, a),
            _ => {
                skip(
                    &file,
                    format!(
                        "categories '{}' and '{}' do not form a recognized combo pattern",
                        a.category.as_deref().unwrap_or_default(),
                        b.category.as_deref().unwrap_or_default()
                    ),
                );
                continue;
            }
        };

        cases.push(ComboCase {
            patchfile: file.clone(),
            patchnum: a.patchnum.clone().unwrap_or_else(|| "0".to_string()),
            base_release: version::normalize_base_release(base),
            patch_release: release.to_string(),
            expected_ojvm_subdir: strip_subdir(ojvm.patch_subdir.as_deref().unwrap_or_default()),
            expected_other_subdir: strip_subdir(other.patch_subdir.as_deref().unwrap_or_default()),
            md5sum: a.md5sum.clone(),
        });
    }

    set.cases = cases;
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const GI: &str = r#"
gi_patches:
  - { category: "RU", base: "19.3.0.0.0", release: "19.9.0.0.201020", patchnum: "31720429", patchfile: "p31720429_190000_Linux-x86-64.zip", patch_subdir: "/31750108", prereq_check: FALSE, method: "opatchauto apply", ocm: FALSE, upgrade: FALSE, md5sum: "tWOb4Ns4LxpAVNHJr4Xcsg==" }
  - { category: "RU", base: "21.3.0.0.0", release: "21.12.0.0.231017", patchnum: 35740258, patchfile: "p35740258_210000_Linux-x86-64.zip", patch_subdir: "/", prereq_check: FALSE, method: "opatchauto apply", ocm: FALSE, upgrade: FALSE, md5sum: "abc=" }
"#;

    const RDBMS: &str = r#"
rdbms_patches:
  - { category: "RU_Combo", base: "19.0.0.0.0", release: "19.9.0.0.201020", patchnum: "31720429", patchfile: "p31720429_190000_Linux-x86-64.zip", patch_subdir: "/31668882", prereq_check: TRUE, method: "opatch apply", ocm: FALSE, upgrade: TRUE, md5sum: "tWOb4Ns4LxpAVNHJr4Xcsg==" }
  - { category: "DB_OJVM_RU", base: "12.1.0.2.0", release: "12.1.0.2.210119", patchnum: "32126899", patchfile: "p32126899_121020_Linux-x86-64.zip", patch_subdir: "/1", md5sum: "x" }
  - { category: "DB_RU", base: "12.1.0.2.0", release: "12.1.0.2.210119", patchnum: "32126899", patchfile: "p32126899_121020_Linux-x86-64.zip", patch_subdir: "/2", md5sum: "x" }
  - { category: "DB_RU", base: "19.3.0.0.0", release: "19.10.0.0.210119", patchnum: "1", patchfile: "odd.zip", patch_subdir: "/3" }
  - { category: "DB_RU", base: "19.3.0.0.0", release: "19.10.0.0.210119", patchnum: "1", patchfile: "odd.zip", patch_subdir: "/4" }
"#;

    #[test]
    fn lenient_fields() {
        let gi = parse_registry(GI, "gi_patches").unwrap();
        assert_eq!(gi.len(), 2);
        assert_eq!(gi[0].prereq_check, Some(false));
        assert_eq!(gi[0].method.as_deref(), Some("opatchauto apply"));
        assert_eq!(gi[1].patchnum.as_deref(), Some("35740258"));
    }

    #[test]
    fn missing_key_is_empty() {
        assert!(parse_registry(GI, "rdbms_patches").unwrap().is_empty());
        assert!(parse_registry("gi_patches: 3\n", "gi_patches").unwrap().is_empty());
    }

    #[test]
    fn groups_pairs_and_reports_skips() {
        let mut entries = parse_registry(GI, "gi_patches").unwrap();
        entries.extend(parse_registry(RDBMS, "rdbms_patches").unwrap());
        let obsolete = vec!["p32126899_121020_Linux-x86-64.zip".to_string()];
        let set = group_combo_cases(&entries, &obsolete);

        assert_eq!(set.cases.len(), 1);
        let case = &set.cases[0];
        assert_eq!(case.patchnum, "31720429");
        assert_eq!(case.base_release, "19.3.0.0.0");
        assert_eq!(case.expected_ojvm_subdir, "31668882");
        assert_eq!(case.expected_other_subdir, "31750108");

        let reasons: Vec<(&str, &str)> = set
            .skipped
            .iter()
            .map(|s| (s.patchfile.as_str(), s.reason.as_str()))
            .collect();
        assert_eq!(reasons.len(), 3);
        assert!(reasons.contains(&("p35740258_210000_Linux-x86-64.zip", "not a 2-component combo patch")));
        assert!(reasons.contains(&("p32126899_121020_Linux-x86-64.zip", "obsolete or unavailable patch")));
        assert!(reasons
            .iter()
            .any(|(f, r)| *f == "odd.zip" && r.contains("do not form a recognized combo pattern")));
    }

    #[test]
    fn entry_side_from_category() {
        let e = RegistryEntry {
            category: Some("PSU_Combo".into()),
            ..Default::default()
        };
        assert_eq!(e.side(), Some(Label::Ojvm));
        let e = RegistryEntry {
            category: Some("Upgrade".into()),
            ..Default::default()
        };
        assert_eq!(e.side(), None);
    }
}
