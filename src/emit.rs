//! Report and registry snippet rendering.
//!
//! Everything here formats data already resolved in memory: the human
//! report, the JSON form of a [`Resolution`], and the copy-paste registry
//! lines for each plausible category. Which category is right depends on
//! whether the patch is applied to a Grid Infrastructure home or only to
//! a database home, so every option is offered.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use crate::models::{Label, PatchMetadataRecord, Resolution};
use crate::version;

/// Registry categories a combo component can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    #[serde(rename = "RU")]
    Ru,
    #[serde(rename = "DB_RU")]
    DbRu,
    #[serde(rename = "RU_Combo")]
    RuCombo,
    #[serde(rename = "DB_OJVM_RU")]
    DbOjvmRu,
}

impl Category {
    pub fn tag(self) -> &'static str {
        match self {
            Category::Ru => "RU",
            Category::DbRu => "DB_RU",
            Category::RuCombo => "RU_Combo",
            Category::DbOjvmRu => "DB_OJVM_RU",
        }
    }

    /// Categories offered for a subdirectory with `label`.
    pub fn options(label: Label) -> [Category; 2] {
        match label {
            Label::Other => [Category::Ru, Category::DbRu],
            Label::Ojvm => [Category::RuCombo, Category::DbOjvmRu],
        }
    }

    /// Registry file and its top-level key.
    pub fn registry_file(self) -> (&'static str, &'static str) {
        match self {
            Category::Ru => ("gi_patches.yml", "gi_patches"),
            _ => ("rdbms_patches.yml", "rdbms_patches"),
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            Category::Ru => "opatchauto apply",
            _ => "opatch apply",
        }
    }

    /// GI patches skip the prerequisite check and the upgrade step.
    fn gi_home(self) -> bool {
        self == Category::Ru
    }

    fn describe(self) -> &'static str {
        match self {
            Category::Ru => "If this is a GI Patch (RU)",
            Category::DbRu => "If this is an RDBMS Patch (DB_RU)",
            Category::RuCombo => "If OJVM is from a GI Combo (RU_Combo)",
            Category::DbOjvmRu => "If this is an OJVM + DB RU (DB_OJVM_RU)",
        }
    }
}

/// One ready-to-paste registry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnippet {
    pub category: Category,
    pub subdir: String,
    pub file: &'static str,
    pub key: &'static str,
    pub line: String,
}

fn yaml_bool(v: bool) -> &'static str {
    if v {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Flow-mapping line in the registry's own layout.
pub fn registry_line(record: &PatchMetadataRecord, patch_file: &str, category: Category, subdir: &str) -> String {
    let gi = category.gi_home();
    format!(
        "- {{ category: \"{}\", base: \"{}\", release: \"{}\", patchnum: \"{}\", patchfile: \"{}\", patch_subdir: \"/{}\", prereq_check: {}, method: \"{}\", ocm: FALSE, upgrade: {}, md5sum: \"{}\" }}",
        category.tag(),
        record.base_release,
        record.patch_release,
        record.patch_number,
        patch_file,
        subdir,
        yaml_bool(!gi),
        category.method(),
        yaml_bool(!gi),
        record.content_hash,
    )
}

/// Two snippets per classified subdirectory, OTHER side first.
pub fn registry_snippets(record: &PatchMetadataRecord, patch_file: &str) -> Vec<RegistrySnippet> {
    let mut out = Vec::new();
    for label in [Label::Other, Label::Ojvm] {
        let Some(subdir) = record.subdir_for(label) else {
            continue;
        };
        for category in Category::options(label) {
            let (file, key) = category.registry_file();
            out.push(RegistrySnippet {
                category,
                subdir: subdir.to_string(),
                file,
                key,
                line: registry_line(record, patch_file, category, subdir),
            });
        }
    }
    out
}

/// Human-readable summary of a resolution. Every warning is listed; a
/// guessed labelling always contributes one.
pub fn render_report(resolution: &Resolution) -> String {
    let r = &resolution.record;
    let mut out = String::new();
    let _ = writeln!(out, "--- Patch Analysis Results ---");
    let _ = writeln!(out, "  Patch:          {}", r.patch_number);
    let _ = writeln!(out, "  MD5 (base64):   {}", r.content_hash);
    let _ = writeln!(out, "  Abstract:       {}", r.abstract_text);
    let _ = writeln!(out, "  Base Release:   {}", r.base_release);
    let _ = write!(out, "  Patch Release:  {}", r.patch_release);
    if let Some(date) = version::release_date(&r.patch_release) {
        let _ = write!(out, " ({})", date.format("%Y-%m-%d"));
    }
    out.push('\n');
    for (subdir, label) in &r.subdir_classification {
        let hint = match label {
            Label::Other => "likely the GI or DB_RU component",
            Label::Ojvm => "OJVM component",
        };
        let _ = writeln!(out, "  /{:<14} {:<6} ({})", subdir, label.to_string(), hint);
    }
    for w in &resolution.warnings {
        let _ = writeln!(out, "WARNING: {}", w);
    }
    let _ = writeln!(out, "--------------------------------");
    out
}

/// Copy-paste block: files to upload, then every registry option.
pub fn render_snippets(resolution: &Resolution, opatch_file: &str) -> String {
    let r = &resolution.record;
    let patch_file = &resolution.patch_file;
    let snippets = registry_snippets(r, patch_file);
    let mut out = String::new();

    let _ = writeln!(out, "# === SCRIPT OUTPUT: Copy files and update YAML ===");
    let _ = writeln!(out);
    let _ = writeln!(out, "# 1. Copy the following files to your software bucket:");
    let _ = writeln!(out, "# {} {}", patch_file, opatch_file);
    let _ = writeln!(out);
    let _ = writeln!(out, "# 2. Add the following to roles/common/defaults/main/ files:");
    let _ = writeln!(out, "#    (Review the abstract to make the correct selections!)");
    let _ = writeln!(out, "#");
    let _ = writeln!(out, "# Abstract: {}", r.abstract_text);

    for (n, label) in [Label::Other, Label::Ojvm].into_iter().enumerate() {
        let Some(subdir) = r.subdir_for(label) else {
            continue;
        };
        let heading = match label {
            Label::Other => "Choose the NON-OJVM component (GI or DB)",
            Label::Ojvm => "Choose the OJVM component",
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "# --- SELECTION {}: {} ---", n + 1, heading);
        let _ = writeln!(out, "# --- This component is in subdir: /{} ---", subdir);
        let options = snippets.iter().filter(|s| s.subdir == subdir);
        for (letter, s) in ["A", "B"].iter().zip(options) {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "# {}{}: {}, add to '{}':",
                n + 1,
                letter,
                s.category.describe(),
                s.file
            );
            let _ = writeln!(out, "#   {}:", s.key);
            let _ = writeln!(out, "#     {}", s.line);
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "# === END SCRIPT OUTPUT ===");
    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    resolution: &'a Resolution,
    patch_file: &'a str,
    snippets: Vec<RegistrySnippet>,
}

/// Pretty JSON of the record, warnings, and snippets.
pub fn render_json(resolution: &Resolution) -> Result<String> {
    let out = JsonOutput {
        resolution,
        patch_file: &resolution.patch_file,
        snippets: registry_snippets(&resolution.record, &resolution.patch_file),
    };
    Ok(serde_json::to_string_pretty(&out)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn resolution(ambiguous: bool) -> Resolution {
        let mut subdirs = BTreeMap::new();
        subdirs.insert("31668882".to_string(), Label::Ojvm);
        subdirs.insert("31750108".to_string(), Label::Other);
        Resolution {
            record: PatchMetadataRecord {
                patch_number: "31720429".into(),
                base_release: "19.3.0.0.0".into(),
                patch_release: "19.9.0.0.201020".into(),
                subdir_classification: subdirs,
                content_hash: "tWOb4Ns4LxpAVNHJr4Xcsg==".into(),
                abstract_text: "COMBO OF OJVM RU COMPONENT 19.9.0.0.201020 + GI RU 19.9.0.0.201020".into(),
                ambiguous,
            },
            warnings: if ambiguous {
                vec!["GUESSING (guess rule): assigned /31668882 as OJVM".into()]
            } else {
                vec![]
            },
            patch_file: "p31720429_190000_Linux-x86-64.zip".into(),
        }
    }

    #[test]
    fn gi_snippet_matches_registry_layout() {
        let res = resolution(false);
        let snippets = registry_snippets(&res.record, &res.patch_file);
        assert_eq!(snippets.len(), 4);
        assert_eq!(snippets[0].category, Category::Ru);
        assert_eq!(
            snippets[0].line,
            "- { category: \"RU\", base: \"19.3.0.0.0\", release: \"19.9.0.0.201020\", patchnum: \"31720429\", \
             patchfile: \"p31720429_190000_Linux-x86-64.zip\", patch_subdir: \"/31750108\", prereq_check: FALSE, \
             method: \"opatchauto apply\", ocm: FALSE, upgrade: FALSE, md5sum: \"tWOb4Ns4LxpAVNHJr4Xcsg==\" }"
        );
    }

    #[test]
    fn ojvm_options_target_rdbms_registry() {
        let res = resolution(false);
        let snippets = registry_snippets(&res.record, &res.patch_file);
        let ojvm: Vec<&RegistrySnippet> = snippets.iter().filter(|s| s.subdir == "31668882").collect();
        assert_eq!(ojvm.len(), 2);
        assert_eq!(ojvm[0].category, Category::RuCombo);
        assert_eq!(ojvm[1].category, Category::DbOjvmRu);
        assert!(ojvm.iter().all(|s| s.file == "rdbms_patches.yml"));
        assert!(ojvm[0].line.contains("prereq_check: TRUE, method: \"opatch apply\""));
    }

    #[test]
    fn report_flags_guesses() {
        let clear = render_report(&resolution(false));
        assert!(clear.contains("Patch Release:  19.9.0.0.201020 (2020-10-20)"));
        assert!(clear.contains("/31750108"));
        assert!(!clear.contains("WARNING"));

        let guessed = render_report(&resolution(true));
        assert!(guessed.contains("WARNING: GUESSING (guess rule): assigned /31668882 as OJVM"));
    }

    #[test]
    fn report_lists_inspection_warnings_on_confident_runs() {
        let mut res = resolution(false);
        res.warnings
            .push("skipping 31720429/31750108/README.txt: entry exceeds 8388608 bytes".into());
        let text = render_report(&res);
        assert!(text.contains("WARNING: skipping 31720429/31750108/README.txt"));
        assert!(!text.contains("GUESSING"));
    }

    #[test]
    fn snippets_list_files_to_copy() {
        let text = render_snippets(&resolution(false), "p6880880_190000_Linux-x86-64.zip");
        assert!(text.contains("# p31720429_190000_Linux-x86-64.zip p6880880_190000_Linux-x86-64.zip"));
        assert!(text.contains("# 1A: If this is a GI Patch (RU), add to 'gi_patches.yml':"));
        assert!(text.contains("# 2B: If this is an OJVM + DB RU (DB_OJVM_RU), add to 'rdbms_patches.yml':"));
    }

    #[test]
    fn json_carries_record_and_warnings() {
        let json = render_json(&resolution(true)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["record"]["subdir_classification"]["31668882"], "OJVM");
        assert_eq!(v["record"]["ambiguous"], true);
        assert_eq!(v["warnings"].as_array().unwrap().len(), 1);
        assert_eq!(v["snippets"].as_array().unwrap().len(), 4);
        assert_eq!(v["patch_file"], "p31720429_190000_Linux-x86-64.zip");
    }
}
