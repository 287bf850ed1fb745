//! Core data models used throughout patchmeta.
//!
//! These types represent the candidates, classifications, and resolved
//! records that flow from the archive inspector through the classifier
//! to the emitter.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Which side of a combo patch a subdirectory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Label {
    #[serde(rename = "OJVM")]
    Ojvm,
    /// The GI Release Update or DB Release Update component.
    #[serde(rename = "OTHER")]
    Other,
}

impl Label {
    pub fn complement(self) -> Label {
        match self {
            Label::Ojvm => Label::Other,
            Label::Other => Label::Ojvm,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Ojvm => write!(f, "OJVM"),
            Label::Other => write!(f, "OTHER"),
        }
    }
}

/// A numeric subdirectory one level beneath the top-level patch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCandidate {
    /// Digit string, compared as an opaque string.
    pub id: String,
    /// Concatenated README-like files found directly inside the subdirectory.
    pub documentation: Option<String>,
    /// Flattened `bundle.xml` plus top-level README lines naming this id.
    pub manifest: Option<String>,
}

impl ComponentCandidate {
    /// All text available for this candidate, manifest first.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in [&self.manifest, &self.documentation].into_iter().flatten() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(part);
        }
        out
    }
}

/// Fields recovered from the archive's `PatchSearch.xml` descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSearchInfo {
    pub abstract_text: String,
    /// `<release name="...">`, e.g. `19.0.0.0.0`.
    pub release_name: Option<String>,
}

/// Everything the inspector extracted from one archive. The archive handle
/// itself is already closed by the time this exists.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub archive_path: PathBuf,
    /// File name of the archive, e.g. `p31720429_190000_Linux-x86-64.zip`.
    pub patch_file: String,
    pub patch_number: String,
    /// Ascending by id.
    pub candidates: Vec<ComponentCandidate>,
    pub patch_search: Option<PatchSearchInfo>,
    /// Text of README files directly under `<patch_number>/`.
    pub top_level_doc: Option<String>,
    /// Non-fatal problems met while reading the archive.
    pub warnings: Vec<String>,
}

impl Inspection {
    /// The `PatchSearch.xml` abstract, or the first line of the top-level
    /// README when the descriptor is absent.
    pub fn abstract_text(&self) -> &str {
        if let Some(p) = &self.patch_search {
            return &p.abstract_text;
        }
        self.top_level_doc
            .as_deref()
            .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or("")
    }
}

/// The resolved output for one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchMetadataRecord {
    pub patch_number: String,
    pub base_release: String,
    pub patch_release: String,
    pub subdir_classification: BTreeMap<String, Label>,
    pub content_hash: String,
    pub abstract_text: String,
    pub ambiguous: bool,
}

impl PatchMetadataRecord {
    /// The subdirectory carrying `label`, if any.
    pub fn subdir_for(&self, label: Label) -> Option<&str> {
        self.subdir_classification
            .iter()
            .find(|(_, l)| **l == label)
            .map(|(id, _)| id.as_str())
    }
}

/// A record together with the warnings produced while resolving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub record: PatchMetadataRecord,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub patch_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Label::Ojvm).unwrap(), "\"OJVM\"");
        assert_eq!(serde_json::to_string(&Label::Other).unwrap(), "\"OTHER\"");
    }

    #[test]
    fn candidate_text_joins_manifest_then_docs() {
        let c = ComponentCandidate {
            id: "31750108".into(),
            documentation: Some("readme".into()),
            manifest: Some("bundle".into()),
        };
        assert_eq!(c.text(), "bundle\nreadme");

        let bare = ComponentCandidate {
            id: "1".into(),
            documentation: None,
            manifest: None,
        };
        assert_eq!(bare.text(), "");
    }
}
