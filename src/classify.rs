//! OJVM / Other component classification.
//!
//! Each candidate starts unclassified and takes the label of the first rule
//! in [`RULES`] that proposes one. Rules are pure functions of the
//! candidate and a read-only [`Context`]; the driver applies them pass by
//! pass and drops any proposal that would give both components the same
//! label.
//!
//! | Rule        | Confidence | Evidence                                         |
//! |-------------|------------|--------------------------------------------------|
//! | `keyword`   | confident  | only OJVM markers                                |
//! | `exclusion` | confident  | the sibling is already classified as OJVM        |
//! | `abstract`  | guess      | family named by the abstract vs. candidate text  |
//! | `guess`     | guess      | generic marker balance, then lexical id order    |
//!
//! A label produced by a guess rule marks the whole run ambiguous and adds a
//! warning naming the subdirectories involved. The guess is occasionally
//! wrong about which side is OJVM; the set of subdirectories is always
//! right.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};
use crate::extract::mentions_id;
use crate::models::{ComponentCandidate, Inspection, Label};
use crate::version;

/// Components per archive this classifier models (GI/DB + OJVM).
pub const SUPPORTED_COMPONENTS: usize = 2;

static OJVM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ojvm|javavm|java\s+vm|oracle\s+java\s+virtual\s+machine)\b").unwrap()
});
static OTHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(grid\s+infrastructure|gi\s+release\s+update|gi[_\s]?ru|giru|gi|clusterware|database|rdbms|db\s+ru)\b",
    )
    .unwrap()
});
static GI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(grid\s+infrastructure|gi[_\s]?ru|giru|gi|clusterware)\b").unwrap()
});
static DB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(database|rdbms|db\s+ru|db)\b").unwrap()
});

/// The non-OJVM release family a combo patch pairs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseFamily {
    Gi,
    Db,
}

impl ReleaseFamily {
    fn markers(self) -> &'static Regex {
        match self {
            ReleaseFamily::Gi => &GI_RE,
            ReleaseFamily::Db => &DB_RE,
        }
    }
}

/// What the abstract line says, e.g.
/// `COMBO OF OJVM RU COMPONENT 19.21.0.0.231017 + GI RU 19.21.0.0.231017`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractInfo {
    pub names_ojvm: bool,
    /// Set only when exactly one non-OJVM family is named.
    pub family: Option<ReleaseFamily>,
    pub ojvm_version: Option<String>,
    pub other_version: Option<String>,
}

impl AbstractInfo {
    pub fn parse(text: &str) -> Self {
        let mut info = AbstractInfo::default();
        let mut families: Vec<(ReleaseFamily, Option<String>)> = Vec::new();

        for segment in text.split('+') {
            let found = version::first_version(segment).map(str::to_string);
            if OJVM_RE.is_match(segment) {
                info.names_ojvm = true;
                if info.ojvm_version.is_none() {
                    info.ojvm_version = found;
                }
                continue;
            }
            let family = if GI_RE.is_match(segment) {
                ReleaseFamily::Gi
            } else if DB_RE.is_match(segment) {
                ReleaseFamily::Db
            } else {
                continue;
            };
            if !families.iter().any(|(f, _)| *f == family) {
                families.push((family, found));
            }
        }

        if families.len() == 1 {
            let (family, found) = families.remove(0);
            info.family = Some(family);
            info.other_version = found;
        }
        info
    }

    /// Patch release named by the abstract, non-OJVM side first.
    pub fn patch_release(&self) -> Option<&str> {
        self.other_version
            .as_deref()
            .or(self.ojvm_version.as_deref())
    }
}

/// Marker counts for one candidate, over lines that do not also name a
/// sibling candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub ojvm: usize,
    pub other: usize,
    pub family: usize,
}

fn scan_candidate(
    candidate: &ComponentCandidate,
    siblings: &[&str],
    family: Option<ReleaseFamily>,
) -> MarkerScan {
    let mut scan = MarkerScan::default();
    let text = candidate.text();
    for line in text.lines() {
        if siblings.iter().any(|s| mentions_id(line, s)) {
            continue;
        }
        scan.ojvm += OJVM_RE.find_iter(line).count();
        scan.other += OTHER_RE.find_iter(line).count();
        if let Some(f) = family {
            scan.family += f.markers().find_iter(line).count();
        }
    }
    scan
}

/// Read-only view handed to every rule.
pub struct Context<'a> {
    pub candidates: &'a [ComponentCandidate],
    pub scans: &'a HashMap<String, MarkerScan>,
    pub assigned: &'a BTreeMap<String, Label>,
    pub abstract_info: &'a AbstractInfo,
}

impl<'a> Context<'a> {
    fn scan(&self, id: &str) -> MarkerScan {
        self.scans.get(id).copied().unwrap_or_default()
    }

    /// The one unclassified candidate other than `candidate`.
    fn pending_sibling(&self, candidate: &ComponentCandidate) -> Option<&'a ComponentCandidate> {
        let mut others = self
            .candidates
            .iter()
            .filter(|c| c.id != candidate.id && !self.assigned.contains_key(&c.id));
        match (others.next(), others.next()) {
            (Some(sibling), None) => Some(sibling),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Confident,
    Guess,
}

pub struct Rule {
    pub name: &'static str,
    pub confidence: Confidence,
    pub apply: fn(&ComponentCandidate, &Context<'_>) -> Option<Label>,
}

/// The cascade, in evaluation order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "keyword",
        confidence: Confidence::Confident,
        apply: keyword_rule,
    },
    Rule {
        name: "exclusion",
        confidence: Confidence::Confident,
        apply: exclusion_rule,
    },
    Rule {
        name: "abstract",
        confidence: Confidence::Guess,
        apply: abstract_rule,
    },
    Rule {
        name: "guess",
        confidence: Confidence::Guess,
        apply: guess_rule,
    },
];

/// Only OJVM markers are conclusive. GI/DB markers alone feed the scores of
/// the guess rules.
fn keyword_rule(candidate: &ComponentCandidate, ctx: &Context<'_>) -> Option<Label> {
    let scan = ctx.scan(&candidate.id);
    (scan.ojvm > 0 && scan.other == 0).then_some(Label::Ojvm)
}

/// The label opposite to the one sibling already classified.
fn sibling_complement(candidate: &ComponentCandidate, ctx: &Context<'_>) -> Option<Label> {
    if ctx.candidates.len() != SUPPORTED_COMPONENTS || ctx.assigned.len() != 1 {
        return None;
    }
    ctx.assigned
        .iter()
        .find(|(id, _)| **id != candidate.id)
        .map(|(_, label)| label.complement())
}

fn exclusion_rule(candidate: &ComponentCandidate, ctx: &Context<'_>) -> Option<Label> {
    sibling_complement(candidate, ctx).filter(|l| *l == Label::Other)
}

/// Higher score wins `OTHER`; equal scores decide nothing.
fn compare_scores(own: i64, sibling: i64) -> Option<Label> {
    match own.cmp(&sibling) {
        std::cmp::Ordering::Greater => Some(Label::Other),
        std::cmp::Ordering::Less => Some(Label::Ojvm),
        std::cmp::Ordering::Equal => None,
    }
}

fn abstract_rule(candidate: &ComponentCandidate, ctx: &Context<'_>) -> Option<Label> {
    if !ctx.abstract_info.names_ojvm || ctx.abstract_info.family.is_none() {
        return None;
    }
    let sibling = ctx.pending_sibling(candidate)?;
    let score = |id: &str| {
        let s = ctx.scan(id);
        s.family as i64 - s.ojvm as i64
    };
    compare_scores(score(&candidate.id), score(&sibling.id))
}

fn guess_rule(candidate: &ComponentCandidate, ctx: &Context<'_>) -> Option<Label> {
    if let Some(label) = sibling_complement(candidate, ctx) {
        return Some(label);
    }
    let sibling = ctx.pending_sibling(candidate)?;
    let score = |id: &str| {
        let s = ctx.scan(id);
        s.other as i64 - s.ojvm as i64
    };
    compare_scores(score(&candidate.id), score(&sibling.id)).or_else(|| {
        if candidate.id < sibling.id {
            Some(Label::Ojvm)
        } else {
            Some(Label::Other)
        }
    })
}

/// Outcome of the cascade plus version extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub labels: BTreeMap<String, Label>,
    pub ambiguous: bool,
    pub warnings: Vec<String>,
    pub base_release: String,
    pub patch_release: String,
    pub abstract_info: AbstractInfo,
}

/// Fails unless the archive has exactly [`SUPPORTED_COMPONENTS`] candidates.
pub fn enforce_component_count(inspection: &Inspection) -> Result<()> {
    let found = inspection.candidates.len();
    if found == 0 {
        return Err(ResolveError::NoCandidatesFound {
            path: inspection.archive_path.clone(),
            patch_number: inspection.patch_number.clone(),
        });
    }
    if found != SUPPORTED_COMPONENTS {
        return Err(ResolveError::UnsupportedComponentCount {
            path: inspection.archive_path.clone(),
            found,
            subdirs: inspection.candidates.iter().map(|c| c.id.clone()).collect(),
        });
    }
    Ok(())
}

/// Labels every candidate and extracts the release pair.
pub fn classify(inspection: &Inspection) -> Result<Classification> {
    enforce_component_count(inspection)?;

    let abstract_info = AbstractInfo::parse(inspection.abstract_text());
    let (labels, ambiguous, warnings) = run_cascade(&inspection.candidates, &abstract_info);
    let (base_release, patch_release) = extract_versions(inspection, &abstract_info)?;

    Ok(Classification {
        labels,
        ambiguous,
        warnings,
        base_release,
        patch_release,
        abstract_info,
    })
}

/// Applies [`RULES`] until every candidate is labelled.
pub fn run_cascade(
    candidates: &[ComponentCandidate],
    abstract_info: &AbstractInfo,
) -> (BTreeMap<String, Label>, bool, Vec<String>) {
    let scans: HashMap<String, MarkerScan> = candidates
        .iter()
        .map(|c| {
            let siblings: Vec<&str> = candidates
                .iter()
                .filter(|s| s.id != c.id)
                .map(|s| s.id.as_str())
                .collect();
            let scan = scan_candidate(c, &siblings, abstract_info.family);
            debug!(subdir = %c.id, ?scan, "marker scan");
            (c.id.clone(), scan)
        })
        .collect();

    let mut labels: BTreeMap<String, Label> = BTreeMap::new();
    let mut ambiguous = false;
    let mut warnings = Vec::new();

    for rule in RULES {
        if labels.len() == candidates.len() {
            break;
        }
        let ctx = Context {
            candidates,
            scans: &scans,
            assigned: &labels,
            abstract_info,
        };
        let mut proposals: Vec<(String, Label)> = candidates
            .iter()
            .filter(|c| !labels.contains_key(&c.id))
            .filter_map(|c| (rule.apply)(c, &ctx).map(|l| (c.id.clone(), l)))
            .collect();

        for label in [Label::Ojvm, Label::Other] {
            let held = labels.values().filter(|l| **l == label).count();
            let proposed = proposals.iter().filter(|(_, l)| *l == label).count();
            if held + proposed > 1 {
                debug!(rule = rule.name, %label, "conflicting proposals dropped");
                proposals.retain(|(_, l)| *l != label);
            }
        }
        if proposals.is_empty() {
            continue;
        }

        if rule.confidence == Confidence::Guess {
            ambiguous = true;
            let assigned: Vec<String> = proposals
                .iter()
                .map(|(id, l)| format!("/{} as {}", id, l))
                .collect();
            let msg = format!(
                "GUESSING ({} rule): assigned {}. PLEASE VERIFY MANUALLY!",
                rule.name,
                assigned.join(" and ")
            );
            warn!("{}", msg);
            warnings.push(msg);
        }
        for (id, label) in proposals {
            info!(subdir = %id, %label, rule = rule.name, "classified");
            labels.insert(id, label);
        }
    }

    (labels, ambiguous, warnings)
}

/// Base and patch release for the archive, base first.
pub fn extract_versions(
    inspection: &Inspection,
    abstract_info: &AbstractInfo,
) -> Result<(String, String)> {
    let mut sources: Vec<&str> = vec![inspection.abstract_text()];
    if let Some(name) = inspection
        .patch_search
        .as_ref()
        .and_then(|p| p.release_name.as_deref())
    {
        sources.push(name);
    }
    for c in &inspection.candidates {
        sources.extend(c.manifest.as_deref());
        sources.extend(c.documentation.as_deref());
    }
    sources.extend(inspection.top_level_doc.as_deref());

    let mut tokens: Vec<&str> = Vec::new();
    for text in &sources {
        for t in version::find_versions(text) {
            if !tokens.contains(&t) {
                tokens.push(t);
            }
        }
    }
    if tokens.is_empty() {
        tokens.extend(sources.iter().find_map(|t| version::first_version(t)));
    }

    let explicit_base = inspection
        .patch_search
        .as_ref()
        .and_then(|p| p.release_name.as_deref())
        .filter(|r| version::is_valid(r));
    let derived_patch = abstract_info.patch_release();

    let (base, patch) = match (explicit_base, derived_patch) {
        (Some(b), Some(p)) => (b.to_string(), p.to_string()),
        (Some(b), None) => {
            let p = tokens
                .iter()
                .find(|t| version::compare(t, b) == std::cmp::Ordering::Greater)
                .copied()
                .unwrap_or(b);
            (b.to_string(), p.to_string())
        }
        (None, Some(p)) => {
            let b = tokens
                .iter()
                .find(|t| version::compare(t, p) == std::cmp::Ordering::Less)
                .map(|t| t.to_string())
                .unwrap_or_else(|| version::major_base(p));
            (b, p.to_string())
        }
        (None, None) => match tokens.as_slice() {
            [] => {
                return Err(ResolveError::VersionNotFound {
                    path: inspection.archive_path.clone(),
                })
            }
            [only] => (version::major_base(only), only.to_string()),
            [first, second, ..] => {
                let (b, p) = version::ordered(first, second);
                (b.to_string(), p.to_string())
            }
        },
    };

    let (base, patch) = version::ordered(&base, &patch);
    let base = version::normalize_base_release(base);
    let patch = if version::compare(patch, &base) == std::cmp::Ordering::Less {
        base.clone()
    } else {
        patch.to_string()
    };
    Ok((base, patch))
}
