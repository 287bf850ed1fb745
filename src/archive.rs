//! Patch archive inspection.
//!
//! Opens a Release Update zip, works out the top-level patch number,
//! discovers the numeric component subdirectories beneath it, and gathers
//! the documentation and manifest text the classifier works from. The zip
//! handle lives only for the duration of [`inspect`]; the returned
//! [`Inspection`] owns plain data.
//!
//! ```text
//! p31720429_190000_Linux-x86-64.zip
//! ├── PatchSearch.xml            abstract + base release
//! └── 31720429/
//!     ├── README.html            top-level manifest lines
//!     ├── 31668882/README.html   candidate documentation
//!     └── 31750108/bundle.xml    candidate manifest
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};
use crate::extract;
use crate::models::{ComponentCandidate, Inspection, PatchSearchInfo};

/// Maximum decompressed bytes read from a single documentation entry.
pub const MAX_DOC_ENTRY_BYTES: u64 = 8 * 1024 * 1024;

/// Recognized README names, lower-cased, in concatenation order.
const README_NAMES: &[&str] = &["readme.html", "readme.htm", "readme.txt", "readme", "readme.md"];

const PATCH_SEARCH: &str = "PatchSearch.xml";
const BUNDLE_XML: &str = "bundle.xml";

const HASH_BLOCK: usize = 1024 * 1024;

static PATCH_FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[pP](\d+)_").unwrap());

#[derive(Debug)]
enum EntryError {
    Missing,
    TooLarge,
    Read(String),
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryError::Missing => write!(f, "entry not found"),
            EntryError::TooLarge => write!(f, "entry exceeds {} bytes", MAX_DOC_ENTRY_BYTES),
            EntryError::Read(e) => write!(f, "{}", e),
        }
    }
}

/// An opened, read-only view over a patch zip.
pub struct PatchArchive {
    path: PathBuf,
    zip: zip::ZipArchive<File>,
    /// Sorted entry paths.
    entries: Vec<String>,
}

impl PatchArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let unreadable = |reason: String| ResolveError::ArchiveUnreadable {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let zip = zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;
        let mut entries: Vec<String> = zip.file_names().map(|s| s.to_string()).collect();
        entries.sort();
        Ok(Self {
            path: path.to_path_buf(),
            zip,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.binary_search_by(|e| e.as_str().cmp(name)).is_ok()
    }

    fn read_entry(&mut self, name: &str) -> std::result::Result<Vec<u8>, EntryError> {
        let entry = self.zip.by_name(name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => EntryError::Missing,
            other => EntryError::Read(other.to_string()),
        })?;
        let mut out = Vec::new();
        entry
            .take(MAX_DOC_ENTRY_BYTES + 1)
            .read_to_end(&mut out)
            .map_err(|e| EntryError::Read(e.to_string()))?;
        if out.len() as u64 > MAX_DOC_ENTRY_BYTES {
            return Err(EntryError::TooLarge);
        }
        Ok(out)
    }

    /// Numeric first path components that are directories.
    fn numeric_top_level_dirs(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter_map(|e| e.split_once('/'))
            .map(|(top, _)| top)
            .filter(|top| is_digits(top))
            .map(|top| top.to_string())
            .collect()
    }

    /// Names of files directly inside `dir` (which ends with `/`).
    fn files_in(&self, dir: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.strip_prefix(dir))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Ascending numeric order for digit strings, without parsing them.
fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Extracts the patch number from a file name like `p31720429_190000_Linux-x86-64.zip`.
pub fn patch_number_from_file_name(name: &str) -> Option<String> {
    PATCH_FILE_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Opens the archive at `path` and extracts all candidate data.
///
/// `patch_number` pins the top-level directory; without it the number is
/// taken from the file name or the archive's only numeric top-level dir.
pub fn inspect(path: &Path, patch_number: Option<&str>) -> Result<Inspection> {
    let mut archive = PatchArchive::open(path)?;
    let mut warnings = Vec::new();

    let patch_file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let patch_number = resolve_patch_number(&archive, &patch_file, patch_number, &mut warnings);
    info!(archive = %path.display(), patch = %patch_number, "inspecting patch archive");

    let ids = discover_candidate_ids(&archive, &patch_number);
    if ids.is_empty() {
        return Err(ResolveError::NoCandidatesFound {
            path: path.to_path_buf(),
            patch_number,
        });
    }
    info!("found numeric subdirectories: {}", ids.join(", "));

    let patch_search = read_patch_search(&mut archive, &patch_number, &mut warnings);
    let top_dir = format!("{}/", patch_number);
    let top_level_doc = read_readmes(&mut archive, &top_dir, &mut warnings);

    let mut candidates = Vec::with_capacity(ids.len());
    for id in &ids {
        let dir = format!("{}{}/", top_dir, id);
        let documentation = read_readmes(&mut archive, &dir, &mut warnings);
        if documentation.is_none() {
            warn!("no README found for subdir {}", id);
        }
        let manifest = manifest_fragment(&mut archive, &dir, id, top_level_doc.as_deref(), &mut warnings);
        candidates.push(ComponentCandidate {
            id: id.clone(),
            documentation,
            manifest,
        });
    }

    Ok(Inspection {
        archive_path: path.to_path_buf(),
        patch_file,
        patch_number,
        candidates,
        patch_search,
        top_level_doc,
        warnings,
    })
}

fn resolve_patch_number(
    archive: &PatchArchive,
    patch_file: &str,
    explicit: Option<&str>,
    warnings: &mut Vec<String>,
) -> String {
    if let Some(n) = explicit {
        return n.to_string();
    }
    let tops = archive.numeric_top_level_dirs();
    if let Some(n) = patch_number_from_file_name(patch_file) {
        if tops.contains(&n) {
            return n;
        }
    }
    let mut tops: Vec<String> = tops.into_iter().collect();
    tops.sort_by(|a, b| id_order(a, b));
    match tops.len() {
        0 => patch_number_from_file_name(patch_file).unwrap_or_default(),
        1 => tops.remove(0),
        _ => {
            let msg = format!(
                "archive {} has several top-level patch directories ({}); using {}",
                archive.path().display(),
                tops.join(", "),
                tops[0]
            );
            warn!("{}", msg);
            warnings.push(msg);
            tops.remove(0)
        }
    }
}

/// Distinct `<patch>/<digits>/` children, ascending.
pub fn discover_candidate_ids(archive: &PatchArchive, patch_number: &str) -> Vec<String> {
    let prefix = format!("{}/", patch_number);
    let found: BTreeSet<String> = archive
        .entries()
        .iter()
        .filter_map(|e| e.strip_prefix(prefix.as_str()))
        .filter_map(|rest| rest.split_once('/'))
        .map(|(child, _)| child)
        .filter(|child| is_digits(child))
        .map(|child| child.to_string())
        .collect();
    let mut ids: Vec<String> = found.into_iter().collect();
    ids.sort_by(|a, b| id_order(a, b));
    ids
}

fn read_text(archive: &mut PatchArchive, name: &str, warnings: &mut Vec<String>) -> Option<Vec<u8>> {
    match archive.read_entry(name) {
        Ok(bytes) => Some(bytes),
        Err(EntryError::Missing) => None,
        Err(e) => {
            let msg = format!("skipping {}: {}", name, e);
            warn!("{}", msg);
            warnings.push(msg);
            None
        }
    }
}

/// Concatenated text of every README variant directly inside `dir`.
fn read_readmes(archive: &mut PatchArchive, dir: &str, warnings: &mut Vec<String>) -> Option<String> {
    let files = archive.files_in(dir);
    let mut parts = Vec::new();
    for wanted in README_NAMES {
        let Some(name) = files.iter().find(|f| f.to_lowercase() == *wanted) else {
            continue;
        };
        let full = format!("{}{}", dir, name);
        let Some(bytes) = read_text(archive, &full, warnings) else {
            continue;
        };
        let decoded = extract::decode_text(&bytes);
        let text = if wanted.ends_with(".html") || wanted.ends_with(".htm") {
            extract::html_to_text(&decoded)
        } else {
            decoded
        };
        if !text.trim().is_empty() {
            debug!("read {} ({} bytes)", full, bytes.len());
            parts.push(text.trim().to_string());
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// `bundle.xml` directly inside the candidate plus top-level README lines
/// that name the candidate id.
fn manifest_fragment(
    archive: &mut PatchArchive,
    dir: &str,
    id: &str,
    top_level_doc: Option<&str>,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let mut parts = Vec::new();

    let bundle = format!("{}{}", dir, BUNDLE_XML);
    if let Some(bytes) = read_text(archive, &bundle, warnings) {
        match extract::flatten_xml(&bytes) {
            Ok(flat) if !flat.is_empty() => parts.push(flat),
            Ok(_) => {}
            Err(e) => {
                let msg = format!("could not parse {}: {}", bundle, e);
                warn!("{}", msg);
                warnings.push(msg);
            }
        }
    }

    if let Some(doc) = top_level_doc {
        let lines: Vec<&str> = doc
            .lines()
            .filter(|l| extract::mentions_id(l, id))
            .collect();
        if !lines.is_empty() {
            parts.push(lines.join("\n"));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn read_patch_search(
    archive: &mut PatchArchive,
    patch_number: &str,
    warnings: &mut Vec<String>,
) -> Option<PatchSearchInfo> {
    let nested = format!("{}/{}", patch_number, PATCH_SEARCH);
    let name = [PATCH_SEARCH, nested.as_str()]
        .into_iter()
        .find(|n| archive.contains(n))?
        .to_string();
    let bytes = read_text(archive, &name, warnings)?;
    match extract::parse_patch_search(&bytes) {
        Ok(info) => {
            info!("abstract: {}", info.abstract_text);
            Some(info)
        }
        Err(e) => {
            let msg = format!("could not parse {}: {}", name, e);
            warn!("{}", msg);
            warnings.push(msg);
            None
        }
    }
}

/// Base64-encoded MD5 of the whole archive, the format of the registry's
/// `md5sum` field.
pub fn content_hash(path: &Path) -> Result<String> {
    let io_err = |source: std::io::Error| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(|e| ResolveError::ArchiveUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_BLOCK];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(STANDARD.encode(hasher.finalize()))
}
