//! Text extraction for the documents found inside patch archives.
//!
//! Archive members arrive as raw bytes; this module returns searchable UTF-8
//! text. README files may be HTML or plain text in an unknown encoding,
//! `bundle.xml` manifests are flattened to their attribute values and text,
//! and `PatchSearch.xml` yields the abstract line and base release.

use std::sync::LazyLock;

use quick_xml::events::Event;
use regex::Regex;

use crate::models::PatchSearchInfo;

/// Extraction error. Callers log it and carry on without the document.
#[derive(Debug)]
pub enum ExtractError {
    Xml(String),
    MissingAbstract,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Xml(e) => write!(f, "XML extraction failed: {}", e),
            ExtractError::MissingAbstract => write!(f, "no <abstract> element found"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Decodes bytes as UTF-8, falling back to Latin-1. Never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.strip_prefix('\u{feff}').unwrap_or(s).to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// True when `id` occurs in `text` as a whole digit run, so `11` does not
/// match inside `110`.
pub fn mentions_id(text: &str, id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let bytes = text.as_bytes();
    text.match_indices(id).any(|(start, _)| {
        let end = start + id.len();
        let before = start == 0 || !bytes[start - 1].is_ascii_digit();
        let after = end == bytes.len() || !bytes[end].is_ascii_digit();
        before && after
    })
}

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>|<!--.*?-->").unwrap()
});
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/tr|/h[1-6]|/title|/td)[^>]*>").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static NUM_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// Reduces an HTML README to its title followed by the visible text.
/// Block-level tags become line breaks so line-based scans still work.
pub fn html_to_text(html: &str) -> String {
    let title = TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(TAG_RE.replace_all(m.as_str(), "").trim()))
        .unwrap_or_default();

    let body = SCRIPT_RE.replace_all(html, " ");
    let body = BLOCK_RE.replace_all(&body, "\n");
    let body = TAG_RE.replace_all(&body, " ");
    let body = decode_entities(&body);

    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut out = title;
    for line in lines {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

fn decode_entities(s: &str) -> String {
    let s = NUM_ENTITY_RE.replace_all(s, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Flattens an XML manifest to one line per element: the element name,
/// its attribute values, and any text it holds.
pub fn flatten_xml(xml: &[u8]) -> Result<String, ExtractError> {
    let mut lines: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let mut line = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                for attr in e.attributes().flatten() {
                    if let Ok(v) = attr.unescape_value() {
                        line.push(' ');
                        line.push_str(v.as_ref());
                    }
                }
                lines.push(line);
            }
            Ok(Event::Text(te)) => {
                let text = te.unescape().unwrap_or_default();
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            }
            Ok(Event::CData(cd)) => {
                let text = decode_text(&cd.into_inner());
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(lines.join("\n"))
}

static ABSTRACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<abstract[^>]*>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</abstract>").unwrap()
});
static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<release\b[^>]*\bname\s*=\s*"([^"]*)""#).unwrap());

/// Parses `PatchSearch.xml`. Malformed XML falls back to a tolerant scan
/// for the two elements of interest.
pub fn parse_patch_search(xml: &[u8]) -> Result<PatchSearchInfo, ExtractError> {
    match parse_patch_search_strict(xml) {
        Ok(info) => Ok(info),
        Err(ExtractError::Xml(_)) => parse_patch_search_lenient(&decode_text(xml)),
        Err(e) => Err(e),
    }
}

fn parse_patch_search_strict(xml: &[u8]) -> Result<PatchSearchInfo, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_abstract = false;
    let mut abstract_text: Option<String> = None;
    let mut release_name: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"abstract" if abstract_text.is_none() => {
                    in_abstract = true;
                    abstract_text = Some(String::new());
                }
                b"release" if release_name.is_none() => {
                    release_name = attribute(&e, b"name");
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"release" && release_name.is_none() {
                    release_name = attribute(&e, b"name");
                }
            }
            Ok(Event::Text(te)) if in_abstract => {
                if let Some(a) = abstract_text.as_mut() {
                    a.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::CData(cd)) if in_abstract => {
                if let Some(a) = abstract_text.as_mut() {
                    a.push_str(&decode_text(&cd.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"abstract" {
                    in_abstract = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    match abstract_text {
        Some(a) => Ok(PatchSearchInfo {
            abstract_text: a.trim().to_string(),
            release_name,
        }),
        None => Err(ExtractError::MissingAbstract),
    }
}

fn parse_patch_search_lenient(text: &str) -> Result<PatchSearchInfo, ExtractError> {
    let abstract_text = ABSTRACT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .ok_or(ExtractError::MissingAbstract)?;
    let release_name = RELEASE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    Ok(PatchSearchInfo {
        abstract_text,
        release_name,
    })
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
