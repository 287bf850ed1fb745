//! Oracle release version strings.
//!
//! Releases are dotted numeric strings such as `19.3.0.0.0` (a base
//! release) or `19.21.0.0.231017` (a Release Update whose last field is a
//! `YYMMDD` date). Comparison is field-by-field on the numeric values.

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static FIVE_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d+\.\d+\.\d+\.\d+\b").unwrap());
static FOUR_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\.\d+\.\d+\.\d+\b").unwrap());

/// All five-part version tokens in `text`, in order of appearance.
pub fn find_versions(text: &str) -> Vec<&str> {
    FIVE_PART_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// The first five-part token, or failing that the first four-part one.
pub fn first_version(text: &str) -> Option<&str> {
    FIVE_PART_RE
        .find(text)
        .or_else(|| FOUR_PART_RE.find(text))
        .map(|m| m.as_str())
}

fn fields(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|f| f.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Field-wise numeric comparison; missing trailing fields compare as zero.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (fa, fb) = (fields(a), fields(b));
    let len = fa.len().max(fb.len());
    for i in 0..len {
        let x = fa.get(i).copied().unwrap_or(0);
        let y = fb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns `(earlier, later)`.
pub fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if compare(a, b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    }
}

/// 19c patches report their base as `19.0.0.0.0`; the registry records
/// it as `19.3.0.0.0`.
pub fn normalize_base_release(release: &str) -> String {
    if release == "19.0.0.0.0" {
        "19.3.0.0.0".to_string()
    } else {
        release.to_string()
    }
}

/// `<major>.0.0.0.0` for a release, e.g. `19.0.0.0.0` for `19.21.0.0.231017`.
pub fn major_base(release: &str) -> String {
    let major = release.split('.').next().unwrap_or("0");
    format!("{}.0.0.0.0", major)
}

pub fn major(release: &str) -> &str {
    release.split('.').next().unwrap_or(release)
}

pub fn is_valid(release: &str) -> bool {
    let parts: Vec<&str> = release.split('.').collect();
    (4..=5).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// The date encoded in the last field of a Release Update version.
pub fn release_date(release: &str) -> Option<NaiveDate> {
    let last = release.rsplit('.').next()?;
    if last.len() != 6 {
        return None;
    }
    NaiveDate::parse_from_str(last, "%y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_five_part_tokens_only() {
        let text = "GI RU 19.9.0.0.201020 built on 12.2.0.1 for 19.3.0.0.0";
        assert_eq!(find_versions(text), vec!["19.9.0.0.201020", "19.3.0.0.0"]);
    }

    #[test]
    fn first_version_falls_back_to_four_parts() {
        assert_eq!(first_version("RU 21.3.0.0 for Linux"), Some("21.3.0.0"));
        assert_eq!(first_version("none here"), None);
    }

    #[test]
    fn compare_is_numeric_not_lexical() {
        assert_eq!(compare("19.9.0.0.201020", "19.21.0.0.231017"), Ordering::Less);
        assert_eq!(compare("19.3.0.0.0", "19.3.0.0.0"), Ordering::Equal);
        assert_eq!(ordered("19.21.0.0.231017", "19.3.0.0.0"), ("19.3.0.0.0", "19.21.0.0.231017"));
    }

    #[test]
    fn normalizes_19c_base_only() {
        assert_eq!(normalize_base_release("19.0.0.0.0"), "19.3.0.0.0");
        assert_eq!(normalize_base_release("12.2.0.1.0"), "12.2.0.1.0");
        assert_eq!(major_base("19.21.0.0.231017"), "19.0.0.0.0");
    }

    #[test]
    fn release_date_from_suffix() {
        assert_eq!(
            release_date("19.21.0.0.231017"),
            NaiveDate::from_ymd_opt(2023, 10, 17)
        );
        assert_eq!(release_date("19.3.0.0.0"), None);
    }

    #[test]
    fn validity() {
        assert!(is_valid("19.3.0.0.0"));
        assert!(is_valid("21.3.0.0"));
        assert!(!is_valid("19.3"));
        assert!(!is_valid("19.x.0.0.0"));
    }
}
