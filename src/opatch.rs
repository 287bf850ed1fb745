//! OPatch utility lookups.
//!
//! The OPatch utility ships as its own patch (`6880880`) with one download
//! per base release and platform. Fetching it is left to the caller; this
//! module only names the expected file and picks the right URL out of a
//! search result list.

use std::sync::LazyLock;

use regex::Regex;

use crate::version;

/// Patch number of the generic OPatch utility.
pub const OPATCH_PATCHNUM: u32 = 6880880;

pub const DEFAULT_PLATFORM: &str = "Linux-x86-64";

static PATCH_FILE_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"patch_file=([^&]+)").unwrap());

/// `p6880880_190000_Linux-x86-64.zip` for a 19c base release.
pub fn expected_file_name(patchnum: u32, base_release: &str, platform: &str) -> String {
    format!(
        "p{}_{}0000_{}.zip",
        patchnum,
        version::major(base_release),
        platform
    )
}

/// Picks the download URL for `base_release`: the exact file name first,
/// then `release=<major>` paired with the platform, then any URL for the
/// platform.
pub fn select_download_url<'a>(
    urls: &'a [String],
    patchnum: u32,
    base_release: &str,
    platform: &str,
) -> Option<&'a str> {
    let major = regex::escape(version::major(base_release));
    let plat = regex::escape(platform);
    let patterns = [
        format!(r"(?i)p{}_{}0000_{}\.zip", patchnum, major, plat),
        format!(r"(?i)release={}.*{}", major, plat),
        format!(r"(?i){}.*release={}", plat, major),
    ];
    let compiled: Vec<Regex> = patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();

    for re in &compiled {
        if let Some(url) = urls.iter().find(|u| re.is_match(u)) {
            return Some(url.as_str());
        }
    }
    let generic = platform.to_lowercase();
    urls.iter()
        .find(|u| u.to_lowercase().contains(&generic))
        .map(String::as_str)
}

/// The `patch_file` query parameter of a download URL.
pub fn file_name_from_url(url: &str) -> Option<String> {
    PATCH_FILE_PARAM_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> Vec<String> {
        vec![
            "https://updates.oracle.com/Orion/Download/process_form/p6880880_122010_Linux-x86-64.zip?file_id=1&aru=2&patch_file=p6880880_122010_Linux-x86-64.zip".to_string(),
            "https://updates.oracle.com/Orion/Download/process_form/p6880880_190000_Linux-x86-64.zip?file_id=3&aru=4&patch_file=p6880880_190000_Linux-x86-64.zip".to_string(),
            "https://updates.oracle.com/Orion/Download/process_form?release=23&plat=Linux-x86-64&patch_file=p6880880_230000_Linux-x86-64.zip".to_string(),
        ]
    }

    #[test]
    fn expected_name_uses_major_release() {
        assert_eq!(
            expected_file_name(OPATCH_PATCHNUM, "19.3.0.0.0", DEFAULT_PLATFORM),
            "p6880880_190000_Linux-x86-64.zip"
        );
    }

    #[test]
    fn exact_file_name_wins() {
        let urls = urls();
        let url = select_download_url(&urls, OPATCH_PATCHNUM, "19.3.0.0.0", DEFAULT_PLATFORM).unwrap();
        assert_eq!(
            file_name_from_url(url).as_deref(),
            Some("p6880880_190000_Linux-x86-64.zip")
        );
    }

    #[test]
    fn release_query_pattern_is_second_choice() {
        let urls = urls();
        let url = select_download_url(&urls, OPATCH_PATCHNUM, "23.4.0.24.05", DEFAULT_PLATFORM).unwrap();
        assert!(url.contains("release=23"));
    }

    #[test]
    fn falls_back_to_any_platform_url() {
        let urls = urls();
        let url = select_download_url(&urls, OPATCH_PATCHNUM, "11.2.0.4.0", DEFAULT_PLATFORM).unwrap();
        assert_eq!(url, urls[0]);
        assert_eq!(select_download_url(&urls, OPATCH_PATCHNUM, "19.3.0.0.0", "AIX"), None);
    }
}
