//! One archive in, one record out.

use std::path::Path;

use tracing::info;

use crate::archive;
use crate::classify;
use crate::error::Result;
use crate::models::{PatchMetadataRecord, Resolution};

/// Inspects, classifies, and hashes the archive at `path`.
///
/// Re-running on byte-identical content yields an identical [`Resolution`].
pub fn resolve(path: &Path, patch_number: Option<&str>) -> Result<Resolution> {
    let inspection = archive::inspect(path, patch_number)?;
    let classification = classify::classify(&inspection)?;

    info!("calculating MD5 for {}", path.display());
    let content_hash = archive::content_hash(path)?;

    let mut warnings = inspection.warnings.clone();
    warnings.extend(classification.warnings);

    let record = PatchMetadataRecord {
        patch_number: inspection.patch_number.clone(),
        base_release: classification.base_release,
        patch_release: classification.patch_release,
        subdir_classification: classification.labels,
        content_hash,
        abstract_text: inspection.abstract_text().to_string(),
        ambiguous: classification.ambiguous,
    };

    Ok(Resolution {
        record,
        warnings,
        patch_file: inspection.patch_file,
    })
}
