//! Fatal conditions of a single resolve run.
//!
//! Every variant carries the archive path (and subdirectory ids where they
//! matter) so a failure can be diagnosed from the message alone. An
//! ambiguous classification is not an error; it surfaces through
//! [`Resolution::warnings`](crate::models::Resolution).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot read patch archive {}: {reason}", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    #[error(
        "no numeric component subdirectories under '{patch_number}/' in {}",
        path.display()
    )]
    NoCandidatesFound { path: PathBuf, patch_number: String },

    #[error(
        "expected exactly 2 component subdirectories in {}, found {found}: [{}]",
        path.display(),
        subdirs.join(", ")
    )]
    UnsupportedComponentCount {
        path: PathBuf,
        found: usize,
        subdirs: Vec<String>,
    },

    #[error("no release version string found anywhere in {}", path.display())]
    VersionNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_error_names_every_subdir() {
        let err = ResolveError::UnsupportedComponentCount {
            path: PathBuf::from("p1_190000_Linux-x86-64.zip"),
            found: 3,
            subdirs: vec!["11".into(), "22".into(), "33".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("found 3"));
        assert!(msg.contains("[11, 22, 33]"));
        assert!(msg.contains("p1_190000_Linux-x86-64.zip"));
    }

    #[test]
    fn no_candidates_names_patch_dir() {
        let err = ResolveError::NoCandidatesFound {
            path: PathBuf::from("a.zip"),
            patch_number: "31720429".into(),
        };
        assert!(err.to_string().contains("'31720429/'"));
    }
}
