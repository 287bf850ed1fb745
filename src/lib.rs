//! # patchmeta
//!
//! Resolves the registry metadata of an Oracle combo Release Update archive
//! (an OJVM component bundled with a GI or DB Release Update) straight from
//! the zip, without unpacking it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  archive  │──▶│  classify  │──▶│   emit   │
//! │ (inspect) │   │  (cascade) │   │ report/  │
//! └───────────┘   └────────────┘   │ snippets │
//!       ▲                          └──────────┘
//!       │
//! ┌─────┴─────┐   ┌────────────┐
//! │  harness  │◀──│  registry  │
//! └───────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! patchmeta parse p31720429_190000_Linux-x86-64.zip
//! patchmeta parse p31720429_190000_Linux-x86-64.zip --json
//! patchmeta hash p31720429_190000_Linux-x86-64.zip
//! patchmeta validate --archive-dir ./patch_test_temp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`archive`] | Zip listing, bounded reads, candidate discovery, content hash |
//! | [`extract`] | README / XML text extraction |
//! | [`classify`] | OJVM vs. OTHER rule cascade and release derivation |
//! | [`emit`] | Report, registry snippets, JSON |
//! | [`resolve`] | One archive to one record |
//! | [`registry`] | Registry YAML loading and combo grouping |
//! | [`harness`] | Regression run against the registry |
//! | [`opatch`] | OPatch utility file naming and URL selection |
//! | [`config`] | TOML configuration parsing |

pub mod archive;
pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod harness;
pub mod models;
pub mod opatch;
pub mod progress;
pub mod registry;
pub mod resolve;
pub mod version;

pub use error::{ResolveError, Result};
pub use resolve::resolve;
