//! Validation progress reporting.
//!
//! Reports per-archive progress during `patchmeta validate` so users see
//! which combo is being checked and how many remain. Progress goes to
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for a harness run.
#[derive(Clone, Debug)]
pub enum HarnessProgressEvent {
    /// Scanning the archive directory. Total unknown.
    Indexing { dir: String },
    /// Case `n` of `total` finished with `status`.
    Checked {
        patchfile: String,
        status: &'static str,
        n: u64,
        total: u64,
    },
}

/// Reports harness progress. Called from worker threads.
pub trait HarnessProgressReporter: Send + Sync {
    fn report(&self, event: HarnessProgressEvent);
}

/// Human-friendly progress on stderr: "validate  12 / 40  PASS  p31720429_190000_Linux-x86-64.zip".
pub struct StderrProgress;

impl HarnessProgressReporter for StderrProgress {
    fn report(&self, event: HarnessProgressEvent) {
        let line = match &event {
            HarnessProgressEvent::Indexing { dir } => {
                format!("validate  indexing {}...\n", dir)
            }
            HarnessProgressEvent::Checked {
                patchfile,
                status,
                n,
                total,
            } => format!(
                "validate  {} / {}  {:<5} {}\n",
                format_number(*n),
                format_number(*total),
                status,
                patchfile
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl HarnessProgressReporter for JsonProgress {
    fn report(&self, event: HarnessProgressEvent) {
        let obj = match &event {
            HarnessProgressEvent::Indexing { dir } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "dir": dir
            }),
            HarnessProgressEvent::Checked {
                patchfile,
                status,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "checked",
                "patchfile": patchfile,
                "status": status,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl HarnessProgressReporter for NoProgress {
    fn report(&self, _event: HarnessProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn HarnessProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
