//! Structured audit log.
//!
//! Error events announced to the operator via tracing are mirrored here
//! as one JSON line each, so incidents can be replayed after the fact
//! without scraping console output.

use crate::error::AppResult;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    time: String,
    code: &'a str,
    message: &'a str,
}

/// Append-only JSON-lines audit log.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn init(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Touch the file so permission problems surface at startup.
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    /// Record one error event. Failures to write are logged and
    /// swallowed; the audit log must never take the bot down.
    pub fn record(&self, code: &str, message: &str) {
        let entry = AuditEntry {
            time: chrono::Utc::now().to_rfc3339(),
            code,
            message,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Audit entry serialization failed");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = result {
            warn!(error = %e, "Audit log write failed");
        }
    }
}
