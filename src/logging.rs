//! Append-only activity log.
//!
//! Each record is one JSON line with the event kind, the acting display
//! name, free-form detail and a local timestamp. The log is a write-only
//! collaborator: failures are swallowed, so an unwritable path never
//! interferes with routing.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct Record<'a> {
    time: String,
    kind: &'a str,
    actor: &'a str,
    detail: &'a str,
}

pub struct ActivityLog {
    out: Mutex<Option<File>>,
}

impl ActivityLog {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Mutex::new(Some(file)),
        })
    }

    /// A log that discards every record.
    pub fn disabled() -> Self {
        Self {
            out: Mutex::new(None),
        }
    }

    /// Append one record, best-effort.
    pub fn record(&self, kind: &str, actor: &str, detail: &str) {
        let record = Record {
            time: chrono::Local::now().format(TIME_FORMAT).to_string(),
            kind,
            actor,
            detail,
        };
        if let Some(file) = self.out.lock().unwrap().as_mut() {
            if let Ok(line) = serde_json::to_string(&record) {
                let _ = writeln!(file, "{}", line);
            }
        }
    }
}
