//! JSON-lines audit sink
//!
//! Events are written synchronously, one JSON object per line, to the audit
//! file and optionally mirrored to stdout. Writes are serialized through a
//! mutex so concurrent request handlers never interleave lines.

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Append-only JSON-lines writer
pub struct JsonLinesSink {
    file: Mutex<File>,
    to_stdout: bool,
}

impl JsonLinesSink {
    /// Open (or create) the audit file for appending
    pub fn open(path: impl AsRef<Path>, to_stdout: bool) -> AuditResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Mutex::new(file),
            to_stdout,
        })
    }

    /// Write one event as a single line
    pub fn write(&self, event: &AuditEvent) -> AuditResult<()> {
        let line = serde_json::to_string(event)?;

        {
            let mut file = self.file.lock().map_err(|_| AuditError::SinkPoisoned)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.flush()?;
        }

        if self.to_stdout {
            println!("{}", line);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventStatus, EventType};

    #[test]
    fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let sink = JsonLinesSink::open(&path, false).unwrap();

        sink.write(
            &AuditEvent::new(EventType::McpRequest, "alice", "list_tools")
                .with_status(EventStatus::Success),
        )
        .unwrap();
        sink.write(
            &AuditEvent::new(EventType::McpRequest, "bob", "invoke_tool")
                .with_status(EventStatus::Error)
                .with_error("boom"),
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["subject"], "alice");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["error"], "boom");
    }

    #[test]
    fn append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");

        {
            let sink = JsonLinesSink::open(&path, false).unwrap();
            sink.write(&AuditEvent::new(EventType::Authentication, "a", "token_verify"))
                .unwrap();
        }
        {
            let sink = JsonLinesSink::open(&path, false).unwrap();
            sink.write(&AuditEvent::new(EventType::Authentication, "b", "token_verify"))
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
