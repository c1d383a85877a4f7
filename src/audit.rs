// ==============================================================================
// audit.rs - Audit Trail for Cohort Runs
// ==============================================================================
// Description: Append-only JSON-lines record of every run, input file and
//              output file, with input checksums
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-19
// Version: 2.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Audit file name inside the output directory
pub const AUDIT_LOG_FILE: &str = "audit.jsonl";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to write audit log {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    RunStarted,
    FileProcessed,
    FileSkipped,
    OutputWritten,
    RunCompleted,
    RunFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub resource: Option<String>,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

impl AuditEvent {
    pub fn new(
        run_id: Uuid,
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let severity = match event_type {
            AuditEventType::FileSkipped => LogSeverity::Warning,
            AuditEventType::RunFailed => LogSeverity::Error,
            _ => LogSeverity::Info,
        };

        Self {
            id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            event_type,
            resource,
            details,
            severity,
        }
    }
}

/// Append-only audit file, one JSON event per line
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    run_id: Uuid,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, run_id: Uuid) -> Self {
        Self {
            path: path.into(),
            run_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Build and append an event for this run
    pub fn log(
        &self,
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Result<(), AuditError> {
        self.append(&AuditEvent::new(self.run_id, event_type, resource, details))
    }

    pub fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let io_error = |source: std::io::Error| AuditError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).map_err(io_error)?;

        Ok(())
    }
}

/// Hex SHA-256 of a file's bytes, as stored (compressed files are not inflated)
pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_audit_event_creation() {
        let run_id = Uuid::new_v4();
        let event = AuditEvent::new(
            run_id,
            AuditEventType::FileProcessed,
            Some("SAMPLE1.vcf".to_string()),
            serde_json::json!({ "records": 3 }),
        );

        assert_eq!(event.run_id, run_id);
        assert_eq!(event.resource.as_deref(), Some("SAMPLE1.vcf"));
        assert_eq!(event.severity, LogSeverity::Info);
    }

    #[test]
    fn test_event_severity() {
        let skipped = AuditEvent::new(Uuid::nil(), AuditEventType::FileSkipped, None, serde_json::json!({}));
        assert_eq!(skipped.severity, LogSeverity::Warning);

        let failed = AuditEvent::new(Uuid::nil(), AuditEventType::RunFailed, None, serde_json::json!({}));
        assert_eq!(failed.severity, LogSeverity::Error);
    }

    #[test]
    fn test_append_writes_json_lines() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("nested").join(AUDIT_LOG_FILE), Uuid::new_v4());

        log.log(AuditEventType::RunStarted, None, serde_json::json!({ "files": 2 }))
            .unwrap();
        log.log(AuditEventType::RunCompleted, None, serde_json::json!({}))
            .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let events: Vec<AuditEvent> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::RunStarted);
        assert_eq!(events[0].details["files"], 2);
        assert_eq!(events[1].event_type, AuditEventType::RunCompleted);
        assert!(contents.contains("\"run_started\""));
    }

    #[test]
    fn test_file_sha256() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        assert_eq!(
            file_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
