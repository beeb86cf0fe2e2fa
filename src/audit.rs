// ==============================================================================
// audit.rs - Audit Logging for Analysis Runs
// ==============================================================================
// Description: Audit trail for file validation, analysis and report output
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-10-18
// Version: 1.1.0
// Compliance: HIPAA § 164.312(b), GDPR Article 30
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // File operations
    FileValidated,
    FileRejected,

    // Processing events
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
    AnalysisCancelled,

    // Output events
    ReportWritten,
    ResultStored,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::FileValidated => "file_validated",
            AuditEventType::FileRejected => "file_rejected",
            AuditEventType::AnalysisStarted => "analysis_started",
            AuditEventType::AnalysisCompleted => "analysis_completed",
            AuditEventType::AnalysisFailed => "analysis_failed",
            AuditEventType::AnalysisCancelled => "analysis_cancelled",
            AuditEventType::ReportWritten => "report_written",
            AuditEventType::ResultStored => "result_stored",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub analysis_id: Option<String>,
    pub resource: Option<String>,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

/// Persistent destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        analysis_id: Option<String>,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let severity = match event_type {
            AuditEventType::FileRejected | AuditEventType::AnalysisCancelled => LogSeverity::Warning,
            AuditEventType::AnalysisFailed => LogSeverity::Error,
            _ => LogSeverity::Info,
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            analysis_id,
            resource,
            details,
            severity,
        }
    }

    /// Emit through tracing and, if present, persist to `sink`.
    /// Sink failures are logged, never propagated.
    pub fn log(&self, sink: Option<&dyn AuditSink>) {
        let analysis_id = self.analysis_id.as_deref().unwrap_or("-");
        let resource = self.resource.as_deref().unwrap_or("-");

        match self.severity {
            LogSeverity::Info => info!(
                audit = self.event_type.as_str(),
                analysis_id, resource, details = %self.details, "Audit event"
            ),
            LogSeverity::Warning => warn!(
                audit = self.event_type.as_str(),
                analysis_id, resource, details = %self.details, "Audit event"
            ),
            LogSeverity::Error | LogSeverity::Critical => error!(
                audit = self.event_type.as_str(),
                analysis_id, resource, details = %self.details, "Audit event"
            ),
        }

        if let Some(sink) = sink {
            if let Err(e) = sink.record(self) {
                warn!("Failed to persist audit event {}: {:#}", self.id, e);
            }
        }
    }
}

/// Convenience function to build and log an audit event
pub fn log_event(
    sink: Option<&dyn AuditSink>,
    event_type: AuditEventType,
    analysis_id: &str,
    resource: Option<String>,
    details: serde_json::Value,
) {
    AuditEvent::new(event_type, Some(analysis_id.to_string()), resource, details).log(sink);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecSink(Mutex<Vec<AuditEvent>>);

    impl AuditSink for VecSink {
        fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(
            AuditEventType::FileValidated,
            Some("analysis-1".to_string()),
            Some("sample.vcf".to_string()),
            serde_json::json!({
                "size": 5242880,
                "hash": "abc123"
            }),
        );

        assert_eq!(event.analysis_id, Some("analysis-1".to_string()));
        assert_eq!(event.resource, Some("sample.vcf".to_string()));
        assert_eq!(event.severity, LogSeverity::Info);
    }

    #[test]
    fn test_failure_severity() {
        let failed = AuditEvent::new(AuditEventType::AnalysisFailed, None, None, serde_json::json!({}));
        assert_eq!(failed.severity, LogSeverity::Error);

        let rejected = AuditEvent::new(AuditEventType::FileRejected, None, None, serde_json::json!({}));
        assert_eq!(rejected.severity, LogSeverity::Warning);
    }

    #[test]
    fn test_log_persists_to_sink() {
        let sink = VecSink::default();
        log_event(
            Some(&sink),
            AuditEventType::AnalysisStarted,
            "analysis-2",
            None,
            serde_json::json!({"source": "reader"}),
        );

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::AnalysisStarted);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        AuditEvent::new(AuditEventType::ResultStored, None, None, serde_json::json!({})).log(Some(&FailingSink));
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&AuditEventType::AnalysisCompleted).unwrap();
        assert_eq!(json, "\"analysis_completed\"");
    }
}
