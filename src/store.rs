// ==============================================================================
// store.rs - Analysis Result Cache
// ==============================================================================
// Description: put/get cache of analysis results (in-memory or SQLite)
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// SQLite schema:
//   analysis_results(analysis_id PK, created_at, status, result_json)
//   audit_events(id PK, timestamp, event_type, analysis_id, resource,
//                details_json, severity)
// ==============================================================================

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::audit::{AuditEvent, AuditSink};
use crate::models::AnalysisResult;

/// Result cache keyed by analysis id. No eviction.
pub trait ResultStore: Send + Sync {
    fn put(&self, analysis_id: &str, result: &AnalysisResult) -> Result<()>;
    fn get(&self, analysis_id: &str) -> Result<Option<AnalysisResult>>;
}

#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<String, AnalysisResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, analysis_id: &str, result: &AnalysisResult) -> Result<()> {
        self.results
            .lock()
            .map_err(|_| anyhow!("Result cache lock poisoned"))?
            .insert(analysis_id.to_string(), result.clone());
        Ok(())
    }

    fn get(&self, analysis_id: &str) -> Result<Option<AnalysisResult>> {
        Ok(self
            .results
            .lock()
            .map_err(|_| anyhow!("Result cache lock poisoned"))?
            .get(analysis_id)
            .cloned())
    }
}

/// SQLite-backed cache with an audit table
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open (or create) the store database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open result store {}", path.as_ref().display()))?;
        let store = Self::init(conn)?;
        info!("Opened result store: {}", path.as_ref().display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Failed to open in-memory result store")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                 analysis_id TEXT PRIMARY KEY,
                 created_at  TEXT NOT NULL,
                 status      TEXT NOT NULL,
                 result_json TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS audit_events (
                 id           TEXT PRIMARY KEY,
                 timestamp    TEXT NOT NULL,
                 event_type   TEXT NOT NULL,
                 analysis_id  TEXT,
                 resource     TEXT,
                 details_json TEXT NOT NULL,
                 severity     TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_audit_analysis ON audit_events(analysis_id);",
        )
        .context("Failed to create result store schema")?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("Result store lock poisoned"))
    }

    pub fn result_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: usize = conn.query_row("SELECT COUNT(*) FROM analysis_results", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Audit event types recorded for one analysis, oldest first
    pub fn audit_trail(&self, analysis_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT event_type FROM audit_events
             WHERE analysis_id = ?1
             ORDER BY timestamp, rowid",
        )?;
        let rows = stmt.query_map(params![analysis_id], |row| row.get::<_, String>(0))?;

        let mut events = Vec::new();
        for event in rows {
            events.push(event?);
        }
        Ok(events)
    }
}

impl ResultStore for SqliteResultStore {
    fn put(&self, analysis_id: &str, result: &AnalysisResult) -> Result<()> {
        let json = serde_json::to_string(result).context("Failed to serialize analysis result")?;
        let status = if result.is_success() { "completed" } else { "failed" };

        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO analysis_results (analysis_id, created_at, status, result_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![analysis_id, result.timestamp.to_rfc3339(), status, json],
            )
            .context("Failed to store analysis result")?;

        debug!("Stored analysis result {}", analysis_id);
        Ok(())
    }

    fn get(&self, analysis_id: &str) -> Result<Option<AnalysisResult>> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT result_json FROM analysis_results WHERE analysis_id = ?1",
                params![analysis_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).context("Failed to deserialize stored analysis result"))
            .transpose()
    }
}

impl AuditSink for SqliteResultStore {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO audit_events (id, timestamp, event_type, analysis_id, resource, details_json, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id.to_string(),
                    event.timestamp.to_rfc3339(),
                    event.event_type.as_str(),
                    event.analysis_id,
                    event.resource,
                    event.details.to_string(),
                    event.severity.as_str(),
                ],
            )
            .context("Failed to insert audit event")?;
        Ok(())
    }
}
