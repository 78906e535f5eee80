//! Per-run migration report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of migrating one resource type.
///
/// Always emitted at the end of a run, even when every item failed; the
/// process exit code reflects process-level fatality, not item-level errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Resource type this report covers (teams, packages, ...).
    pub resource: String,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Items processed (created, skipped, or dry-run recorded).
    pub items: Vec<ReportItem>,

    /// Item-level errors; never escalated to a run failure.
    pub errors: Vec<ReportError>,

    /// Resource-specific detail (e.g. the nested team hierarchy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// One successfully processed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportItem {
    /// Item identifier (team slug, package name+version, secret name, ...).
    pub name: String,

    /// What happened: `created`, `skipped`, `dry-run`, `uploaded`, ...
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One item-level failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportError {
    /// Item the failure belongs to.
    pub item: String,

    pub message: String,
}

impl MigrationReport {
    /// Start a report for a resource type.
    pub fn start(resource: impl Into<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            resource: resource.into(),
            dry_run,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            items: Vec::new(),
            errors: Vec::new(),
            detail: None,
        }
    }

    /// Record a processed item.
    pub fn record(&mut self, name: impl Into<String>, action: impl Into<String>) {
        self.items.push(ReportItem {
            name: name.into(),
            action: action.into(),
            detail: None,
        });
    }

    /// Record a processed item with extra detail.
    pub fn record_detail(
        &mut self,
        name: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.items.push(ReportItem {
            name: name.into(),
            action: action.into(),
            detail: Some(detail.into()),
        });
    }

    /// Record an item-level error. Processing continues with the next item.
    pub fn record_error(&mut self, item: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ReportError {
            item: item.into(),
            message: message.into(),
        });
    }

    /// Stamp completion time and duration.
    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self
    }

    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
