//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::schema::{Phase, StatementKind};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Final state of one executed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Executed and committed
    Committed,

    /// Executed, then discarded because a later statement in the same
    /// transaction failed
    RolledBack,

    /// The statement itself failed
    Failed,
}

/// Outcome of one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub phase: Phase,

    /// Catalog name of the statement (e.g. `songplay_table_insert`)
    pub step: String,

    pub kind: StatementKind,

    pub status: StepStatus,

    /// Rows reported by the warehouse, when it reports any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,

    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub committed: usize,
    pub rolled_back: usize,
    pub failed: usize,

    /// Sum of rows affected by committed statements
    pub rows_affected: u64,
}

/// Run report (run-report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub summary: ReportSummary,

    pub steps: Vec<StepResult>,
}

impl RunReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            started_at: Utc::now(),
            finished_at: None,
            summary: ReportSummary::default(),
            steps: Vec::new(),
        }
    }

    /// Record a step outcome
    pub fn push(&mut self, step: StepResult) {
        self.steps.push(step);
        self.recompute_summary();
    }

    /// Mark the given steps as rolled back (used when a transaction spanning
    /// several statements is abandoned)
    pub fn mark_rolled_back(&mut self, range: std::ops::Range<usize>) {
        for step in &mut self.steps[range] {
            if step.status == StepStatus::Committed {
                step.status = StepStatus::RolledBack;
            }
        }
        self.recompute_summary();
    }

    /// Mark one step as failed with `error`
    ///
    /// Used when the statement itself succeeded but the transaction holding
    /// it could not be committed.
    pub fn mark_failed(&mut self, index: usize, error: impl Into<String>) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Failed;
            step.rows_affected = None;
            step.error = Some(error.into());
        }
        self.recompute_summary();
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Check if any step failed
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    /// Steps of one phase, in execution order
    pub fn steps_for(&self, phase: Phase) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    fn recompute_summary(&mut self) {
        let mut summary = ReportSummary {
            total: self.steps.len(),
            ..ReportSummary::default()
        };

        for step in &self.steps {
            match step.status {
                StepStatus::Committed => {
                    summary.committed += 1;
                    summary.rows_affected += step.rows_affected.unwrap_or(0);
                }
                StepStatus::RolledBack => summary.rolled_back += 1,
                StepStatus::Failed => summary.failed += 1,
            }
        }

        self.summary = summary;
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
