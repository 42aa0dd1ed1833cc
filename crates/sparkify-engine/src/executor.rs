//! Statement group execution under a commit policy
//!
//! Both phases run their statements through [`run_group`], so a failure is
//! handled the same way everywhere: the open transaction is rolled back, the
//! statement is logged with its SQL, and the remaining statements are skipped.

use std::time::Instant;

use sparkify_catalog::{Warehouse, WarehouseError};
use sparkify_core::{CommitPolicy, Phase, RunReport, StatementKind, StepResult, StepStatus};
use sparkify_sql::Statement;

/// Errors raised while running a phase
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{phase} failed at {step}: {source}")]
    StatementFailed {
        phase: Phase,
        step: String,
        sql: String,
        source: WarehouseError,
    },

    #[error("{phase} failed at {step} ({original}), and the rollback failed too: {source}")]
    RollbackFailed {
        phase: Phase,
        step: String,
        original: WarehouseError,
        source: WarehouseError,
    },

    #[error("Failed to build statements: {0}")]
    Catalog(#[from] sparkify_sql::CatalogError),
}

impl EngineError {
    /// Name of the statement that failed, if a statement failed
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StatementFailed { step, .. } | Self::RollbackFailed { step, .. } => Some(step),
            Self::Catalog(_) => None,
        }
    }
}

/// Run `statements` in order under `policy`, recording each outcome
pub async fn run_group(
    warehouse: &mut dyn Warehouse,
    phase: Phase,
    statements: &[Statement],
    policy: CommitPolicy,
    report: &mut RunReport,
) -> Result<(), EngineError> {
    match policy {
        CommitPolicy::PerStatement => run_per_statement(warehouse, phase, statements, report).await,
        CommitPolicy::SingleTransaction => run_single_transaction(warehouse, phase, statements, report).await,
    }
}

async fn run_per_statement(
    warehouse: &mut dyn Warehouse,
    phase: Phase,
    statements: &[Statement],
    report: &mut RunReport,
) -> Result<(), EngineError> {
    for statement in statements {
        let started = Instant::now();

        if let Err(e) = warehouse.begin().await {
            log_failure(phase, statement, &e);
            report.push(step_result(phase, statement, StepStatus::Failed, None, started, Some(&e)));
            return Err(statement_failed(phase, statement, e));
        }

        let outcome = match warehouse.execute(&statement.sql).await {
            Ok(rows) => warehouse.commit().await.map(|_| rows),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(rows) => {
                let rows = reported_rows(statement.kind, rows);
                tracing::info!(phase = %phase, step = %statement.name, rows = ?rows, "Committed");
                report.push(step_result(phase, statement, StepStatus::Committed, rows, started, None));
            }
            Err(e) => {
                log_failure(phase, statement, &e);
                report.push(step_result(phase, statement, StepStatus::Failed, None, started, Some(&e)));
                return Err(roll_back(warehouse, phase, statement, e).await);
            }
        }
    }

    Ok(())
}

async fn run_single_transaction(
    warehouse: &mut dyn Warehouse,
    phase: Phase,
    statements: &[Statement],
    report: &mut RunReport,
) -> Result<(), EngineError> {
    let Some(first) = statements.first() else {
        return Ok(());
    };

    if let Err(e) = warehouse.begin().await {
        log_failure(phase, first, &e);
        report.push(step_result(phase, first, StepStatus::Failed, None, Instant::now(), Some(&e)));
        return Err(statement_failed(phase, first, e));
    }

    // Steps are recorded as committed and demoted if the transaction is abandoned
    let group_start = report.steps.len();

    for statement in statements {
        let started = Instant::now();

        match warehouse.execute(&statement.sql).await {
            Ok(rows) => {
                let rows = reported_rows(statement.kind, rows);
                tracing::debug!(phase = %phase, step = %statement.name, rows = ?rows, "Executed");
                report.push(step_result(phase, statement, StepStatus::Committed, rows, started, None));
            }
            Err(e) => {
                log_failure(phase, statement, &e);
                let failed_at = report.steps.len();
                report.push(step_result(phase, statement, StepStatus::Failed, None, started, Some(&e)));
                report.mark_rolled_back(group_start..failed_at);
                return Err(roll_back(warehouse, phase, statement, e).await);
            }
        }
    }

    // A failed commit is charged to the last statement; the rest were discarded
    if let Err(e) = warehouse.commit().await {
        let last = statements.last().unwrap_or(first);
        log_failure(phase, last, &e);
        let last_at = report.steps.len() - 1;
        report.mark_rolled_back(group_start..last_at);
        report.mark_failed(last_at, e.to_string());
        return Err(roll_back(warehouse, phase, last, e).await);
    }

    tracing::info!(phase = %phase, statements = statements.len(), "Committed transaction");
    Ok(())
}

/// Roll back after `original` and build the error to return
async fn roll_back(
    warehouse: &mut dyn Warehouse,
    phase: Phase,
    statement: &Statement,
    original: WarehouseError,
) -> EngineError {
    match warehouse.rollback().await {
        Ok(()) => {
            tracing::warn!(phase = %phase, step = %statement.name, "Rolled back");
            statement_failed(phase, statement, original)
        }
        Err(source) => {
            tracing::error!(phase = %phase, step = %statement.name, error = %source, "Rollback failed");
            EngineError::RollbackFailed {
                phase,
                step: statement.name.clone(),
                original,
                source,
            }
        }
    }
}

fn statement_failed(phase: Phase, statement: &Statement, source: WarehouseError) -> EngineError {
    EngineError::StatementFailed {
        phase,
        step: statement.name.clone(),
        sql: statement.sql.clone(),
        source,
    }
}

fn log_failure(phase: Phase, statement: &Statement, error: &WarehouseError) {
    tracing::error!(
        phase = %phase,
        step = %statement.name,
        error = %error,
        "Error executing query:\n{}",
        statement.sql
    );
}

/// Row counts are only meaningful for statements that move data
fn reported_rows(kind: StatementKind, rows: u64) -> Option<u64> {
    match kind {
        StatementKind::Copy | StatementKind::Insert => Some(rows),
        StatementKind::Drop | StatementKind::Create | StatementKind::Truncate => None,
    }
}

fn step_result(
    phase: Phase,
    statement: &Statement,
    status: StepStatus,
    rows_affected: Option<u64>,
    started: Instant,
    error: Option<&WarehouseError>,
) -> StepResult {
    StepResult {
        phase,
        step: statement.name.clone(),
        kind: statement.kind,
        status,
        rows_affected,
        duration_ms: started.elapsed().as_millis() as u64,
        error: error.map(ToString::to_string),
    }
}
