//! Load pipeline phase
//!
//! Copies the raw files into the staging tables, then fills the fact and
//! dimension tables from staging. Step order comes from the [`LoadGraph`],
//! which puts both copies ahead of every insert that reads them.

use sparkify_catalog::Warehouse;
use sparkify_core::{CommitPolicy, Phase, RunReport};
use sparkify_sql::{LoadGraph, LoadStep, Statement, StatementCatalog};

use crate::executor::{run_group, EngineError};

/// Statements of one load, in execution order
#[derive(Debug, Clone)]
pub struct LoadPlan {
    /// Staging clears, present only when `truncate_staging` is set
    ///
    /// `TRUNCATE` under the per-statement policy, `DELETE FROM` inside a
    /// single transaction since `TRUNCATE` would commit it early.
    pub truncates: Vec<Statement>,

    /// Copies and inserts in dependency order
    pub steps: Vec<Statement>,
}

impl LoadPlan {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.truncates.iter().chain(self.steps.iter())
    }

    pub fn len(&self) -> usize {
        self.truncates.len() + self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct LoadPipeline<'a> {
    catalog: &'a StatementCatalog,
    policy: CommitPolicy,
    truncate_staging: bool,
}

impl<'a> LoadPipeline<'a> {
    pub fn new(catalog: &'a StatementCatalog) -> Self {
        Self {
            catalog,
            policy: CommitPolicy::default(),
            truncate_staging: false,
        }
    }

    pub fn with_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Empty the staging tables before copying into them
    pub fn truncate_staging(mut self, enabled: bool) -> Self {
        self.truncate_staging = enabled;
        self
    }

    pub fn plan(&self) -> Result<LoadPlan, EngineError> {
        let graph = self.catalog.load_graph()?;
        Ok(self.plan_from(&graph))
    }

    fn plan_from(&self, graph: &LoadGraph) -> LoadPlan {
        let truncates = match (self.truncate_staging, self.policy) {
            (false, _) => Vec::new(),
            (true, CommitPolicy::PerStatement) => self.catalog.truncate_staging_statements(),
            (true, CommitPolicy::SingleTransaction) => self.catalog.delete_staging_statements(),
        };

        LoadPlan {
            truncates,
            steps: graph
                .ordered_steps()
                .into_iter()
                .map(|step: &LoadStep| step.statement.clone())
                .collect(),
        }
    }

    /// Run the load against a schema created by the reset phase
    ///
    /// Rows are appended. Without `truncate_staging`, loading twice doubles
    /// every table.
    pub async fn run(
        &self,
        warehouse: &mut dyn Warehouse,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let graph = self.catalog.load_graph()?;
        let plan = self.plan_from(&graph);
        let statements: Vec<Statement> = plan.statements().cloned().collect();

        tracing::info!(
            policy = %self.policy,
            steps = statements.len(),
            truncate_staging = self.truncate_staging,
            "Loading"
        );

        let result = run_group(warehouse, Phase::LoadPipeline, &statements, self.policy, report).await;

        if let Err(e) = &result {
            if let Some(step) = e.failed_step() {
                let blocked = graph.downstream(step);
                if !blocked.is_empty() {
                    tracing::warn!(step, blocked = ?blocked, "Skipped steps that depend on the failed step");
                }
            }
        }

        result?;
        tracing::info!("Load complete");
        Ok(())
    }
}
