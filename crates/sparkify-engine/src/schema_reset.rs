//! Schema reset phase
//!
//! Drops every table, then recreates every table. Dropping a table that does
//! not exist is not an error, so the phase can run against a fresh cluster.

use sparkify_catalog::Warehouse;
use sparkify_core::{CommitPolicy, Phase, RunReport};
use sparkify_sql::{Statement, StatementCatalog};

use crate::executor::{run_group, EngineError};

pub struct SchemaReset<'a> {
    catalog: &'a StatementCatalog,
    policy: CommitPolicy,
}

impl<'a> SchemaReset<'a> {
    pub fn new(catalog: &'a StatementCatalog) -> Self {
        Self {
            catalog,
            policy: CommitPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CommitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Every drop followed by every create, in execution order
    pub fn statements(&self) -> Vec<Statement> {
        let mut statements = self.catalog.drop_statements();
        statements.extend(self.catalog.create_statements());
        statements
    }

    /// Run all drops, then all creates
    ///
    /// Under [`CommitPolicy::SingleTransaction`] the whole reset is one
    /// transaction, so a failed create also restores the dropped tables.
    pub async fn run(
        &self,
        warehouse: &mut dyn Warehouse,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        tracing::info!(policy = %self.policy, "Resetting schema");

        let statements = self.statements();
        run_group(warehouse, Phase::SchemaReset, &statements, self.policy, report).await?;

        tracing::info!(tables = self.catalog.tables().len(), "Schema created");
        Ok(())
    }
}
