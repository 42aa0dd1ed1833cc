//! Sparkify Engine
//!
//! Runs the two phases of the warehouse build on a connection owned by the
//! caller:
//! - [`SchemaReset`] drops and recreates the seven tables
//! - [`LoadPipeline`] copies staging data and fills the star schema
//!
//! Both phases share one failure policy: the failing unit is rolled back, the
//! statement is logged, and an [`EngineError`] naming the step is returned.

pub mod executor;
pub mod load_pipeline;
pub mod schema_reset;
pub mod status;

pub use executor::{run_group, EngineError};
pub use load_pipeline::{LoadPipeline, LoadPlan};
pub use schema_reset::SchemaReset;
pub use status::{table_counts, TableStatus};

use sparkify_catalog::Warehouse;
use sparkify_core::{CommitPolicy, EtlConfig, RunReport};
use sparkify_sql::StatementCatalog;

/// Options shared by both phases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub policy: CommitPolicy,
    pub truncate_staging: bool,
}

impl From<&EtlConfig> for RunOptions {
    fn from(etl: &EtlConfig) -> Self {
        Self {
            policy: etl.commit_policy,
            truncate_staging: etl.truncate_staging,
        }
    }
}

/// Reset the schema
pub async fn reset_schema(
    warehouse: &mut dyn Warehouse,
    catalog: &StatementCatalog,
    options: RunOptions,
    report: &mut RunReport,
) -> Result<(), EngineError> {
    SchemaReset::new(catalog)
        .with_policy(options.policy)
        .run(warehouse, report)
        .await
}

/// Load staging and the star schema
pub async fn load(
    warehouse: &mut dyn Warehouse,
    catalog: &StatementCatalog,
    options: RunOptions,
    report: &mut RunReport,
) -> Result<(), EngineError> {
    LoadPipeline::new(catalog)
        .with_policy(options.policy)
        .truncate_staging(options.truncate_staging)
        .run(warehouse, report)
        .await
}

/// Reset the schema, then load it, on the same connection
pub async fn run_all(
    warehouse: &mut dyn Warehouse,
    catalog: &StatementCatalog,
    options: RunOptions,
    report: &mut RunReport,
) -> Result<(), EngineError> {
    reset_schema(warehouse, catalog, options, report).await?;
    load(warehouse, catalog, options, report).await
}
