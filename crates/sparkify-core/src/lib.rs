//! Sparkify Core
//!
//! Configuration, table model and the versioned run report shared by the
//! other crates. The report format is part of the public API.

pub mod config;
pub mod schema;
pub mod report;

pub use config::{Config, ConfigError, ClusterConfig, CommitPolicy, EtlConfig, S3Config};
pub use schema::{Phase, StatementKind, TableDef, TableRole};
pub use report::{RunReport, ReportSummary, ReportVersion, StepResult, StepStatus};
