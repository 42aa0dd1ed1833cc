//! SQL statement catalog
//!
//! This crate holds:
//! - The DDL of the seven Sparkify tables
//! - COPY statements rendered from configuration
//! - The insert-from-staging statements
//! - The schema as ordered, checksummed migrations
//! - The load dependency graph that orders copies and inserts

pub mod catalog;
pub mod copy;
pub mod dag;
pub mod inserts;
pub mod migration;
pub mod tables;

pub use catalog::{CatalogError, Statement, StatementCatalog};
pub use copy::{CopySource, JsonFormat};
pub use dag::{LoadGraph, LoadStep};
pub use inserts::InsertStep;
pub use migration::Migration;
