//! Warehouse adapters
//!
//! This crate provides the connection the loader runs its statements on:
//! - [`PostgresWarehouse`] - Amazon Redshift or PostgreSQL over tokio-postgres
//! - [`MockWarehouse`] - in-memory stand-in for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use sparkify_catalog::{PostgresWarehouse, Warehouse};
//!
//! let mut warehouse = PostgresWarehouse::open(&config.cluster, config.etl.tls).await?;
//! warehouse.test_connection().await?;
//! let users = warehouse.count_rows("users").await?;
//! warehouse.close().await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod postgres;

pub use adapter::{quote_ident, Warehouse, WarehouseError};
pub use mock::{MockCall, MockTables, MockWarehouse, Projection};
pub use postgres::PostgresWarehouse;
