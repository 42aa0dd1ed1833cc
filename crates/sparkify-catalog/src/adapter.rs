//! Warehouse adapter trait for running statements

/// Errors that can occur while talking to the warehouse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WarehouseError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection is closed")]
    Closed,
}

/// A live connection to a warehouse
///
/// Implementations hold exactly one session. Statements run one at a time in
/// the order they are issued; outside `begin`/`commit` each statement commits
/// on its own.
#[async_trait::async_trait]
pub trait Warehouse: Send {
    /// Get the adapter name (e.g., "PostgreSQL", "Mock")
    fn name(&self) -> &'static str;

    /// Execute one statement, returning the rows it reports as affected
    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError>;

    /// Open a transaction
    async fn begin(&mut self) -> Result<(), WarehouseError>;

    /// Commit the open transaction
    async fn commit(&mut self) -> Result<(), WarehouseError>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> Result<(), WarehouseError>;

    /// Check whether a table exists in the public schema
    async fn table_exists(&mut self, table: &str) -> Result<bool, WarehouseError>;

    /// Count the rows of a table
    async fn count_rows(&mut self, table: &str) -> Result<u64, WarehouseError>;

    /// Test the connection to the warehouse
    ///
    /// This is useful for validating credentials before running anything.
    async fn test_connection(&mut self) -> Result<(), WarehouseError>;

    /// Close the session; any later call fails with [`WarehouseError::Closed`]
    async fn close(&mut self) -> Result<(), WarehouseError>;
}

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
