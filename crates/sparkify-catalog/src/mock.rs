//! Mock warehouse adapter for testing
//!
//! This adapter keeps tables in memory and interprets the handful of
//! statement shapes the loader issues. It's useful for:
//! - Unit testing the reset and load phases without a cluster
//! - Checking commit/rollback behaviour statement by statement
//! - Simulating unreachable or malformed storage paths
//!
//! ## What it understands
//!
//! - `DROP TABLE [IF EXISTS] t`, `CREATE TABLE [IF NOT EXISTS] t`,
//!   `TRUNCATE [TABLE] t`, `DELETE FROM t` (whole table)
//! - `COPY t FROM '<path>' ...`: appends the rows registered for `<path>`
//!   with [`MockWarehouse::with_source`]
//! - `INSERT INTO t ...`: appends the rows produced by the projection
//!   registered for `t` with [`MockWarehouse::with_projection`]
//!
//! Anything else succeeds without touching state. Each statement is atomic:
//! a failing statement leaves no partial rows behind.
//!
//! [`MockWarehouse::with_committing_truncate`] makes `TRUNCATE` commit the
//! open transaction, as Redshift does.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut warehouse = MockWarehouse::new()
//!     .with_source("s3://bucket/songs", song_rows)
//!     .fail_on("INSERT INTO time", "disk full");
//!
//! warehouse.execute("CREATE TABLE IF NOT EXISTS staging_songs (...)").await?;
//! warehouse.execute("COPY staging_songs FROM 's3://bucket/songs' ...").await?;
//! assert_eq!(warehouse.count_rows("staging_songs").await?, song_rows.len() as u64);
//! ```

use crate::adapter::{Warehouse, WarehouseError};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// Table name -> rows
pub type MockTables = BTreeMap<String, Vec<Value>>;

/// Produces the rows an `INSERT INTO <table> SELECT ...` would add
pub type Projection = Arc<dyn Fn(&MockTables) -> Vec<Value> + Send + Sync>;

/// Content behind a storage path
#[derive(Debug, Clone)]
enum MockSource {
    Rows(Vec<Value>),

    /// Yields some rows, then fails
    Malformed { partial: Vec<Value>, message: String },
}

/// A control or data call made against the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Begin,
    Commit,
    Rollback,
    Execute(String),
}

struct Patterns {
    drop: Regex,
    create: Regex,
    truncate: Regex,
    delete: Regex,
    copy: Regex,
    insert: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        drop: Regex::new(r"(?is)^\s*DROP\s+TABLE\s+(IF\s+EXISTS\s+)?(\w+)").expect("valid regex"),
        create: Regex::new(r"(?is)^\s*CREATE\s+TABLE\s+(IF\s+NOT\s+EXISTS\s+)?(\w+)").expect("valid regex"),
        truncate: Regex::new(r"(?is)^\s*TRUNCATE\s+(?:TABLE\s+)?(\w+)").expect("valid regex"),
        delete: Regex::new(r"(?is)^\s*DELETE\s+FROM\s+(\w+)").expect("valid regex"),
        copy: Regex::new(r"(?is)^\s*COPY\s+(\w+)\s+FROM\s+'((?:[^']|'')*)'").expect("valid regex"),
        insert: Regex::new(r"(?is)^\s*INSERT\s+INTO\s+(\w+)").expect("valid regex"),
    })
}

/// Mock warehouse adapter for testing
///
/// # Example
///
/// ```rust,ignore
/// let warehouse = MockWarehouse::new()
///     .with_table("users")
///     .with_connection_failure();
/// ```
pub struct MockWarehouse {
    /// Committed state
    committed: MockTables,

    /// Working copy while a transaction is open
    pending: Option<MockTables>,

    /// A statement failed inside the open transaction
    aborted: bool,

    sources: HashMap<String, MockSource>,

    projections: HashMap<String, Projection>,

    /// (SQL fragment, error message) pairs
    failures: Vec<(String, String)>,

    fail_connection: bool,

    /// Error returned by every COMMIT
    commit_failure: Option<String>,

    /// TRUNCATE commits the open transaction
    truncate_commits: bool,

    closed: bool,

    calls: Vec<MockCall>,

    adapter_name: &'static str,
}

impl MockWarehouse {
    /// Create an empty mock warehouse
    pub fn new() -> Self {
        Self {
            committed: MockTables::new(),
            pending: None,
            aborted: false,
            sources: HashMap::new(),
            projections: HashMap::new(),
            failures: Vec::new(),
            fail_connection: false,
            commit_failure: None,
            truncate_commits: false,
            closed: false,
            calls: Vec::new(),
            adapter_name: "Mock",
        }
    }

    /// Start with an existing, empty table
    pub fn with_table(self, table: &str) -> Self {
        self.with_rows(table, Vec::new())
    }

    /// Start with an existing table holding the given rows
    pub fn with_rows(mut self, table: &str, rows: Vec<Value>) -> Self {
        self.committed.insert(table.to_lowercase(), rows);
        self
    }

    /// Register the rows a `COPY ... FROM '<path>'` loads
    pub fn with_source(mut self, path: impl Into<String>, rows: Vec<Value>) -> Self {
        self.sources.insert(path.into(), MockSource::Rows(rows));
        self
    }

    /// Register a path whose COPY reads `partial` rows and then fails
    pub fn with_malformed_source(
        mut self,
        path: impl Into<String>,
        partial: Vec<Value>,
        message: impl Into<String>,
    ) -> Self {
        self.sources.insert(
            path.into(),
            MockSource::Malformed { partial, message: message.into() },
        );
        self
    }

    /// Register the rows `INSERT INTO <table>` produces from current state
    pub fn with_projection<F>(mut self, table: &str, projection: F) -> Self
    where
        F: Fn(&MockTables) -> Vec<Value> + Send + Sync + 'static,
    {
        self.projections.insert(table.to_lowercase(), Arc::new(projection));
        self
    }

    /// Fail every statement containing `fragment`
    pub fn fail_on(mut self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.push((fragment.into(), message.into()));
        self
    }

    /// Configure every call to fail as if the server were unreachable
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Fail every COMMIT, discarding the transaction
    pub fn fail_commit(mut self, message: impl Into<String>) -> Self {
        self.commit_failure = Some(message.into());
        self
    }

    /// Commit the open transaction on every successful TRUNCATE
    pub fn with_committing_truncate(mut self) -> Self {
        self.truncate_commits = true;
        self
    }

    /// Set a custom adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.adapter_name = name;
        self
    }

    /// Every call made so far
    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// SQL of every executed statement, in order
    pub fn executed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Execute(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls, keeping state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Committed tables
    pub fn tables(&self) -> &MockTables {
        &self.committed
    }

    /// Committed rows of a table
    pub fn rows(&self, table: &str) -> Option<&[Value]> {
        self.committed.get(&table.to_lowercase()).map(Vec::as_slice)
    }

    /// Names of committed tables, sorted
    pub fn table_names(&self) -> Vec<&str> {
        self.committed.keys().map(String::as_str).collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), WarehouseError> {
        if self.fail_connection {
            return Err(WarehouseError::ConnectionError(
                "Simulated connection failure".to_string(),
            ));
        }
        if self.closed {
            return Err(WarehouseError::Closed);
        }
        Ok(())
    }

    fn current(&self) -> &MockTables {
        match &self.pending {
            Some(tables) => tables,
            None => &self.committed,
        }
    }

    fn set_current(&mut self, tables: MockTables) {
        match &mut self.pending {
            Some(pending) => *pending = tables,
            None => self.committed = tables,
        }
    }

    fn injected_failure(&self, sql: &str) -> Option<&str> {
        self.failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, message)| message.as_str())
    }

    /// Interpret one statement against `tables`
    fn apply(&self, tables: &mut MockTables, sql: &str) -> Result<u64, WarehouseError> {
        let p = patterns();

        if let Some(caps) = p.drop.captures(sql) {
            let table = caps[2].to_lowercase();
            if tables.remove(&table).is_none() && caps.get(1).is_none() {
                return Err(missing_table(&table));
            }
            return Ok(0);
        }

        if let Some(caps) = p.create.captures(sql) {
            let table = caps[2].to_lowercase();
            if tables.contains_key(&table) {
                if caps.get(1).is_none() {
                    return Err(WarehouseError::QueryError(format!(
                        "relation \"{}\" already exists",
                        table
                    )));
                }
            } else {
                tables.insert(table, Vec::new());
            }
            return Ok(0);
        }

        if let Some(caps) = p.truncate.captures(sql) {
            let table = caps[1].to_lowercase();
            let rows = tables.get_mut(&table).ok_or_else(|| missing_table(&table))?;
            rows.clear();
            return Ok(0);
        }

        if let Some(caps) = p.delete.captures(sql) {
            let table = caps[1].to_lowercase();
            let rows = tables.get_mut(&table).ok_or_else(|| missing_table(&table))?;
            let deleted = rows.len() as u64;
            rows.clear();
            return Ok(deleted);
        }

        if let Some(caps) = p.copy.captures(sql) {
            let table = caps[1].to_lowercase();
            let path = caps[2].replace("''", "'");

            let source = self.sources.get(&path).ok_or_else(|| {
                WarehouseError::QueryError(format!(
                    "S3ServiceException: The specified key does not exist: {}",
                    path
                ))
            })?;
            let rows = tables.get_mut(&table).ok_or_else(|| missing_table(&table))?;

            return match source {
                MockSource::Rows(source_rows) => {
                    rows.extend(source_rows.iter().cloned());
                    Ok(source_rows.len() as u64)
                }
                MockSource::Malformed { partial, message } => {
                    rows.extend(partial.iter().cloned());
                    Err(WarehouseError::QueryError(format!(
                        "Load into table '{}' failed: {}",
                        table, message
                    )))
                }
            };
        }

        if let Some(caps) = p.insert.captures(sql) {
            let table = caps[1].to_lowercase();
            if !tables.contains_key(&table) {
                return Err(missing_table(&table));
            }

            let produced = match self.projections.get(&table) {
                Some(projection) => projection(tables),
                None => Vec::new(),
            };
            let count = produced.len() as u64;

            if let Some(rows) = tables.get_mut(&table) {
                rows.extend(produced);
            }
            return Ok(count);
        }

        Ok(0)
    }

    fn abort_transaction(&mut self) {
        if self.pending.is_some() {
            self.aborted = true;
        }
    }
}

fn missing_table(table: &str) -> WarehouseError {
    WarehouseError::QueryError(format!("relation \"{}\" does not exist", table))
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Warehouse for MockWarehouse {
    fn name(&self) -> &'static str {
        self.adapter_name
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError> {
        self.ensure_open()?;
        self.calls.push(MockCall::Execute(sql.to_string()));

        if self.aborted {
            return Err(WarehouseError::TransactionError(
                "current transaction is aborted, commands ignored until end of transaction block"
                    .to_string(),
            ));
        }

        if let Some(message) = self.injected_failure(sql) {
            let error = WarehouseError::QueryError(message.to_string());
            self.abort_transaction();
            return Err(error);
        }

        let mut scratch = self.current().clone();
        match self.apply(&mut scratch, sql) {
            Ok(rows) => {
                if self.truncate_commits && self.pending.is_some() && patterns().truncate.is_match(sql) {
                    self.committed = scratch.clone();
                }
                self.set_current(scratch);
                Ok(rows)
            }
            Err(e) => {
                self.abort_transaction();
                Err(e)
            }
        }
    }

    async fn begin(&mut self) -> Result<(), WarehouseError> {
        self.ensure_open()?;
        self.calls.push(MockCall::Begin);

        if self.pending.is_some() {
            return Err(WarehouseError::TransactionError(
                "there is already a transaction in progress".to_string(),
            ));
        }
        self.pending = Some(self.committed.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), WarehouseError> {
        self.ensure_open()?;
        self.calls.push(MockCall::Commit);

        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        if self.aborted {
            self.aborted = false;
            return Err(WarehouseError::TransactionError(
                "transaction was aborted and has been rolled back".to_string(),
            ));
        }

        if let Some(message) = &self.commit_failure {
            return Err(WarehouseError::TransactionError(message.clone()));
        }

        self.committed = pending;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), WarehouseError> {
        self.ensure_open()?;
        self.calls.push(MockCall::Rollback);

        self.pending = None;
        self.aborted = false;
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, WarehouseError> {
        self.ensure_open()?;
        Ok(self.current().contains_key(&table.to_lowercase()))
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64, WarehouseError> {
        self.ensure_open()?;
        let table = table.to_lowercase();
        self.current()
            .get(&table)
            .map(|rows| rows.len() as u64)
            .ok_or_else(|| missing_table(&table))
    }

    async fn test_connection(&mut self) -> Result<(), WarehouseError> {
        self.ensure_open()
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        // Closing with an open transaction discards it, as a real session would
        self.pending = None;
        self.aborted = false;
        self.closed = true;
        Ok(())
    }
}
