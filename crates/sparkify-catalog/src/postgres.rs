//! PostgreSQL-protocol warehouse adapter
//!
//! Amazon Redshift speaks the PostgreSQL wire protocol, so the same adapter
//! serves a Redshift cluster and a plain PostgreSQL server used for local
//! testing. Statements go through the simple query protocol, which is what
//! Redshift expects for `COPY`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut warehouse = PostgresWarehouse::connect(&config.cluster).await?;
//! warehouse.execute("DROP TABLE IF EXISTS users CASCADE;").await?;
//! warehouse.close().await?;
//! ```

use crate::adapter::{quote_ident, Warehouse, WarehouseError};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use sparkify_core::ClusterConfig;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config as PgConfig, NoTls, SimpleQueryMessage};

/// Warehouse adapter over tokio-postgres
///
/// Owns one client; the connection driver runs on a spawned task that ends
/// when the client is dropped.
pub struct PostgresWarehouse {
    client: Option<Client>,

    /// Background task driving the connection
    connection: Option<JoinHandle<()>>,

    /// `host:port/dbname`, for logging
    endpoint: String,
}

impl PostgresWarehouse {
    /// Connect without TLS
    pub async fn connect(cluster: &ClusterConfig) -> Result<Self, WarehouseError> {
        let endpoint = cluster.endpoint();
        tracing::info!(endpoint = %endpoint, user = %cluster.db_user, "Connecting to warehouse");

        let (client, connection) = pg_config(cluster)
            .connect(NoTls)
            .await
            .map_err(|e| WarehouseError::ConnectionError(format!(
                "Failed to connect to {}: {}",
                endpoint, e
            )))?;

        // Spawn connection handler in background
        let endpoint_clone = endpoint.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(endpoint = %endpoint_clone, error = %e, "Warehouse connection error");
            }
        });

        Ok(Self::from_parts(client, handle, endpoint))
    }

    /// Connect over TLS
    pub async fn connect_with_tls(cluster: &ClusterConfig) -> Result<Self, WarehouseError> {
        let endpoint = cluster.endpoint();
        tracing::info!(endpoint = %endpoint, user = %cluster.db_user, "Connecting to warehouse with TLS");

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| WarehouseError::ConfigError(format!(
                "Failed to create TLS connector: {}", e
            )))?;

        let (client, connection) = pg_config(cluster)
            .connect(MakeTlsConnector::new(connector))
            .await
            .map_err(|e| WarehouseError::ConnectionError(format!(
                "Failed to connect to {} with TLS: {}",
                endpoint, e
            )))?;

        let endpoint_clone = endpoint.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(endpoint = %endpoint_clone, error = %e, "Warehouse TLS connection error");
            }
        });

        Ok(Self::from_parts(client, handle, endpoint))
    }

    /// Connect with the cluster settings, choosing TLS as configured
    pub async fn open(cluster: &ClusterConfig, tls: bool) -> Result<Self, WarehouseError> {
        if tls {
            Self::connect_with_tls(cluster).await
        } else {
            Self::connect(cluster).await
        }
    }

    fn from_parts(client: Client, connection: JoinHandle<()>, endpoint: String) -> Self {
        Self {
            client: Some(client),
            connection: Some(connection),
            endpoint,
        }
    }

    /// Get the connection endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn client(&self) -> Result<&Client, WarehouseError> {
        self.client.as_ref().ok_or(WarehouseError::Closed)
    }

    async fn control(&mut self, command: &str) -> Result<(), WarehouseError> {
        self.client()?
            .batch_execute(command)
            .await
            .map_err(|e| WarehouseError::TransactionError(format!(
                "{} failed: {}",
                command,
                format_postgres_error(&e)
            )))
    }
}

fn pg_config(cluster: &ClusterConfig) -> PgConfig {
    let mut config = PgConfig::new();
    config
        .host(&cluster.host)
        .port(cluster.db_port)
        .dbname(&cluster.db_name)
        .user(&cluster.db_user)
        .password(&cluster.db_password)
        .application_name("sparkify");
    config
}

/// Render a server error with its detail and hint
fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail() {
        if !detail.trim().is_empty() {
            message.push_str(&format!(" (detail: {})", detail));
        }
    }

    if let Some(hint) = db_error.hint() {
        if !hint.trim().is_empty() {
            message.push_str(&format!(" (hint: {})", hint));
        }
    }

    format!("{} (code: {})", message, db_error.code().code())
}

/// Rows reported by the command-complete messages of a simple query
fn rows_affected(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|m| match m {
            SimpleQueryMessage::CommandComplete(rows) => *rows,
            _ => 0,
        })
        .sum()
}

#[async_trait::async_trait]
impl Warehouse for PostgresWarehouse {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, WarehouseError> {
        let messages = self.client()?
            .simple_query(sql)
            .await
            .map_err(|e| WarehouseError::QueryError(format_postgres_error(&e)))?;

        Ok(rows_affected(&messages))
    }

    async fn begin(&mut self) -> Result<(), WarehouseError> {
        self.control("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), WarehouseError> {
        self.control("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), WarehouseError> {
        self.control("ROLLBACK").await
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, WarehouseError> {
        let row = self.client()?
            .query_one(
                "SELECT COUNT(*) FROM pg_catalog.pg_tables WHERE schemaname = 'public' AND tablename = $1",
                &[&table],
            )
            .await
            .map_err(|e| WarehouseError::QueryError(format_postgres_error(&e)))?;

        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64, WarehouseError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let row = self.client()?
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| WarehouseError::QueryError(format_postgres_error(&e)))?;

        let count: i64 = row.get(0);
        Ok(count.max(0) as u64)
    }

    async fn test_connection(&mut self) -> Result<(), WarehouseError> {
        self.client()?
            .simple_query("SELECT 1")
            .await
            .map_err(|e| WarehouseError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        // Dropping the client ends the session; the driver task then finishes
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        drop(client);

        if let Some(handle) = self.connection.take() {
            handle
                .await
                .map_err(|e| WarehouseError::ConnectionError(format!(
                    "Connection task for {} did not shut down cleanly: {}",
                    self.endpoint, e
                )))?;
        }

        tracing::info!(endpoint = %self.endpoint, "Closed warehouse connection");
        Ok(())
    }
}
