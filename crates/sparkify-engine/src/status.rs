//! Row counts of the warehouse tables

use sparkify_catalog::{Warehouse, WarehouseError};
use sparkify_core::TableRole;
use sparkify_sql::StatementCatalog;

/// Row count of one table; `rows` is `None` when the table does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub table: &'static str,
    pub role: TableRole,
    pub rows: Option<u64>,
}

/// Count the rows of every catalog table, in catalog order
pub async fn table_counts(
    warehouse: &mut dyn Warehouse,
    catalog: &StatementCatalog,
) -> Result<Vec<TableStatus>, WarehouseError> {
    let mut statuses = Vec::with_capacity(catalog.tables().len());

    for table in catalog.tables() {
        let rows = if warehouse.table_exists(table.name).await? {
            Some(warehouse.count_rows(table.name).await?)
        } else {
            None
        };

        tracing::debug!(table = table.name, rows = ?rows, "Counted");
        statuses.push(TableStatus {
            table: table.name,
            role: table.role,
            rows,
        });
    }

    Ok(statuses)
}
