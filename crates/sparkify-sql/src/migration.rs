//! Schema as an ordered list of named migrations
//!
//! Each managed table is one migration: `up` creates it, `down` drops it.
//! Versions are assigned in table order and never reused.

use sha2::{Digest, Sha256};
use sparkify_core::TableDef;

/// A named, versioned schema step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,

    /// Stable name, e.g. `0003_create_songplays`
    pub name: String,

    pub table: &'static str,

    pub up: String,

    pub down: String,
}

impl Migration {
    /// Build the migration for a table at the given version
    pub fn for_table(version: u32, table: &TableDef) -> Self {
        Self {
            version,
            name: format!("{:04}_create_{}", version, table.name),
            table: table.name,
            up: table.create_sql.trim().to_string(),
            down: table.drop_sql(),
        }
    }

    /// SHA-256 over both directions; changes whenever either statement does
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.up.as_bytes());
        hasher.update(b"\n--\n");
        hasher.update(self.down.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Migrations for the given tables, versions starting at 1
pub fn migrations_for(tables: &[TableDef]) -> Vec<Migration> {
    tables
        .iter()
        .enumerate()
        .map(|(i, table)| Migration::for_table(i as u32 + 1, table))
        .collect()
}
