//! Warehouse table model and statement classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a table plays in the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    /// Raw landing table filled by bulk copy
    Staging,

    /// Event table referencing the dimensions
    Fact,

    /// Deduplicated descriptive table
    Dimension,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staging => write!(f, "staging"),
            Self::Fact => write!(f, "fact"),
            Self::Dimension => write!(f, "dimension"),
        }
    }
}

/// A table managed by the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name in the public schema
    pub name: &'static str,

    pub role: TableRole,

    /// `CREATE TABLE IF NOT EXISTS` statement, including layout hints
    pub create_sql: &'static str,
}

impl TableDef {
    pub const fn new(name: &'static str, role: TableRole, create_sql: &'static str) -> Self {
        Self { name, role, create_sql }
    }

    /// Drop statement; cascades so dependent views do not block the reset
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE;", self.name)
    }

    /// Truncate statement, used to empty staging tables before a reload
    pub fn truncate_sql(&self) -> String {
        format!("TRUNCATE TABLE {};", self.name)
    }

    /// Transactional equivalent of [`TableDef::truncate_sql`]
    ///
    /// Redshift commits the open transaction on `TRUNCATE`, so a table that
    /// must be emptied inside a larger transaction uses `DELETE` instead.
    pub fn delete_all_sql(&self) -> String {
        format!("DELETE FROM {};", self.name)
    }
}

/// What a statement does to the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Drop,
    Create,
    Truncate,
    Copy,
    Insert,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::Truncate => "truncate",
            Self::Copy => "copy",
            Self::Insert => "insert",
        };
        write!(f, "{}", s)
    }
}

/// Run phase a statement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Drop and recreate every table
    SchemaReset,

    /// Copy staging data and derive the star schema
    LoadPipeline,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaReset => write!(f, "schema reset"),
            Self::LoadPipeline => write!(f, "load pipeline"),
        }
    }
}
