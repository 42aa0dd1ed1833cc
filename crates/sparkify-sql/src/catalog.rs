//! Statement catalog
//!
//! Every statement the tool can run, named and classified. The catalog is
//! pure data: it renders SQL but never executes it.

use sparkify_core::{Config, StatementKind, TableDef, TableRole};

use crate::copy::{CopySource, JsonFormat};
use crate::dag::{LoadGraph, LoadStep};
use crate::inserts::{sparkify_inserts, InsertStep};
use crate::migration::{migrations_for, Migration};
use crate::tables::{sparkify_tables, STAGING_EVENTS, STAGING_SONGS};

/// A single named SQL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Stable name, `<table>_<kind>` (e.g. `staging_events_copy`)
    pub name: String,

    pub kind: StatementKind,

    /// Table the statement acts on
    pub table: &'static str,

    pub sql: String,
}

impl Statement {
    pub fn new(
        name: impl Into<String>,
        kind: StatementKind,
        table: &'static str,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            table,
            sql: sql.into(),
        }
    }

    fn for_table(kind: StatementKind, table: &'static str, sql: impl Into<String>) -> Self {
        Self::new(format!("{}_{}", table, kind), kind, table, sql)
    }
}

/// Errors raised while assembling statements
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Load steps form a cycle: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Step {step} references unknown table {table}")]
    UnknownTable { step: String, table: String },

    #[error("Table {table} is written by both {first} and {second}")]
    DuplicateWriter {
        table: String,
        first: String,
        second: String,
    },
}

/// The fixed set of tables, copies and inserts of the Sparkify warehouse
#[derive(Debug, Clone)]
pub struct StatementCatalog {
    tables: Vec<TableDef>,
    copies: Vec<CopySource>,
    inserts: Vec<InsertStep>,
}

impl StatementCatalog {
    /// Build the catalog with copy sources taken from configuration
    pub fn from_config(config: &Config) -> Self {
        let arn = &config.iam_role.arn;
        let region = &config.s3.region;

        let copies = vec![
            CopySource::new(STAGING_EVENTS, &config.s3.log_data, arn)
                .with_format(JsonFormat::from_setting(&config.s3.log_jsonpath))
                .with_region(region),
            CopySource::new(STAGING_SONGS, &config.s3.song_data, arn)
                .accepting_invalid_chars('^')
                .with_region(region),
        ];

        Self::with_copies(copies)
    }

    /// Build the catalog with explicit copy sources
    pub fn with_copies(copies: Vec<CopySource>) -> Self {
        Self {
            tables: sparkify_tables(),
            copies,
            inserts: sparkify_inserts(),
        }
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn copy_sources(&self) -> &[CopySource] {
        &self.copies
    }

    /// `DROP TABLE IF EXISTS ... CASCADE` for every table
    pub fn drop_statements(&self) -> Vec<Statement> {
        self.tables
            .iter()
            .map(|t| Statement::for_table(StatementKind::Drop, t.name, t.drop_sql()))
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` for every table
    pub fn create_statements(&self) -> Vec<Statement> {
        self.tables
            .iter()
            .map(|t| Statement::for_table(StatementKind::Create, t.name, t.create_sql.trim()))
            .collect()
    }

    /// `TRUNCATE` for the staging tables
    pub fn truncate_staging_statements(&self) -> Vec<Statement> {
        self.tables
            .iter()
            .filter(|t| t.role == TableRole::Staging)
            .map(|t| Statement::for_table(StatementKind::Truncate, t.name, t.truncate_sql()))
            .collect()
    }

    /// `DELETE FROM` for the staging tables, for emptying them inside an
    /// open transaction
    pub fn delete_staging_statements(&self) -> Vec<Statement> {
        self.tables
            .iter()
            .filter(|t| t.role == TableRole::Staging)
            .map(|t| Statement::for_table(StatementKind::Truncate, t.name, t.delete_all_sql()))
            .collect()
    }

    /// Rendered COPY statements, in declaration order
    pub fn copy_statements(&self) -> Result<Vec<Statement>, CatalogError> {
        self.copies
            .iter()
            .map(|c| c.render().map(|sql| Statement::for_table(StatementKind::Copy, c.table, sql)))
            .collect()
    }

    /// INSERT statements, in declaration order
    pub fn insert_statements(&self) -> Vec<Statement> {
        self.inserts
            .iter()
            .map(|i| Statement::for_table(StatementKind::Insert, i.target, i.sql.trim()))
            .collect()
    }

    /// Copies and inserts as a dependency graph
    pub fn load_graph(&self) -> Result<LoadGraph, CatalogError> {
        let mut steps = Vec::with_capacity(self.copies.len() + self.inserts.len());

        for copy in &self.copies {
            steps.push(LoadStep {
                statement: Statement::for_table(StatementKind::Copy, copy.table, copy.render()?),
                reads: Vec::new(),
                writes: copy.table,
            });
        }

        for insert in &self.inserts {
            steps.push(LoadStep {
                statement: Statement::for_table(StatementKind::Insert, insert.target, insert.sql.trim()),
                reads: insert.reads.to_vec(),
                writes: insert.target,
            });
        }

        let known: Vec<&str> = self.tables.iter().map(|t| t.name).collect();
        LoadGraph::build(steps, &known)
    }

    /// The schema as versioned migrations
    pub fn migrations(&self) -> Vec<Migration> {
        migrations_for(&self.tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog() -> StatementCatalog {
        StatementCatalog::with_copies(vec![
            CopySource::new(STAGING_EVENTS, "s3://bucket/log_data", "arn:role")
                .with_format(JsonFormat::JsonPaths("s3://bucket/log_json_path.json".to_string())),
            CopySource::new(STAGING_SONGS, "s3://bucket/song_data", "arn:role")
                .accepting_invalid_chars('^'),
        ])
    }

    fn names(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn seven_drops_in_table_order() {
        let drops = catalog().drop_statements();
        assert_eq!(
            names(&drops),
            vec![
                "staging_events_drop",
                "staging_songs_drop",
                "songplays_drop",
                "users_drop",
                "songs_drop",
                "artists_drop",
                "time_drop",
            ]
        );
        assert!(drops.iter().all(|s| s.sql.starts_with("DROP TABLE IF EXISTS") && s.sql.ends_with("CASCADE;")));
    }

    #[test]
    fn seven_creates_in_table_order() {
        let creates = catalog().create_statements();
        assert_eq!(creates.len(), 7);
        assert_eq!(creates[0].name, "staging_events_create");
        assert!(creates.iter().all(|s| s.kind == StatementKind::Create));
        assert!(creates[2].sql.contains("IDENTITY(0,1)"));
        assert!(creates[3].sql.ends_with("DISTSTYLE ALL;"));
    }

    #[test]
    fn copies_and_inserts() {
        let catalog = catalog();
        let copies = catalog.copy_statements().unwrap();
        assert_eq!(names(&copies), vec!["staging_events_copy", "staging_songs_copy"]);
        assert!(copies[0].sql.contains("format as json 's3://bucket/log_json_path.json'"));
        assert!(copies[1].sql.contains("ACCEPTINVCHARS AS '^'"));

        let inserts = catalog.insert_statements();
        assert_eq!(
            names(&inserts),
            vec!["songplays_insert", "users_insert", "songs_insert", "artists_insert", "time_insert"]
        );
    }

    #[test]
    fn load_graph_reproduces_fixed_order() {
        let graph = catalog().load_graph().unwrap();
        let order: Vec<&str> = graph.ordered_steps().into_iter().map(LoadStep::name).collect();

        assert_eq!(
            order,
            vec![
                "staging_events_copy",
                "staging_songs_copy",
                "songplays_insert",
                "users_insert",
                "songs_insert",
                "artists_insert",
                "time_insert",
            ]
        );
        assert_eq!(graph.parents("songplays_insert"), vec!["staging_events_copy", "staging_songs_copy"]);
        assert_eq!(graph.parents("artists_insert"), vec!["staging_songs_copy"]);
        assert_eq!(
            graph.downstream("staging_events_copy"),
            vec!["songplays_insert", "users_insert", "time_insert"]
        );
    }

    #[test]
    fn truncates_only_staging() {
        let truncates = catalog().truncate_staging_statements();
        assert_eq!(names(&truncates), vec!["staging_events_truncate", "staging_songs_truncate"]);

        let deletes = catalog().delete_staging_statements();
        assert_eq!(names(&deletes), names(&truncates));
        assert_eq!(deletes[0].sql, "DELETE FROM staging_events;");
    }

    #[test]
    fn from_config_uses_settings() {
        let config = Config::from_toml(
            r#"
[CLUSTER]
HOST = "h"
DB_NAME = "d"
DB_USER = "u"

[IAM_ROLE]
ARN = "arn:aws:iam::1:role/r"

[S3]
LOG_DATA = "s3://b/log"
LOG_JSONPATH = "auto"
SONG_DATA = "s3://b/song"
REGION = "us-east-1"
"#,
        )
        .unwrap();

        let catalog = StatementCatalog::from_config(&config);
        let sources = catalog.copy_sources();
        assert_eq!(sources[0].format, JsonFormat::Auto);
        assert_eq!(sources[1].accept_inv_chars, Some('^'));
        assert!(sources.iter().all(|s| s.region == "us-east-1" && s.iam_role == "arn:aws:iam::1:role/r"));
    }
}
