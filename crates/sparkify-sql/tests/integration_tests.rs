//! Integration tests for the statement catalog

use pretty_assertions::assert_eq;
use sparkify_core::{Config, StatementKind};
use sparkify_sql::{LoadStep, StatementCatalog};

const CONFIG: &str = r#"
[CLUSTER]
HOST = "localhost"
DB_NAME = "dev"
DB_USER = "awsuser"
DB_PASSWORD = "pw"

[IAM_ROLE]
ARN = "arn:aws:iam::123456789012:role/dwhRole"

[S3]
LOG_DATA = "s3://udacity-dend/log_data"
LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
SONG_DATA = "s3://udacity-dend/song_data"
"#;

fn catalog() -> StatementCatalog {
    StatementCatalog::from_config(&Config::from_toml(CONFIG).unwrap())
}

#[test]
fn migrations_mirror_reset_statements() {
    let catalog = catalog();
    let migrations = catalog.migrations();
    let drops = catalog.drop_statements();
    let creates = catalog.create_statements();

    assert_eq!(migrations.len(), drops.len());
    for ((migration, drop), create) in migrations.iter().zip(&drops).zip(&creates) {
        assert_eq!(migration.down, drop.sql);
        assert_eq!(migration.up, create.sql);
        assert_eq!(migration.table, drop.table);
    }
}

#[test]
fn rendered_copies_match_classic_layout() {
    let copies = catalog().copy_statements().unwrap();

    assert_eq!(
        copies[0].sql,
        "COPY staging_events FROM 's3://udacity-dend/log_data'\n\
         credentials 'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole'\n\
         format as json 's3://udacity-dend/log_json_path.json'\n\
         STATUPDATE ON\n\
         region 'us-west-2';"
    );
    assert_eq!(
        copies[1].sql,
        "COPY staging_songs FROM 's3://udacity-dend/song_data'\n\
         credentials 'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole'\n\
         format as json 'auto'\n\
         ACCEPTINVCHARS AS '^'\n\
         STATUPDATE ON\n\
         region 'us-west-2';"
    );
}

#[test]
fn load_graph_covers_every_load_statement() {
    let catalog = catalog();
    let graph = catalog.load_graph().unwrap();

    let expected: Vec<String> = catalog
        .copy_statements()
        .unwrap()
        .into_iter()
        .chain(catalog.insert_statements())
        .map(|s| s.name)
        .collect();
    let ordered: Vec<String> = graph
        .ordered_steps()
        .into_iter()
        .map(|s: &LoadStep| s.name().to_string())
        .collect();

    assert_eq!(ordered, expected);

    // Every insert comes after the copies of the tables it reads
    let steps = graph.ordered_steps();
    for (pos, step) in steps.iter().enumerate() {
        if step.statement.kind != StatementKind::Insert {
            continue;
        }
        for table in &step.reads {
            let writer = steps.iter().position(|s| s.writes == *table).unwrap();
            assert!(writer < pos, "{} runs before its source {}", step.name(), table);
        }
    }
}
