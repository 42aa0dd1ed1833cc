//! Test fixtures for the reset and load phases
//!
//! A mock warehouse wired with staging files and with projections that
//! mirror the five insert statements over in-memory rows.

use std::collections::BTreeSet;

use serde_json::{json, Value};
use sparkify_catalog::{MockTables, MockWarehouse};
use sparkify_sql::{CopySource, JsonFormat, StatementCatalog};

pub const LOG_DATA: &str = "s3://udacity-dend/log_data";
pub const LOG_JSONPATH: &str = "s3://udacity-dend/log_json_path.json";
pub const SONG_DATA: &str = "s3://udacity-dend/song_data";
pub const ARN: &str = "arn:aws:iam::123456789012:role/dwhRole";

pub fn catalog() -> StatementCatalog {
    StatementCatalog::with_copies(vec![
        CopySource::new("staging_events", LOG_DATA, ARN)
            .with_format(JsonFormat::JsonPaths(LOG_JSONPATH.to_string())),
        CopySource::new("staging_songs", SONG_DATA, ARN).accepting_invalid_chars('^'),
    ])
}

pub fn song_records() -> Vec<Value> {
    vec![
        json!({
            "num_songs": 1,
            "artist_id": "AR5KOSW1187FB35FF4",
            "artist_latitude": 49.80388,
            "artist_longitude": 15.47491,
            "artist_location": "Dubai UAE",
            "artist_name": "Elena",
            "song_id": "SOZCTXZ12AB0182364",
            "title": "Setanta matins",
            "duration": 269.58322,
            "year": 0
        }),
        json!({
            "num_songs": 1,
            "artist_id": "ARD7TVE1187B99BFB1",
            "artist_latitude": null,
            "artist_longitude": null,
            "artist_location": "California - LA",
            "artist_name": "Casual",
            "song_id": "SOMZWCG12A8C13C480",
            "title": "I Didn't Mean To",
            "duration": 218.93179,
            "year": 0
        }),
    ]
}

fn event(user_id: i64, first_name: &str, artist: &str, page: &str, ts: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": first_name,
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Lynch",
        "length": 220.3,
        "level": "free",
        "location": "Phoenix-Mesa-Scottsdale, AZ",
        "method": "PUT",
        "page": page,
        "registration": 1540919166796.0,
        "sessionId": 38,
        "song": "Setanta matins",
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id
    })
}

/// Four log records: three NextSong plays by two users, two of which match
/// a song by artist name, and one Home page view
///
/// Two of the plays share a timestamp.
pub fn event_records() -> Vec<Value> {
    vec![
        event(39, "Lily", "Elena", "NextSong", 1541105830796),
        event(39, "Lily", "Casual", "NextSong", 1541106106796),
        event(8, "Kaylee", "", "Home", 1541106496796),
        event(52, "Theodore", "Unknown Band", "NextSong", 1541105830796),
    ]
}

/// Mock warehouse with both staging sources and all insert projections
pub fn warehouse() -> MockWarehouse {
    with_projections(
        MockWarehouse::new()
            .with_source(LOG_DATA, event_records())
            .with_source(SONG_DATA, song_records()),
    )
}

/// Register projections equivalent to the `INSERT ... SELECT DISTINCT` statements
pub fn with_projections(warehouse: MockWarehouse) -> MockWarehouse {
    warehouse
        .with_projection("songplays", |tables| {
            let songs = rows(tables, "staging_songs");
            distinct(next_song_events(tables).flat_map(move |e| {
                songs
                    .iter()
                    .filter(move |s| s["artist_name"] == e["artist"])
                    .map(move |s| {
                        json!({
                            "start_time": e["ts"],
                            "user_id": e["userId"],
                            "level": e["level"],
                            "song_id": s["song_id"],
                            "artist_id": s["artist_id"],
                            "session_id": e["sessionId"],
                            "location": e["location"],
                            "user_agent": e["userAgent"],
                        })
                    })
            }))
        })
        .with_projection("users", |tables| {
            distinct(next_song_events(tables).map(|e| {
                json!({
                    "user_id": e["userId"],
                    "first_name": e["firstName"],
                    "last_name": e["lastName"],
                    "gender": e["gender"],
                    "level": e["level"],
                })
            }))
        })
        .with_projection("songs", |tables| {
            distinct(rows(tables, "staging_songs").iter().map(|s| {
                json!({
                    "song_id": s["song_id"],
                    "title": s["title"],
                    "artist_id": s["artist_id"],
                    "year": s["year"],
                    "duration": s["duration"],
                })
            }))
        })
        .with_projection("artists", |tables| {
            distinct(rows(tables, "staging_songs").iter().map(|s| {
                json!({
                    "artist_id": s["artist_id"],
                    "name": s["artist_name"],
                    "location": s["artist_location"],
                    "latitude": s["artist_latitude"],
                    "longitude": s["artist_longitude"],
                })
            }))
        })
        .with_projection("time", |tables| {
            distinct(next_song_events(tables).map(|e| json!({ "start_time": e["ts"] })))
        })
}

fn rows<'a>(tables: &'a MockTables, table: &str) -> &'a [Value] {
    tables.get(table).map(Vec::as_slice).unwrap_or(&[])
}

fn next_song_events(tables: &MockTables) -> impl Iterator<Item = &Value> {
    rows(tables, "staging_events")
        .iter()
        .filter(|e| e["page"] == "NextSong")
}

/// Keep the first occurrence of each row
fn distinct(rows: impl Iterator<Item = Value>) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    rows.filter(|row| seen.insert(row.to_string())).collect()
}

pub const EVENT_COLUMNS: &[&str] = &[
    "artist", "auth", "firstName", "gender", "itemInSession", "lastName", "length", "level",
    "location", "method", "page", "registration", "sessionId", "song", "status", "ts",
    "userAgent", "userId",
];

pub const SONG_COLUMNS: &[&str] = &[
    "num_songs", "artist_id", "artist_latitude", "artist_longitude", "artist_location",
    "artist_name", "song_id", "title", "duration", "year",
];

/// `INSERT INTO <table> (...) VALUES ...` holding `records`
///
/// Every value is sent as a string literal and cast by the server.
pub fn values_insert(table: &str, columns: &[&str], records: &[Value]) -> String {
    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            let values: Vec<String> = columns.iter().map(|c| sql_literal(&record[*c])).collect();
            format!("({})", values.join(", "))
        })
        .collect();

    format!("INSERT INTO {} ({}) VALUES {};", table, columns.join(", "), rows.join(", "))
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other),
    }
}
