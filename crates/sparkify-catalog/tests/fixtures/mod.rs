//! Test fixtures for warehouse adapter integration tests
//!
//! Small staging records shaped like the Sparkify log and song files.

use serde_json::{json, Value};

/// Two song documents by two artists
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

/// A log record for the given page
pub fn event_record(user_id: i64, artist: &str, page: &str, ts: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Walter",
        "gender": "M",
        "itemInSession": "0",
        "lastName": "Frye",
        "length": "220.3",
        "level": "free",
        "location": "San Francisco-Oakland-Hayward, CA",
        "method": "PUT",
        "page": page,
        "registration": "1540919166796.0",
        "sessionId": 38,
        "song": "Setanta matins",
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id
    })
}

/// Three log records, two of them NextSong
pub fn event_records() -> Vec<Value> {
    vec![
        event_record(39, "Elena", "NextSong", 1541105830796),
        event_record(39, "Casual", "NextSong", 1541106106796),
        event_record(8, "", "Home", 1541106496796),
    ]
}

/// DDL for a throwaway table on a live server
pub fn scratch_table_ddl(name: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {} (id INTEGER, label VARCHAR(32));", name)
}
