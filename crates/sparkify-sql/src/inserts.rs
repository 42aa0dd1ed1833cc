//! Insert-from-staging statements for the fact and dimension tables

use crate::tables::{ARTISTS, SONGPLAYS, SONGS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS};

/// A derived-table load: one `INSERT ... SELECT DISTINCT` over staging data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStep {
    /// Table receiving the rows
    pub target: &'static str,

    /// Tables the SELECT reads
    pub reads: &'static [&'static str],

    pub sql: &'static str,
}

const SONGPLAY_INSERT: &str = "
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT  DISTINCT TIMESTAMP 'epoch' + se.ts/1000 * INTERVAL '1 second' AS start_time,
        se.userId       AS user_id,
        se.level        AS level,
        ss.song_id      AS song_id,
        ss.artist_id    AS artist_id,
        se.sessionId    AS session_id,
        se.location     AS location,
        se.userAgent    AS user_agent
FROM staging_events AS se
JOIN staging_songs AS ss
    ON (se.artist = ss.artist_name)
WHERE se.page = 'NextSong';";

const USER_INSERT: &str = "
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT  DISTINCT se.userId  AS user_id,
        se.firstName        AS first_name,
        se.lastName         AS last_name,
        se.gender           AS gender,
        se.level            AS level
FROM staging_events AS se
WHERE se.page = 'NextSong';";

const SONG_INSERT: &str = "
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT  DISTINCT ss.song_id AS song_id,
        ss.title            AS title,
        ss.artist_id        AS artist_id,
        ss.year             AS year,
        ss.duration         AS duration
FROM staging_songs AS ss;";

const ARTIST_INSERT: &str = "
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT  DISTINCT ss.artist_id   AS artist_id,
        ss.artist_name          AS name,
        ss.artist_location      AS location,
        ss.artist_latitude      AS latitude,
        ss.artist_longitude     AS longitude
FROM staging_songs AS ss;";

// `dow` is the day of week; `week` would duplicate the week column.
const TIME_INSERT: &str = "
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT  DISTINCT TIMESTAMP 'epoch' + se.ts/1000 * INTERVAL '1 second' AS start_time,
        EXTRACT(hour FROM start_time)   AS hour,
        EXTRACT(day FROM start_time)    AS day,
        EXTRACT(week FROM start_time)   AS week,
        EXTRACT(month FROM start_time)  AS month,
        EXTRACT(year FROM start_time)   AS year,
        EXTRACT(dow FROM start_time)    AS weekday
FROM staging_events AS se
WHERE se.page = 'NextSong';";

/// Insert steps in declaration order
pub fn sparkify_inserts() -> Vec<InsertStep> {
    vec![
        InsertStep { target: SONGPLAYS, reads: &[STAGING_EVENTS, STAGING_SONGS], sql: SONGPLAY_INSERT },
        InsertStep { target: USERS, reads: &[STAGING_EVENTS], sql: USER_INSERT },
        InsertStep { target: SONGS, reads: &[STAGING_SONGS], sql: SONG_INSERT },
        InsertStep { target: ARTISTS, reads: &[STAGING_SONGS], sql: ARTIST_INSERT },
        InsertStep { target: TIME, reads: &[STAGING_EVENTS], sql: TIME_INSERT },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_target_and_read_declared_tables() {
        for step in sparkify_inserts() {
            assert!(step.sql.contains(&format!("INSERT INTO {} (", step.target)));
            for table in step.reads {
                assert!(step.sql.contains(&format!("FROM {}", table)) || step.sql.contains(&format!("JOIN {}", table)));
            }
        }
    }

    #[test]
    fn event_sourced_inserts_filter_next_song() {
        for step in sparkify_inserts() {
            let reads_events = step.reads.contains(&STAGING_EVENTS);
            assert_eq!(step.sql.contains("WHERE se.page = 'NextSong'"), reads_events, "{}", step.target);
        }
    }

    #[test]
    fn weekday_uses_day_of_week() {
        assert!(TIME_INSERT.contains("EXTRACT(dow FROM start_time)    AS weekday"));
    }
}
