//! Table definitions for the Sparkify star schema
//!
//! Layout hints target Redshift: staging tables are distributed on the join
//! and session keys, small dimensions are replicated with `DISTSTYLE ALL`.

use sparkify_core::{TableDef, TableRole};

pub const STAGING_EVENTS: &str = "staging_events";
pub const STAGING_SONGS: &str = "staging_songs";
pub const SONGPLAYS: &str = "songplays";
pub const USERS: &str = "users";
pub const SONGS: &str = "songs";
pub const ARTISTS: &str = "artists";
pub const TIME: &str = "time";

const STAGING_EVENTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_events (
    artist          VARCHAR,
    auth            VARCHAR,
    firstName       VARCHAR,
    gender          VARCHAR,
    itemInSession   VARCHAR,
    lastName        VARCHAR,
    length          VARCHAR,
    level           VARCHAR,
    location        VARCHAR,
    method          VARCHAR,
    page            VARCHAR,
    registration    VARCHAR,
    sessionId       INTEGER     SORTKEY DISTKEY,
    song            VARCHAR,
    status          INTEGER,
    ts              BIGINT,
    userAgent       VARCHAR,
    userId          INTEGER
);";

const STAGING_SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs           INTEGER,
    artist_id           VARCHAR         SORTKEY DISTKEY,
    artist_latitude     DECIMAL(9),
    artist_longitude    DECIMAL(9),
    artist_location     VARCHAR(500),
    artist_name         VARCHAR(500),
    song_id             VARCHAR,
    title               VARCHAR(500),
    duration            DECIMAL(9),
    year                INTEGER
);";

const SONGPLAYS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id INTEGER IDENTITY(0,1)   NOT NULL SORTKEY,
    start_time  TIMESTAMP               NOT NULL,
    user_id     INTEGER                 NOT NULL DISTKEY,
    level       VARCHAR(10)             NOT NULL,
    song_id     VARCHAR(50)             NOT NULL,
    artist_id   VARCHAR(50)             NOT NULL,
    session_id  VARCHAR(50)             NOT NULL,
    location    VARCHAR(100)            NULL,
    user_agent  VARCHAR(255)            NULL
);";

const USERS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id     INTEGER                 NOT NULL SORTKEY,
    first_name  VARCHAR(50)             NULL,
    last_name   VARCHAR(80)             NULL,
    gender      VARCHAR(10)             NULL,
    level       VARCHAR(10)             NULL
) DISTSTYLE ALL;";

const SONGS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS songs (
    song_id     VARCHAR(50)             NOT NULL SORTKEY,
    title       VARCHAR(500)            NOT NULL,
    artist_id   VARCHAR(50)             NOT NULL,
    year        INTEGER                 NOT NULL,
    duration    DECIMAL(9)              NOT NULL
);";

const ARTISTS_CREATE: &str = "
CREATE TABLE IF NOT EXISTS artists (
    artist_id   VARCHAR(50)             NOT NULL SORTKEY,
    name        VARCHAR(500)            NULL,
    location    VARCHAR(500)            NULL,
    latitude    DECIMAL(9)              NULL,
    longitude   DECIMAL(9)              NULL
) DISTSTYLE ALL;";

const TIME_CREATE: &str = "
CREATE TABLE IF NOT EXISTS time (
    start_time  TIMESTAMP               NOT NULL SORTKEY,
    hour        SMALLINT                NULL,
    day         SMALLINT                NULL,
    week        SMALLINT                NULL,
    month       SMALLINT                NULL,
    year        SMALLINT                NULL,
    weekday     SMALLINT                NULL
) DISTSTYLE ALL;";

/// All managed tables, in drop/create order
pub fn sparkify_tables() -> Vec<TableDef> {
    vec![
        TableDef::new(STAGING_EVENTS, TableRole::Staging, STAGING_EVENTS_CREATE),
        TableDef::new(STAGING_SONGS, TableRole::Staging, STAGING_SONGS_CREATE),
        TableDef::new(SONGPLAYS, TableRole::Fact, SONGPLAYS_CREATE),
        TableDef::new(USERS, TableRole::Dimension, USERS_CREATE),
        TableDef::new(SONGS, TableRole::Dimension, SONGS_CREATE),
        TableDef::new(ARTISTS, TableRole::Dimension, ARTISTS_CREATE),
        TableDef::new(TIME, TableRole::Dimension, TIME_CREATE),
    ]
}
