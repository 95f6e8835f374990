use rusqlite::Connection;
use tracing::error;

use crate::LibraryError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS music_dirs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    path            TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS artists (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS albums (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    artist_id       INTEGER REFERENCES artists(id),
    UNIQUE (name, artist_id)
);

-- UNIQUE treats NULLs as distinct; keep one unknown-artist album per name.
CREATE UNIQUE INDEX IF NOT EXISTS albums_unknown_artist_name
    ON albums(name) WHERE artist_id IS NULL;

CREATE TABLE IF NOT EXISTS tracks (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path       TEXT NOT NULL UNIQUE,
    parent_dir_id   INTEGER NOT NULL REFERENCES music_dirs(id)
);

CREATE INDEX IF NOT EXISTS tracks_parent_dir ON tracks(parent_dir_id);

CREATE TABLE IF NOT EXISTS track_metadata (
    track_id        INTEGER PRIMARY KEY REFERENCES tracks(id),
    title           TEXT NOT NULL,
    track_number    INTEGER,
    artist_id       INTEGER REFERENCES artists(id),
    album_id        INTEGER REFERENCES albums(id)
);
";

/// Enables foreign keys on `conn` and creates any missing table. Safe to run
/// against an already initialized database.
pub fn initialize(conn: &Connection) -> Result<(), LibraryError> {
    let result = conn
        .pragma_update(None, "foreign_keys", true)
        .and_then(|_| conn.execute_batch(SCHEMA));
    if let Err(err) = result {
        error!("Failed to initialize library schema: {}", err);
        return Err(LibraryError::Schema(err));
    }
    Ok(())
}
