use std::path::PathBuf;

use common::{
    Album, AlbumId, Artist, ArtistId, MusicDir, MusicDirId, Track, TrackId, TrackMetadata,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::LibraryError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub music_dirs: usize,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub tagged_tracks: usize,
}

const TRACK_SELECT: &str = "
    SELECT t.id, t.file_path, t.parent_dir_id,
           tm.track_id, tm.title, tm.track_number, tm.artist_id, tm.album_id
    FROM tracks t
    LEFT JOIN track_metadata tm ON tm.track_id = t.id";

fn music_dir_from_row(row: &Row<'_>) -> rusqlite::Result<MusicDir> {
    Ok(MusicDir {
        id: MusicDirId::new(row.get(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
    })
}

fn artist_from_row(row: &Row<'_>) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: ArtistId::new(row.get(0)?),
        name: row.get(1)?,
    })
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: AlbumId::new(row.get(0)?),
        name: row.get(1)?,
        artist_id: row.get::<_, Option<i64>>(2)?.map(ArtistId::new),
    })
}

fn metadata_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<TrackMetadata> {
    Ok(TrackMetadata {
        track_id: TrackId::new(row.get(offset)?),
        title: row.get(offset + 1)?,
        track_number: row.get(offset + 2)?,
        artist_id: row.get::<_, Option<i64>>(offset + 3)?.map(ArtistId::new),
        album_id: row.get::<_, Option<i64>>(offset + 4)?.map(AlbumId::new),
    })
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let metadata = match row.get::<_, Option<i64>>(3)? {
        Some(_) => Some(metadata_from_row(row, 3)?),
        None => None,
    };
    Ok(Track {
        id: TrackId::new(row.get(0)?),
        file_path: PathBuf::from(row.get::<_, String>(1)?),
        parent_dir_id: MusicDirId::new(row.get(2)?),
        metadata,
    })
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, LibraryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn list_music_dirs(conn: &Connection) -> Result<Vec<MusicDir>, LibraryError> {
    collect(conn, "SELECT id, path FROM music_dirs ORDER BY id", music_dir_from_row)
}

pub fn list_artists(conn: &Connection) -> Result<Vec<Artist>, LibraryError> {
    collect(conn, "SELECT id, name FROM artists ORDER BY id", artist_from_row)
}

pub fn list_albums(conn: &Connection) -> Result<Vec<Album>, LibraryError> {
    collect(
        conn,
        "SELECT id, name, artist_id FROM albums ORDER BY id",
        album_from_row,
    )
}

/// Every track with its metadata, if any was extracted.
pub fn list_tracks(conn: &Connection) -> Result<Vec<Track>, LibraryError> {
    collect(conn, &format!("{} ORDER BY t.id", TRACK_SELECT), track_from_row)
}

pub fn get_music_dir(conn: &Connection, id: MusicDirId) -> Result<Option<MusicDir>, LibraryError> {
    Ok(conn
        .query_row(
            "SELECT id, path FROM music_dirs WHERE id = ?1",
            params![id.get()],
            music_dir_from_row,
        )
        .optional()?)
}

pub fn get_artist(conn: &Connection, id: ArtistId) -> Result<Option<Artist>, LibraryError> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM artists WHERE id = ?1",
            params![id.get()],
            artist_from_row,
        )
        .optional()?)
}

pub fn get_album(conn: &Connection, id: AlbumId) -> Result<Option<Album>, LibraryError> {
    Ok(conn
        .query_row(
            "SELECT id, name, artist_id FROM albums WHERE id = ?1",
            params![id.get()],
            album_from_row,
        )
        .optional()?)
}

pub fn get_track(conn: &Connection, id: TrackId) -> Result<Option<Track>, LibraryError> {
    Ok(conn
        .query_row(
            &format!("{} WHERE t.id = ?1", TRACK_SELECT),
            params![id.get()],
            track_from_row,
        )
        .optional()?)
}

pub fn get_track_metadata(
    conn: &Connection,
    track_id: TrackId,
) -> Result<Option<TrackMetadata>, LibraryError> {
    Ok(conn
        .query_row(
            "SELECT track_id, title, track_number, artist_id, album_id
             FROM track_metadata WHERE track_id = ?1",
            params![track_id.get()],
            |row| metadata_from_row(row, 0),
        )
        .optional()?)
}

pub fn stats(conn: &Connection) -> Result<LibraryStats, LibraryError> {
    let count = |table: &str| -> Result<usize, LibraryError> {
        let value: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(value as usize)
    };
    Ok(LibraryStats {
        music_dirs: count("music_dirs")?,
        artists: count("artists")?,
        albums: count("albums")?,
        tracks: count("tracks")?,
        tagged_tracks: count("track_metadata")?,
    })
}
