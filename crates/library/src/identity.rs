//! Get-or-create operations, one set per entity kind.
//!
//! Every kind exposes the same three operations: a pure lookup by natural key,
//! an existence check by id, and `get_or_create_*`, which returns the existing
//! id or validates references, inserts and returns the new id. A rejected
//! precondition (bad path, dangling reference) is logged and yields `Ok(None)`;
//! `Err` only carries store faults.

use std::path::Path;

use common::{canonical_dir, canonical_file, path_key, AlbumId, ArtistId, MusicDirId, TrackId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::LibraryError;

// Lookups by path try the canonical form first so relative and symlinked
// spellings hit the same row; a path that no longer exists is looked up as
// given. Non-UTF-8 paths have no key and are never stored.
fn lookup_key(path: &Path) -> Option<String> {
    match std::fs::canonicalize(path) {
        Ok(canonical) => path_key(&canonical).map(str::to_string),
        Err(_) => path_key(path).map(str::to_string),
    }
}

fn storable_key<'a>(path: &'a Path) -> Option<&'a str> {
    let key = path_key(path);
    if key.is_none() {
        warn!("Path is not valid UTF-8, skipping: {:?}", path);
    }
    key
}

fn row_exists(conn: &Connection, sql: &str, id: i64) -> Result<bool, LibraryError> {
    let exists: bool = conn.query_row(sql, params![id], |row| row.get(0))?;
    Ok(exists)
}

// --- music directories ---

pub fn music_dir_id(conn: &Connection, path: &Path) -> Result<Option<MusicDirId>, LibraryError> {
    let key = match lookup_key(path) {
        Some(key) => key,
        None => return Ok(None),
    };
    let id = conn
        .query_row(
            "SELECT id FROM music_dirs WHERE path = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(MusicDirId::new))
}

pub fn music_dir_exists(conn: &Connection, id: MusicDirId) -> Result<bool, LibraryError> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM music_dirs WHERE id = ?1)",
        id.get(),
    )
}

pub fn get_or_create_music_dir(
    conn: &Connection,
    path: &Path,
) -> Result<Option<MusicDirId>, LibraryError> {
    let canonical = match canonical_dir(path) {
        Some(canonical) => canonical,
        None => {
            warn!("Path does not exist or is not a directory: {:?}", path);
            return Ok(None);
        }
    };
    let key = match storable_key(&canonical) {
        Some(key) => key,
        None => return Ok(None),
    };
    if let Some(id) = music_dir_id(conn, &canonical)? {
        return Ok(Some(id));
    }
    conn.execute(
        "INSERT OR IGNORE INTO music_dirs (path) VALUES (?1)",
        params![key],
    )?;
    music_dir_id(conn, &canonical)
}

// --- artists ---

pub fn artist_id(conn: &Connection, name: &str) -> Result<Option<ArtistId>, LibraryError> {
    let id = conn
        .query_row(
            "SELECT id FROM artists WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(ArtistId::new))
}

pub fn artist_exists(conn: &Connection, id: ArtistId) -> Result<bool, LibraryError> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM artists WHERE id = ?1)",
        id.get(),
    )
}

pub fn get_or_create_artist(conn: &Connection, name: &str) -> Result<Option<ArtistId>, LibraryError> {
    if let Some(id) = artist_id(conn, name)? {
        return Ok(Some(id));
    }
    conn.execute("INSERT OR IGNORE INTO artists (name) VALUES (?1)", params![name])?;
    artist_id(conn, name)
}

// --- albums ---

pub fn album_id(
    conn: &Connection,
    name: &str,
    artist_id: Option<ArtistId>,
) -> Result<Option<AlbumId>, LibraryError> {
    // `IS` so that a NULL artist matches the unknown-artist row.
    let id = conn
        .query_row(
            "SELECT id FROM albums WHERE name = ?1 AND artist_id IS ?2",
            params![name, artist_id.map(ArtistId::get)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(AlbumId::new))
}

pub fn album_exists(conn: &Connection, id: AlbumId) -> Result<bool, LibraryError> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM albums WHERE id = ?1)",
        id.get(),
    )
}

pub fn get_or_create_album(
    conn: &Connection,
    name: &str,
    artist_id: Option<ArtistId>,
) -> Result<Option<AlbumId>, LibraryError> {
    if let Some(artist) = artist_id {
        if !artist_exists(conn, artist)? {
            warn!("Album {:?} references unknown artist {}", name, artist);
            return Ok(None);
        }
    }
    if let Some(id) = album_id(conn, name, artist_id)? {
        return Ok(Some(id));
    }
    conn.execute(
        "INSERT OR IGNORE INTO albums (name, artist_id) VALUES (?1, ?2)",
        params![name, artist_id.map(ArtistId::get)],
    )?;
    album_id(conn, name, artist_id)
}

// --- tracks ---

pub fn track_id(conn: &Connection, file_path: &Path) -> Result<Option<TrackId>, LibraryError> {
    let key = match lookup_key(file_path) {
        Some(key) => key,
        None => return Ok(None),
    };
    let id = conn
        .query_row(
            "SELECT id FROM tracks WHERE file_path = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(TrackId::new))
}

pub fn track_exists(conn: &Connection, id: TrackId) -> Result<bool, LibraryError> {
    row_exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?1)",
        id.get(),
    )
}

pub fn get_or_create_track(
    conn: &Connection,
    file_path: &Path,
    parent_dir_id: MusicDirId,
) -> Result<Option<TrackId>, LibraryError> {
    if !music_dir_exists(conn, parent_dir_id)? {
        warn!(
            "Track {:?} references unknown music directory {}",
            file_path, parent_dir_id
        );
        return Ok(None);
    }
    let canonical = match canonical_file(file_path) {
        Some(canonical) => canonical,
        None => {
            warn!("Path does not exist or is not a regular file: {:?}", file_path);
            return Ok(None);
        }
    };
    let key = match storable_key(&canonical) {
        Some(key) => key,
        None => return Ok(None),
    };
    if let Some(id) = track_id(conn, &canonical)? {
        return Ok(Some(id));
    }
    conn.execute(
        "INSERT OR IGNORE INTO tracks (file_path, parent_dir_id) VALUES (?1, ?2)",
        params![key, parent_dir_id.get()],
    )?;
    track_id(conn, &canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use std::fs;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::initialize(&conn).unwrap();
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn music_dir_resolution_is_idempotent_and_canonical() {
        let conn = store();
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();

        let first = get_or_create_music_dir(&conn, root.path()).unwrap().unwrap();
        let dotted = root.path().join("sub").join("..");
        let second = get_or_create_music_dir(&conn, &dotted).unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&conn, "music_dirs"), 1);
        assert_eq!(music_dir_id(&conn, &dotted).unwrap(), Some(first));
        assert!(music_dir_exists(&conn, first).unwrap());
    }

    #[test]
    fn stored_dir_path_is_canonical() {
        let conn = store();
        let root = tempfile::tempdir().unwrap();
        let id = get_or_create_music_dir(&conn, root.path()).unwrap().unwrap();

        let stored: String = conn
            .query_row("SELECT path FROM music_dirs WHERE id = ?1", [id.get()], |row| row.get(0))
            .unwrap();
        let canonical = fs::canonicalize(root.path()).unwrap();
        assert_eq!(stored, canonical.to_string_lossy());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dir_resolves_to_same_row() {
        let conn = store();
        let root = tempfile::tempdir().unwrap();
        let real = root.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = root.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let a = get_or_create_music_dir(&conn, &real).unwrap();
        let b = get_or_create_music_dir(&conn, &link).unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn music_dir_rejects_missing_and_file_paths() {
        let conn = store();
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("a.mp3");
        fs::write(&file, b"").unwrap();

        assert_eq!(get_or_create_music_dir(&conn, &root.path().join("nope")).unwrap(), None);
        assert_eq!(get_or_create_music_dir(&conn, &file).unwrap(), None);
        assert_eq!(count(&conn, "music_dirs"), 0);
    }

    #[test]
    fn artists_are_unique_by_name() {
        let conn = store();
        let alice = get_or_create_artist(&conn, "Alice").unwrap().unwrap();
        let bob = get_or_create_artist(&conn, "Bob").unwrap().unwrap();

        assert_ne!(alice, bob);
        assert_eq!(get_or_create_artist(&conn, "Alice").unwrap(), Some(alice));
        assert_eq!(artist_id(&conn, "Bob").unwrap(), Some(bob));
        assert_eq!(artist_id(&conn, "Carol").unwrap(), None);
        assert!(!artist_exists(&conn, ArtistId::new(999)).unwrap());
    }

    #[test]
    fn albums_are_bucketed_by_artist() {
        let conn = store();
        let y = get_or_create_artist(&conn, "Y").unwrap().unwrap();

        let unknown = get_or_create_album(&conn, "X", None).unwrap().unwrap();
        let unknown_again = get_or_create_album(&conn, "X", None).unwrap().unwrap();
        let by_y = get_or_create_album(&conn, "X", Some(y)).unwrap().unwrap();
        let by_y_again = get_or_create_album(&conn, "X", Some(y)).unwrap().unwrap();

        assert_eq!(unknown, unknown_again);
        assert_eq!(by_y, by_y_again);
        assert_ne!(unknown, by_y);
        assert_eq!(count(&conn, "albums"), 2);
        assert_eq!(album_id(&conn, "X", None).unwrap(), Some(unknown));
        assert!(album_exists(&conn, by_y).unwrap());
    }

    #[test]
    fn album_with_unknown_artist_id_is_rejected() {
        let conn = store();
        assert_eq!(
            get_or_create_album(&conn, "X", Some(ArtistId::new(7))).unwrap(),
            None
        );
        assert_eq!(count(&conn, "albums"), 0);
    }

    #[test]
    fn tracks_require_existing_dir_and_file() {
        let conn = store();
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("a.flac");
        fs::write(&file, b"").unwrap();
        let dir = get_or_create_music_dir(&conn, root.path()).unwrap().unwrap();

        assert_eq!(get_or_create_track(&conn, &file, MusicDirId::new(dir.get() + 1)).unwrap(), None);
        assert_eq!(get_or_create_track(&conn, &root.path().join("gone.flac"), dir).unwrap(), None);
        assert_eq!(get_or_create_track(&conn, root.path(), dir).unwrap(), None);
        assert_eq!(count(&conn, "tracks"), 0);

        let track = get_or_create_track(&conn, &file, dir).unwrap().unwrap();
        let dotted = root.path().join(".").join("a.flac");
        assert_eq!(get_or_create_track(&conn, &dotted, dir).unwrap(), Some(track));
        assert_eq!(track_id(&conn, &dotted).unwrap(), Some(track));
        assert!(track_exists(&conn, track).unwrap());
        assert_eq!(count(&conn, "tracks"), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_file_names_are_not_merged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let conn = store();
        let root = tempfile::tempdir().unwrap();
        let dir = get_or_create_music_dir(&conn, root.path()).unwrap().unwrap();
        let first = root.path().join(OsStr::from_bytes(b"a\xff.mp3"));
        let second = root.path().join(OsStr::from_bytes(b"a\xfe.mp3"));
        fs::write(&first, b"").unwrap();
        fs::write(&second, b"").unwrap();

        assert_eq!(get_or_create_track(&conn, &first, dir).unwrap(), None);
        assert_eq!(get_or_create_track(&conn, &second, dir).unwrap(), None);
        assert_eq!(track_id(&conn, &first).unwrap(), None);
        assert_eq!(count(&conn, "tracks"), 0);

        let odd_dir = root.path().join(OsStr::from_bytes(b"d\xff"));
        fs::create_dir(&odd_dir).unwrap();
        assert_eq!(get_or_create_music_dir(&conn, &odd_dir).unwrap(), None);
        assert_eq!(music_dir_id(&conn, &odd_dir).unwrap(), None);
        assert_eq!(count(&conn, "music_dirs"), 1);
    }
}
