use std::path::Path;

use common::{canonical_dir, MusicDirId, TrackId};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::identity::music_dir_id;
use crate::LibraryError;

/// Ids of the tracks bound to a music directory. Empty for unknown ids.
pub fn tracks_of_directory(
    conn: &Connection,
    mdir_id: MusicDirId,
) -> Result<Vec<TrackId>, LibraryError> {
    let mut stmt = conn.prepare("SELECT id FROM tracks WHERE parent_dir_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![mdir_id.get()], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(TrackId::new(row?));
    }
    Ok(ids)
}

/// Deletes a music directory with its tracks and their metadata, in a single
/// transaction. Returns `false` when `path` is not a directory on disk or not
/// an indexed root.
pub fn remove_directory(conn: &mut Connection, path: &Path) -> Result<bool, LibraryError> {
    let canonical = match canonical_dir(path) {
        Some(canonical) => canonical,
        None => {
            warn!("Path does not exist or is not a directory: {:?}", path);
            return Ok(false);
        }
    };
    let dir_id = match music_dir_id(conn, &canonical)? {
        Some(id) => id,
        None => {
            warn!("Directory is not in the library: {:?}", canonical);
            return Ok(false);
        }
    };

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM track_metadata
         WHERE track_id IN (SELECT id FROM tracks WHERE parent_dir_id = ?1)",
        params![dir_id.get()],
    )?;
    let tracks = tx.execute(
        "DELETE FROM tracks WHERE parent_dir_id = ?1",
        params![dir_id.get()],
    )?;
    tx.execute("DELETE FROM music_dirs WHERE id = ?1", params![dir_id.get()])?;
    tx.commit()?;

    info!("Removed {:?} ({} tracks)", canonical, tracks);
    Ok(true)
}

/// Deletes one track and its metadata. Returns whether the track existed.
pub fn remove_track(conn: &mut Connection, track_id: TrackId) -> Result<bool, LibraryError> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM track_metadata WHERE track_id = ?1",
        params![track_id.get()],
    )?;
    let removed = tx.execute("DELETE FROM tracks WHERE id = ?1", params![track_id.get()])?;
    tx.commit()?;
    Ok(removed > 0)
}
