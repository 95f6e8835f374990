use std::path::Path;

use common::{canonical_dir, canonical_file, Codec, MusicDirId, TrackId};
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::extract::MetadataExtractor;
use crate::identity::{get_or_create_music_dir, get_or_create_track};
use crate::query::list_music_dirs;
use crate::remove::remove_track;
use crate::LibraryError;

/// Indexes every supported file below `path`. Returns the directory's id, or
/// `None` when `path` is not an existing directory.
///
/// Files that fail to index are logged and skipped; they never abort the walk.
pub fn scan_directory(
    conn: &Connection,
    extractor: &MetadataExtractor,
    path: &Path,
) -> Result<Option<MusicDirId>, LibraryError> {
    let root = match canonical_dir(path) {
        Some(root) => root,
        None => {
            warn!("Path does not exist or is not a directory: {:?}", path);
            return Ok(None);
        }
    };
    let dir_id = match get_or_create_music_dir(conn, &root)? {
        Some(id) => id,
        None => return Ok(None),
    };
    info!("Scanning {:?}", root);

    let mut indexed = 0usize;
    let mut tagged = 0usize;
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };
        if Codec::from_path(entry.path()).is_none() {
            continue;
        }
        // Symlinked files count only when their target is itself a supported
        // file inside this root.
        let target = match canonical_file(entry.path()) {
            Some(target) if target.starts_with(&root) && Codec::from_path(&target).is_some() => {
                target
            }
            Some(target) => {
                debug!("Skipping {:?} -> {:?}", entry.path(), target);
                continue;
            }
            None => continue,
        };
        let file = target.as_path();

        match index_file(conn, extractor, file, dir_id) {
            Ok(Some(has_metadata)) => {
                indexed += 1;
                if has_metadata {
                    tagged += 1;
                }
                debug!("{} - indexed {:?}", indexed, file);
            }
            Ok(None) => {}
            Err(err) => warn!("Failed to index {:?}: {}", file, err),
        }
    }

    info!(
        "Scanned {:?}: {} tracks, {} with metadata",
        root, indexed, tagged
    );
    Ok(Some(dir_id))
}

// Ok(None): no track row. Ok(Some(tagged)): track row, with or without metadata.
fn index_file(
    conn: &Connection,
    extractor: &MetadataExtractor,
    file: &Path,
    dir_id: MusicDirId,
) -> Result<Option<bool>, LibraryError> {
    let track_id = match get_or_create_track(conn, file, dir_id)? {
        Some(id) => id,
        None => return Ok(None),
    };
    let metadata = extractor.extract_and_store(conn, track_id, file)?;
    Ok(Some(metadata.is_some()))
}

/// Rescans every known music directory. Tracks whose files vanished stay in
/// the store; see [`prune_missing`].
pub fn rebuild(conn: &Connection, extractor: &MetadataExtractor) -> Result<(), LibraryError> {
    let dirs = list_music_dirs(conn)?;
    info!("Rebuilding library from {} directories", dirs.len());
    for dir in dirs {
        match scan_directory(conn, extractor, &dir.path) {
            Ok(Some(_)) => {}
            Ok(None) => warn!("Indexed directory is gone: {:?}", dir.path),
            Err(err) => warn!("Failed to rescan {:?}: {}", dir.path, err),
        }
    }
    Ok(())
}

/// Removes tracks whose backing file is no longer a regular file. Returns the
/// number of tracks removed.
pub fn prune_missing(conn: &mut Connection) -> Result<usize, LibraryError> {
    let missing: Vec<_> = {
        let mut stmt = conn.prepare("SELECT id, file_path FROM tracks ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut missing = Vec::new();
        for row in rows {
            let (id, file_path) = row?;
            if !Path::new(&file_path).is_file() {
                missing.push((TrackId::new(id), file_path));
            }
        }
        missing
    };

    let mut removed = 0usize;
    for (id, file_path) in missing {
        if remove_track(conn, id)? {
            debug!("Pruned missing file {:?}", file_path);
            removed += 1;
        }
    }
    if removed > 0 {
        info!("Pruned {} tracks with missing files", removed);
    }
    Ok(removed)
}
