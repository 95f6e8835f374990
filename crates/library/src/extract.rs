use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use common::{file_stem, AlbumId, ArtistId, Codec, TrackId, TrackMetadata};
use metadata::{MetadataError, TagInfo};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::identity::{get_or_create_album, get_or_create_artist, track_exists};
use crate::LibraryError;

/// Source of tag data and embedded pictures for a track file.
pub trait TagSource: Send {
    fn read_tags(&self, path: &Path, codec: Codec) -> Result<Option<TagInfo>, MetadataError>;

    fn read_cover(&self, path: &Path, codec: Codec) -> Result<Option<Vec<u8>>, MetadataError>;
}

/// Reads tags with lofty through the `metadata` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

impl TagSource for LoftyTags {
    fn read_tags(&self, path: &Path, _codec: Codec) -> Result<Option<TagInfo>, MetadataError> {
        metadata::read_tags(path)
    }

    fn read_cover(&self, path: &Path, codec: Codec) -> Result<Option<Vec<u8>>, MetadataError> {
        metadata::read_cover(path, codec)
    }
}

/// On-disk album art, one file per album named by the album id.
#[derive(Debug, Clone)]
pub struct ArtCache {
    dir: PathBuf,
}

impl ArtCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, album_id: AlbumId) -> PathBuf {
        self.dir.join(album_id.to_string())
    }

    pub fn contains(&self, album_id: AlbumId) -> bool {
        self.path_for(album_id).exists()
    }

    /// Writes `data` verbatim. The bytes land in a temp file first and are
    /// renamed into place, so readers never see a partial image.
    pub fn store(&self, album_id: AlbumId, data: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(album_id);
        let tmp = self.dir.join(format!(".{}.tmp", album_id));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Removes the cached art of an album. Returns whether a file was removed.
    pub fn evict(&self, album_id: AlbumId) -> io::Result<bool> {
        match fs::remove_file(self.path_for(album_id)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Turns a track's tags into a `track_metadata` row, resolving artist and
/// album identities and caching album art along the way.
pub struct MetadataExtractor {
    art: ArtCache,
    tags: Box<dyn TagSource>,
}

impl MetadataExtractor {
    pub fn new(art_dir: PathBuf) -> Self {
        Self::with_source(art_dir, Box::new(LoftyTags))
    }

    pub fn with_source(art_dir: PathBuf, tags: Box<dyn TagSource>) -> Self {
        Self {
            art: ArtCache::new(art_dir),
            tags,
        }
    }

    pub fn art(&self) -> &ArtCache {
        &self.art
    }

    /// Returns `Ok(None)` when the track id is unknown, the file is not a
    /// supported format, or it has no readable tags. No row is written then.
    pub fn extract_and_store(
        &self,
        conn: &Connection,
        track_id: TrackId,
        file_path: &Path,
    ) -> Result<Option<TrackMetadata>, LibraryError> {
        if !track_exists(conn, track_id)? {
            warn!("Metadata requested for unknown track {}", track_id);
            return Ok(None);
        }
        let codec = match Codec::from_path(file_path) {
            Some(codec) => codec,
            None => return Ok(None),
        };

        let tag = match self.tags.read_tags(file_path, codec) {
            Ok(Some(tag)) if !tag.is_empty() => tag,
            Ok(_) => {
                debug!("No tags in {:?}", file_path);
                return Ok(None);
            }
            Err(err) => {
                debug!("Failed to read tags for {:?}: {}", file_path, err);
                return Ok(None);
            }
        };

        let title = tag
            .title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| file_stem(file_path));
        // Encoders often write 0 instead of leaving the field out.
        let track_number = tag.track_no.filter(|n| *n != 0);

        let artist_id = match tag.artist.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => get_or_create_artist(conn, name)?,
            None => None,
        };
        let album_id = match tag.album.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => get_or_create_album(conn, name, artist_id)?,
            None => None,
        };

        if let Some(album_id) = album_id {
            self.cache_album_art(album_id, file_path, codec);
        }

        let metadata = TrackMetadata {
            track_id,
            title,
            track_number,
            artist_id,
            album_id,
        };
        store_metadata(conn, &metadata)?;
        Ok(Some(metadata))
    }

    fn cache_album_art(&self, album_id: AlbumId, file_path: &Path, codec: Codec) {
        if self.art.contains(album_id) {
            return;
        }
        let data = match self.tags.read_cover(file_path, codec) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(err) => {
                debug!("Failed to read cover from {:?}: {}", file_path, err);
                return;
            }
        };
        match self.art.store(album_id, &data) {
            Ok(path) => debug!("Cached album art at {:?}", path),
            Err(err) => warn!("Failed to cache art for album {}: {}", album_id, err),
        }
    }
}

fn store_metadata(conn: &Connection, metadata: &TrackMetadata) -> Result<(), LibraryError> {
    conn.execute(
        "INSERT OR REPLACE INTO track_metadata (track_id, title, track_number, artist_id, album_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            metadata.track_id.get(),
            metadata.title,
            metadata.track_number,
            metadata.artist_id.map(ArtistId::get),
            metadata.album_id.map(AlbumId::get),
        ],
    )?;
    Ok(())
}
