pub mod extract;
pub mod identity;
pub mod query;
pub mod remove;
pub mod scan;
pub mod schema;

#[cfg(test)]
mod test_support;

use std::fs;
use std::path::{Path, PathBuf};

use common::{Album, AlbumId, Artist, ArtistId, MusicDir, MusicDirId, Track, TrackId, TrackMetadata};
use metadata::MetadataError;
use rusqlite::Connection;
use tracing::info;

pub use extract::{ArtCache, LoftyTags, MetadataExtractor, TagSource};
pub use query::LibraryStats;

/// A music library backed by one SQLite connection. Owns the single writer
/// for the duration of a scan or removal.
pub struct Library {
    conn: Connection,
    extractor: MetadataExtractor,
}

impl Library {
    /// Opens (or creates) the database at `db_path` and initializes the schema.
    /// Album art is cached under `art_dir`.
    pub fn open(db_path: &Path, art_dir: PathBuf) -> Result<Self, LibraryError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::create_dir_all(&art_dir)?;
        let conn = Connection::open(db_path)?;
        info!("Opened library at {:?}", db_path);
        Self::with_connection(conn, MetadataExtractor::new(art_dir))
    }

    pub fn with_connection(
        conn: Connection,
        extractor: MetadataExtractor,
    ) -> Result<Self, LibraryError> {
        schema::initialize(&conn)?;
        Ok(Self { conn, extractor })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn art(&self) -> &ArtCache {
        self.extractor.art()
    }

    pub fn scan(&self, path: &Path) -> Result<Option<MusicDirId>, LibraryError> {
        scan::scan_directory(&self.conn, &self.extractor, path)
    }

    pub fn rebuild(&self) -> Result<LibraryStats, LibraryError> {
        scan::rebuild(&self.conn, &self.extractor)?;
        self.stats()
    }

    pub fn prune_missing(&mut self) -> Result<usize, LibraryError> {
        scan::prune_missing(&mut self.conn)
    }

    pub fn extract_and_store(
        &self,
        track_id: TrackId,
        file_path: &Path,
    ) -> Result<Option<TrackMetadata>, LibraryError> {
        self.extractor.extract_and_store(&self.conn, track_id, file_path)
    }

    pub fn remove_directory(&mut self, path: &Path) -> Result<bool, LibraryError> {
        remove::remove_directory(&mut self.conn, path)
    }

    pub fn remove_track(&mut self, track_id: TrackId) -> Result<bool, LibraryError> {
        remove::remove_track(&mut self.conn, track_id)
    }

    pub fn tracks_of_directory(&self, mdir_id: MusicDirId) -> Result<Vec<TrackId>, LibraryError> {
        remove::tracks_of_directory(&self.conn, mdir_id)
    }

    pub fn get_or_create_music_dir(&self, path: &Path) -> Result<Option<MusicDirId>, LibraryError> {
        identity::get_or_create_music_dir(&self.conn, path)
    }

    pub fn get_or_create_artist(&self, name: &str) -> Result<Option<ArtistId>, LibraryError> {
        identity::get_or_create_artist(&self.conn, name)
    }

    pub fn get_or_create_album(
        &self,
        name: &str,
        artist_id: Option<ArtistId>,
    ) -> Result<Option<AlbumId>, LibraryError> {
        identity::get_or_create_album(&self.conn, name, artist_id)
    }

    pub fn get_or_create_track(
        &self,
        file_path: &Path,
        parent_dir_id: MusicDirId,
    ) -> Result<Option<TrackId>, LibraryError> {
        identity::get_or_create_track(&self.conn, file_path, parent_dir_id)
    }

    pub fn list_music_dirs(&self) -> Result<Vec<MusicDir>, LibraryError> {
        query::list_music_dirs(&self.conn)
    }

    pub fn list_artists(&self) -> Result<Vec<Artist>, LibraryError> {
        query::list_artists(&self.conn)
    }

    pub fn list_albums(&self) -> Result<Vec<Album>, LibraryError> {
        query::list_albums(&self.conn)
    }

    pub fn list_tracks(&self) -> Result<Vec<Track>, LibraryError> {
        query::list_tracks(&self.conn)
    }

    pub fn get_artist(&self, id: ArtistId) -> Result<Option<Artist>, LibraryError> {
        query::get_artist(&self.conn, id)
    }

    pub fn get_album(&self, id: AlbumId) -> Result<Option<Album>, LibraryError> {
        query::get_album(&self.conn, id)
    }

    pub fn get_track(&self, id: TrackId) -> Result<Option<Track>, LibraryError> {
        query::get_track(&self.conn, id)
    }

    pub fn get_track_metadata(&self, id: TrackId) -> Result<Option<TrackMetadata>, LibraryError> {
        query::get_track_metadata(&self.conn, id)
    }

    pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
        query::stats(&self.conn)
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Db(rusqlite::Error),
    /// The schema could not be created; nothing else can run.
    Schema(rusqlite::Error),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Db(err) => write!(f, "db error: {}", err),
            LibraryError::Schema(err) => write!(f, "schema init failed: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        LibraryError::Db(err)
    }
}
