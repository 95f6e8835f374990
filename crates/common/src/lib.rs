use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Row id of an indexed root directory.
    MusicDirId
);
entity_id!(ArtistId);
entity_id!(
    /// Row id of an album. Also names the album's cached art file.
    AlbumId
);
entity_id!(TrackId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicDir {
    pub id: MusicDirId,
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
}

/// `artist_id == None` is the "unknown / various artists" bucket for `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub artist_id: Option<ArtistId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub file_path: PathBuf,
    pub parent_dir_id: MusicDirId,
    #[serde(default)]
    pub metadata: Option<TrackMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_id: TrackId,
    pub title: String,
    pub track_number: Option<u32>,
    pub artist_id: Option<ArtistId>,
    pub album_id: Option<AlbumId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Mp3,
    Flac,
}

impl Codec {
    pub const ALL: [Codec; 2] = [Codec::Flac, Codec::Mp3];

    /// Matches on the literal file-name suffix, so `song.MP3` is not recognized.
    pub fn from_path(path: &Path) -> Option<Codec> {
        let name = path.file_name()?.to_string_lossy();
        Codec::ALL
            .into_iter()
            .find(|codec| name.ends_with(codec.suffix()))
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Mp3 => ".mp3",
            Codec::Flac => ".flac",
        }
    }
}

/// Canonical form of `path` if it exists and is a directory.
pub fn canonical_dir(path: &Path) -> Option<PathBuf> {
    let canonical = fs::canonicalize(path).ok()?;
    canonical.is_dir().then_some(canonical)
}

/// Canonical form of `path` if it exists and is a regular file.
pub fn canonical_file(path: &Path) -> Option<PathBuf> {
    let canonical = fs::canonicalize(path).ok()?;
    canonical.is_file().then_some(canonical)
}

/// Text form used as the stored natural key of a path. `None` for paths that
/// are not valid UTF-8; a lossy form would let distinct files share a key.
pub fn path_key(path: &Path) -> Option<&str> {
    path.to_str()
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}
