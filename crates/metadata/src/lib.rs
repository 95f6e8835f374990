use std::fmt;
use std::fs::File;
use std::path::Path;

use common::Codec;
use lofty::config::ParseOptions;
use lofty::error::LoftyError;
use lofty::flac::FlacFile;
use lofty::mpeg::MpegFile;
use lofty::ogg::OggPictureStorage;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::{Accessor, AudioFile, ItemKey, TaggedFileExt};
use lofty::tag::Tag;

/// Basic tag fields of a track. Empty strings are already filtered out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_no: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub comment: Option<String>,
}

impl TagInfo {
    /// No field at all is set. A tag carrying only a year, genre or comment
    /// still counts as tagged.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.track_no.is_none()
            && self.year.is_none()
            && self.genre.is_none()
            && self.comment.is_none()
    }
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Reads the primary tag of `path`. `Ok(None)` means the file carries no
/// usable tag data at all.
pub fn read_tags(path: &Path) -> Result<Option<TagInfo>, MetadataError> {
    let tagged_file = lofty::read_from_path(path)?;
    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let info = TagInfo {
        title: non_empty(tag.get_string(&ItemKey::TrackTitle)),
        artist: non_empty(
            tag.get_string(&ItemKey::TrackArtist)
                .or_else(|| tag.get_string(&ItemKey::AlbumArtist)),
        ),
        album: non_empty(tag.get_string(&ItemKey::AlbumTitle)),
        track_no: tag
            .get_string(&ItemKey::TrackNumber)
            .and_then(parse_track_number),
        year: tag.year(),
        genre: non_empty(tag.get_string(&ItemKey::Genre)),
        comment: non_empty(tag.get_string(&ItemKey::Comment)),
    };

    if info.is_empty() {
        Ok(None)
    } else {
        Ok(Some(info))
    }
}

/// Raw bytes of the embedded front cover (or first picture), read the way the
/// container stores it: FLAC picture blocks, or ID3v2 `APIC` frames for MP3.
pub fn read_cover(path: &Path, codec: Codec) -> Result<Option<Vec<u8>>, MetadataError> {
    match codec {
        Codec::Flac => read_flac_cover(path),
        Codec::Mp3 => read_mp3_cover(path),
    }
}

fn read_flac_cover(path: &Path) -> Result<Option<Vec<u8>>, MetadataError> {
    let mut file = File::open(path)?;
    let flac = FlacFile::read_from(&mut file, ParseOptions::new())?;
    let pictures: Vec<&Picture> = flac.pictures().iter().map(|(picture, _)| picture).collect();
    Ok(pick_picture(&pictures).map(|picture| picture.data().to_vec()))
}

fn read_mp3_cover(path: &Path) -> Result<Option<Vec<u8>>, MetadataError> {
    let mut file = File::open(path)?;
    let mpeg = MpegFile::read_from(&mut file, ParseOptions::new())?;
    let id3v2 = match mpeg.id3v2() {
        Some(tag) => tag,
        None => return Ok(None),
    };
    let tag: Tag = id3v2.clone().into();
    let pictures: Vec<&Picture> = tag.pictures().iter().collect();
    Ok(pick_picture(&pictures).map(|picture| picture.data().to_vec()))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Accepts `"7"` and `"7/12"`. Zero is kept; callers decide what it means.
fn parse_track_number(text: &str) -> Option<u32> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn pick_picture<'a>(pictures: &[&'a Picture]) -> Option<&'a Picture> {
    for picture in pictures {
        if picture.pic_type() == PictureType::CoverFront {
            return Some(*picture);
        }
    }
    pictures.first().copied()
}

#[cfg(test)]
mod tests {
    use super::{parse_track_number, read_cover, read_tags, TagInfo};
    use common::Codec;
    use lofty::config::WriteOptions;
    use lofty::picture::{MimeType, Picture, PictureType};
    use lofty::prelude::{Accessor, TagExt};
    use lofty::tag::{Tag, TagType};
    use std::fs;
    use std::path::Path;

    const FRONT: &[u8] = b"PNGDATA-front";
    const BACK: &[u8] = b"PNGDATA-back";

    // Four silent MPEG-1 layer III frames, 128 kbps at 44.1 kHz.
    fn write_mp3(path: &Path) {
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
            bytes.extend(std::iter::repeat(0u8).take(413));
        }
        fs::write(path, bytes).unwrap();
    }

    // Marker plus a lone STREAMINFO block: 44.1 kHz, stereo, 16 bit.
    fn write_flac(path: &Path) {
        let mut bytes = b"fLaC".to_vec();
        bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
        bytes.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
        bytes.extend_from_slice(&[0x00; 6]);
        bytes.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0]);
        bytes.extend_from_slice(&[0x00; 4]);
        bytes.extend_from_slice(&[0x00; 16]);
        fs::write(path, bytes).unwrap();
    }

    fn picture(kind: PictureType, data: &[u8]) -> Picture {
        Picture::new_unchecked(kind, Some(MimeType::Png), None, data.to_vec())
    }

    fn save_tag(path: &Path, tag_type: TagType) {
        let mut tag = Tag::new(tag_type);
        tag.set_title("Track One".to_string());
        tag.set_artist("Alice".to_string());
        tag.set_album("Album A".to_string());
        tag.set_track(3);
        tag.push_picture(picture(PictureType::CoverBack, BACK));
        tag.push_picture(picture(PictureType::CoverFront, FRONT));
        tag.save_to_path(path, WriteOptions::default()).unwrap();
    }

    fn expected() -> TagInfo {
        TagInfo {
            title: Some("Track One".to_string()),
            artist: Some("Alice".to_string()),
            album: Some("Album A".to_string()),
            track_no: Some(3),
            ..TagInfo::default()
        }
    }

    #[test]
    fn reads_id3v2_tags_and_apic_cover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.mp3");
        write_mp3(&path);
        save_tag(&path, TagType::Id3v2);

        assert_eq!(read_tags(&path).unwrap(), Some(expected()));
        assert_eq!(read_cover(&path, Codec::Mp3).unwrap(), Some(FRONT.to_vec()));
    }

    #[test]
    fn reads_vorbis_comments_and_flac_picture_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.flac");
        write_flac(&path);
        save_tag(&path, TagType::VorbisComments);

        assert_eq!(read_tags(&path).unwrap(), Some(expected()));
        assert_eq!(read_cover(&path, Codec::Flac).unwrap(), Some(FRONT.to_vec()));
    }

    #[test]
    fn untagged_mp3_has_no_tags_or_cover() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.mp3");
        write_mp3(&path);

        assert_eq!(read_tags(&path).unwrap(), None);
        assert_eq!(read_cover(&path, Codec::Mp3).unwrap(), None);
    }

    #[test]
    fn genre_alone_counts_as_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genre.mp3");
        write_mp3(&path);
        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_genre("Ambient".to_string());
        tag.save_to_path(&path, WriteOptions::default()).unwrap();

        let info = read_tags(&path).unwrap().unwrap();
        assert_eq!(info.genre.as_deref(), Some("Ambient"));
        assert!(info.title.is_none());
        assert!(!info.is_empty());
    }

    #[test]
    fn parses_track_numbers() {
        assert_eq!(parse_track_number("7"), Some(7));
        assert_eq!(parse_track_number(" 3/12 "), Some(3));
        assert_eq!(parse_track_number("0"), Some(0));
        assert_eq!(parse_track_number("A1"), None);
    }

    #[test]
    fn empty_tag_info_is_empty() {
        assert!(TagInfo::default().is_empty());
        let numbered = TagInfo {
            track_no: Some(1),
            ..TagInfo::default()
        };
        assert!(!numbered.is_empty());
        let commented = TagInfo {
            comment: Some("rip".to_string()),
            ..TagInfo::default()
        };
        assert!(!commented.is_empty());
    }

    #[test]
    fn unreadable_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.flac");
        fs::write(&path, b"definitely not audio").unwrap();

        assert!(read_tags(&path).is_err());
        assert!(read_cover(&path, Codec::Flac).is_err());
        assert!(read_tags(&dir.path().join("missing.mp3")).is_err());
    }
}
