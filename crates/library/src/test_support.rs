use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::Codec;
use metadata::{MetadataError, TagInfo};

use crate::extract::TagSource;

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tag source keyed by file name. Files without an entry read as untagged.
#[derive(Default)]
pub struct FakeTags {
    tags: HashMap<String, TagInfo>,
    covers: HashMap<String, Vec<u8>>,
    cover_reads: Counter,
}

impl FakeTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, file_name: &str, info: TagInfo) -> Self {
        self.tags.insert(file_name.to_string(), info);
        self
    }

    pub fn with_cover(mut self, file_name: &str, data: &[u8]) -> Self {
        self.covers.insert(file_name.to_string(), data.to_vec());
        self
    }

    pub fn cover_reads(&self) -> Counter {
        self.cover_reads.clone()
    }

    fn key(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl TagSource for FakeTags {
    fn read_tags(&self, path: &Path, _codec: Codec) -> Result<Option<TagInfo>, MetadataError> {
        Ok(self.tags.get(&Self::key(path)).cloned())
    }

    fn read_cover(&self, path: &Path, _codec: Codec) -> Result<Option<Vec<u8>>, MetadataError> {
        self.cover_reads.bump();
        Ok(self.covers.get(&Self::key(path)).cloned())
    }
}
