use serde::{Deserialize, Serialize};

use crate::MediaKind;

/// URLs already saved for one user, split by kind.
///
/// Serialized as `{ "videos": [...], "images": [...] }`. Lists keep insertion
/// order and never hold duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadRecord {
    #[serde(default)]
    videos: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
}

impl DownloadRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Video => &self.videos,
            MediaKind::Image => &self.images,
        }
    }

    pub fn contains(&self, kind: MediaKind, url: &str) -> bool {
        self.urls(kind).iter().any(|known| known == url)
    }

    /// Returns false when the url was already present.
    pub fn insert(&mut self, kind: MediaKind, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.contains(kind, &url) {
            return false;
        }
        match kind {
            MediaKind::Video => self.videos.push(url),
            MediaKind::Image => self.images.push(url),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.videos.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
