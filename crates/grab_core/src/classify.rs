use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// File extension used for saved files of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image => "jpg",
        }
    }

    /// Name of the workspace subdirectory holding this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Image => "images",
        }
    }
}

/// A `(label, href)` pair scraped from the result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub label: Option<String>,
    pub href: String,
}

impl ExtractedLink {
    pub fn new(label: Option<&str>, href: impl Into<String>) -> Self {
        Self {
            label: label.map(ToOwned::to_owned),
            href: href.into(),
        }
    }
}

/// Links split into buckets, each in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifiedLinks {
    pub videos: Vec<ExtractedLink>,
    pub images: Vec<ExtractedLink>,
}

impl ClassifiedLinks {
    pub fn bucket(&self, kind: MediaKind) -> &[ExtractedLink] {
        match kind {
            MediaKind::Video => &self.videos,
            MediaKind::Image => &self.images,
        }
    }

    pub fn total(&self) -> usize {
        self.videos.len() + self.images.len()
    }
}

/// Decide the bucket for one link. Label signals win over extension signals;
/// anything unrecognised is kept as an image.
pub fn classify_link(label: Option<&str>, href: &str) -> MediaKind {
    let label = label.unwrap_or_default().to_lowercase();
    let path = href_path(href).to_ascii_lowercase();

    if label.contains("video") {
        MediaKind::Video
    } else if label.contains("image")
        || label.contains("photo")
        || has_extension(&path, IMAGE_EXTENSIONS)
    {
        MediaKind::Image
    } else if has_extension(&path, VIDEO_EXTENSIONS) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

pub fn classify(links: Vec<ExtractedLink>) -> ClassifiedLinks {
    let mut classified = ClassifiedLinks::default();
    for link in links {
        match classify_link(link.label.as_deref(), &link.href) {
            MediaKind::Video => classified.videos.push(link),
            MediaKind::Image => classified.images.push(link),
        }
    }
    classified
}

/// The href without query string or fragment.
fn href_path(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| path.ends_with(ext))
}
