//! Grab core: pure domain rules for the media pipeline.
mod classify;
mod extraction;
mod naming;
mod partition;
mod record;
mod summary;
mod user;

pub use classify::{classify, classify_link, ClassifiedLinks, ExtractedLink, MediaKind};
pub use extraction::{advance, ExtractionEvent, ExtractionStage};
pub use naming::filename_for;
pub use partition::{parse_url_list, partition_round_robin};
pub use record::DownloadRecord;
pub use summary::{RunSummary, UrlReport};
pub use user::{resolve_user, UserId, FALLBACK_MAX_CHARS};
