use std::fmt;

use url::Url;

/// Host suffix of the platform whose profile URLs we know how to read.
const PLATFORM_HOST: &str = "instagram.com";

/// Path prefixes that are followed by the identifying segment, in match order.
const PREFIXED_SHAPES: &[&str] = &["stories", "u", "p"];

/// Upper bound on the fallback identifier, in characters.
pub const FALLBACK_MAX_CHARS: usize = 50;

/// Workspace partition key derived from a source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the user id for a source URL. Total: unknown shapes fall back to a
/// sanitized form of the whole URL.
///
/// `https://www.instagram.com/stories/someone/3141/` -> `someone`
pub fn resolve_user(source_url: &str) -> UserId {
    platform_segment(source_url)
        .map(UserId)
        .unwrap_or_else(|| UserId(sanitize_fallback(source_url)))
}

fn platform_segment(source_url: &str) -> Option<String> {
    let trimmed = source_url.trim();
    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|url| url.has_host())
        .or_else(|| Url::parse(&format!("https://{trimmed}")).ok())?;

    let host = parsed.host_str()?.to_ascii_lowercase();
    if host != PLATFORM_HOST && !host.ends_with(&format!(".{PLATFORM_HOST}")) {
        return None;
    }

    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    let candidate = match segments.as_slice() {
        [prefix, id, ..] if PREFIXED_SHAPES.contains(prefix) => *id,
        [first, ..] => *first,
        [] => return None,
    };

    let decoded = urlencoding::decode(candidate).ok()?;
    is_usable_segment(&decoded).then(|| decoded.into_owned())
}

/// A segment becomes a directory name: no separators, no control or reserved
/// characters, and no leading dot (hidden entries and `.`/`..`).
fn is_usable_segment(segment: &str) -> bool {
    !segment.starts_with('.')
        && !segment.chars().any(|c| {
            matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
        })
}

/// Collapse every run of non-word characters into `_` and cap the length.
fn sanitize_fallback(source_url: &str) -> String {
    let mut out = String::with_capacity(source_url.len().min(FALLBACK_MAX_CHARS));
    let mut in_run = false;
    for c in source_url.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    let mut bounded: String = out.chars().take(FALLBACK_MAX_CHARS).collect();
    if bounded.is_empty() {
        bounded.push_str("unknown");
    }
    bounded
}
