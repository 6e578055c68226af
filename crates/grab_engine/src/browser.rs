//! Browser seam: what the extraction session needs from a page, and the
//! ordered-fallback helper used for every locator step.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use engine_logging::engine_debug;
use thiserror::Error;

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    /// A `<button>` whose visible text contains the given string.
    ButtonText(String),
    /// Any element whose own text equals the given string, ignoring surrounding whitespace.
    ExactText(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn button_text(text: &str) -> Self {
        Locator::ButtonText(text.to_string())
    }

    pub fn exact_text(text: &str) -> Self {
        Locator::ExactText(text.to_string())
    }

    /// XPath form for the text-based locators; `None` for CSS.
    pub fn xpath(&self) -> Option<String> {
        match self {
            Locator::Css(_) => None,
            Locator::ButtonText(text) => Some(format!(
                "//button[contains(normalize-space(.), {})]",
                xpath_literal(text)
            )),
            Locator::ExactText(text) => Some(format!(
                "//*[normalize-space(text())={}]",
                xpath_literal(text)
            )),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css={selector}"),
            Locator::ButtonText(text) => write!(f, "button-text={text}"),
            Locator::ExactText(text) => write!(f, "text={text}"),
        }
    }
}

/// XPath 1.0 has no escapes; strings holding both quote kinds need concat().
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Attributes read from one result anchor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawAnchor {
    pub title: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("{step} timed out after {timeout:?}")]
    Timeout { step: String, timeout: Duration },
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(String),
}

/// One browser tab driven sequentially by a worker.
///
/// Every call that waits on the page takes its own timeout; implementations
/// return [`BrowserError::Timeout`] when it elapses.
#[async_trait::async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the value of the first matching input with `value`.
    async fn fill(&self, locator: &Locator, value: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Close every tab except this one. Returns how many were closed.
    async fn close_other_pages(&self) -> Result<usize, BrowserError>;

    /// Wait until at least one element matches.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// All matching anchors in DOM order.
    async fn anchors(&self, locator: &Locator) -> Result<Vec<RawAnchor>, BrowserError>;

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    async fn content(&self) -> Result<String, BrowserError>;
}

/// Outcome of trying a list of strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Index of the first strategy that worked.
    Found(usize),
    NotFound,
}

impl Attempt {
    pub fn is_found(self) -> bool {
        matches!(self, Attempt::Found(_))
    }
}

/// Run `step` for each locator in order and stop at the first success.
/// Failures are expected and only logged at debug level.
pub async fn first_success<'a, F, Fut>(label: &str, locators: &'a [Locator], mut step: F) -> Attempt
where
    F: FnMut(&'a Locator) -> Fut,
    Fut: Future<Output = Result<(), BrowserError>>,
{
    for (index, locator) in locators.iter().enumerate() {
        match step(locator).await {
            Ok(()) => {
                engine_debug!("{} succeeded with {}", label, locator);
                return Attempt::Found(index);
            }
            Err(err) => engine_debug!("{} missed {}: {}", label, locator, err),
        }
    }
    Attempt::NotFound
}

/// Run `step` for every locator regardless of earlier outcomes. Returns the
/// number that succeeded.
pub async fn each_tolerant<'a, F, Fut>(label: &str, locators: &'a [Locator], mut step: F) -> usize
where
    F: FnMut(&'a Locator) -> Fut,
    Fut: Future<Output = Result<(), BrowserError>>,
{
    let mut hits = 0;
    for locator in locators {
        match step(locator).await {
            Ok(()) => {
                engine_debug!("{} hit {}", label, locator);
                hits += 1;
            }
            Err(err) => engine_debug!("{} skipped {}: {}", label, locator, err),
        }
    }
    hits
}
