use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::browser::Locator;
use crate::chrome::ChromeSettings;
use crate::fetch::FetchSettings;

pub const DEFAULT_SERVICE_URL: &str = "https://saveclip.app/en/download-video-instagram";

/// Diagnostics subdirectory of the output root. The leading dot keeps it out
/// of the user id namespace, which never starts with one.
pub const DIAGNOSTICS_DIR_NAME: &str = ".debug";

/// Everything the extraction session knows about the unlock service's page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub service_url: String,
    pub input_locators: Vec<Locator>,
    pub submit_locators: Vec<Locator>,
    pub dismiss_locators: Vec<Locator>,
    /// Appears once the service has produced results.
    pub result_ready: Locator,
    /// Anchors carrying `title` and `href` of each media item.
    pub result_anchors: Locator,
    pub fill_timeout: Duration,
    pub submit_timeout: Duration,
    pub dismiss_timeout: Duration,
    /// Pause after navigation and after submitting, before touching the page.
    pub settle_delay: Duration,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            input_locators: vec![
                Locator::css("#s_input"),
                Locator::css("input[name='q']"),
                Locator::css("input"),
            ],
            submit_locators: vec![
                Locator::css("button[onclick*='ksearchvideo']"),
                Locator::button_text("Download"),
            ],
            dismiss_locators: vec![
                Locator::button_text("Close"),
                Locator::button_text("close"),
                Locator::css("button.close"),
                Locator::css(".modal-close"),
                Locator::exact_text("X"),
                Locator::exact_text("Skip ad"),
                Locator::exact_text("No thanks"),
            ],
            result_ready: Locator::css("#search-result .download-box li"),
            result_anchors: Locator::css("#search-result .download-items__btn a"),
            fill_timeout: Duration::from_secs(3),
            submit_timeout: Duration::from_secs(5),
            dismiss_timeout: Duration::from_millis(1500),
            settle_delay: Duration::from_millis(500),
        }
    }
}

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Immutable settings handed to the orchestrator at startup.
#[derive(Clone)]
pub struct PipelineConfig {
    pub output_root: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub parallelism: usize,
    pub navigation_timeout: Duration,
    pub chrome: ChromeSettings,
    pub site: SiteProfile,
    pub fetch: FetchSettings,
    /// Date used in output filenames.
    pub today: Clock,
}

impl PipelineConfig {
    pub fn default_with_output(output_root: impl Into<PathBuf>) -> Self {
        let output_root = output_root.into();
        Self {
            diagnostics_dir: output_root.join(DIAGNOSTICS_DIR_NAME),
            output_root,
            parallelism: 2,
            navigation_timeout: Duration::from_secs(60),
            chrome: ChromeSettings::default(),
            site: SiteProfile::default(),
            fetch: FetchSettings::default(),
            today: Arc::new(|| Local::now().date_naive()),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("output_root", &self.output_root)
            .field("diagnostics_dir", &self.diagnostics_dir)
            .field("parallelism", &self.parallelism)
            .field("navigation_timeout", &self.navigation_timeout)
            .field("chrome", &self.chrome)
            .field("site", &self.site.service_url)
            .field("fetch", &self.fetch)
            .finish_non_exhaustive()
    }
}
