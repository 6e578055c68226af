use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, TimeZone};
use grab_core::{resolve_user, ExtractedLink, ExtractionStage};
use grab_engine::{
    BrowserError, BrowserPage, DiagnosticsWriter, ExtractionSession, Locator, RawAnchor,
    SiteProfile,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Page double: only the listed locators respond, everything is recorded.
#[derive(Default)]
struct ScriptedPage {
    navigation_fails: bool,
    fillable: Vec<Locator>,
    clickable: Vec<Locator>,
    results_ready: bool,
    anchors: Vec<RawAnchor>,
    popups: usize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPage {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.record(format!("goto {url}"));
        if self.navigation_fails {
            return Err(BrowserError::Timeout {
                step: "navigation".into(),
                timeout,
            });
        }
        Ok(())
    }

    async fn fill(
        &self,
        locator: &Locator,
        value: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.record(format!("fill {locator} {value}"));
        if self.fillable.contains(locator) {
            Ok(())
        } else {
            Err(BrowserError::NotFound(locator.to_string()))
        }
    }

    async fn click(&self, locator: &Locator, _timeout: Duration) -> Result<(), BrowserError> {
        self.record(format!("click {locator}"));
        if self.clickable.contains(locator) {
            Ok(())
        } else {
            Err(BrowserError::NotFound(locator.to_string()))
        }
    }

    async fn close_other_pages(&self) -> Result<usize, BrowserError> {
        self.record("close-others".to_string());
        Ok(self.popups)
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        self.record(format!("wait {locator}"));
        if self.results_ready {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                step: "wait".into(),
                timeout,
            })
        }
    }

    async fn anchors(&self, _locator: &Locator) -> Result<Vec<RawAnchor>, BrowserError> {
        Ok(self.anchors.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(b"\x89PNG".to_vec())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok("<html><body>blocked</body></html>".to_string())
    }
}

fn fast_site() -> SiteProfile {
    SiteProfile {
        settle_delay: Duration::ZERO,
        ..SiteProfile::default()
    }
}

fn anchor(title: Option<&str>, href: Option<&str>) -> RawAnchor {
    RawAnchor {
        title: title.map(str::to_string),
        href: href.map(str::to_string),
    }
}

fn session(page: ScriptedPage, diagnostics_dir: &std::path::Path) -> ExtractionSession<ScriptedPage> {
    let fixed = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    ExtractionSession::new(
        3,
        page,
        fast_site(),
        Duration::from_secs(1),
        DiagnosticsWriter::new(diagnostics_dir).with_clock(Arc::new(move || fixed)),
    )
}

const SOURCE: &str = "https://www.instagram.com/stories/someone/";

#[tokio::test]
async fn falls_back_through_locators_and_keeps_dom_order() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage {
        fillable: vec![Locator::css("input[name='q']")],
        clickable: vec![Locator::button_text("Download")],
        results_ready: true,
        anchors: vec![
            anchor(Some("Download Video"), Some("http://cdn/v.mp4")),
            anchor(Some("Download Image"), None),
            anchor(None, Some("http://cdn/i.jpg")),
            anchor(Some("Empty"), Some("  ")),
        ],
        ..ScriptedPage::default()
    };
    let session = session(page, temp.path());

    let links = session.extract_links(SOURCE, &resolve_user(SOURCE)).await;

    assert_eq!(
        links,
        vec![
            ExtractedLink::new(Some("Download Video"), "http://cdn/v.mp4"),
            ExtractedLink::new(None, "http://cdn/i.jpg"),
        ]
    );

    let calls = session.page().calls();
    assert_eq!(calls[0], format!("goto {}", SiteProfile::default().service_url));
    assert_eq!(calls[1], format!("fill css=#s_input {SOURCE}"));
    assert_eq!(calls[2], format!("fill css=input[name='q'] {SOURCE}"));
    // The first input locator that worked ends the input step.
    assert!(!calls.iter().any(|c| c == &format!("fill css=input {SOURCE}")));
    assert_eq!(calls[3], "click css=button[onclick*='ksearchvideo']");
    assert_eq!(calls[4], "click button-text=Download");
    assert_eq!(calls[5], "close-others");
    assert!(temp.path().read_dir().unwrap().next().is_none());
}

#[tokio::test]
async fn missing_input_and_submit_do_not_abort_the_session() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage {
        results_ready: true,
        anchors: vec![anchor(Some("Image"), Some("http://cdn/i.jpg"))],
        ..ScriptedPage::default()
    };
    let session = session(page, temp.path());

    let links = session.extract_links(SOURCE, &resolve_user(SOURCE)).await;
    assert_eq!(links.len(), 1);
}

#[tokio::test]
async fn every_dismissal_control_is_tried_and_failures_ignored() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage {
        clickable: vec![Locator::css(".modal-close")],
        results_ready: true,
        popups: 2,
        ..ScriptedPage::default()
    };
    let session = session(page, temp.path());

    let links = session.extract_links(SOURCE, &resolve_user(SOURCE)).await;
    assert!(links.is_empty());

    let calls = session.page().calls();
    for locator in &SiteProfile::default().dismiss_locators {
        assert!(
            calls.contains(&format!("click {locator}")),
            "dismissal {locator} not attempted"
        );
    }
    let wait_at = calls.iter().position(|c| c.starts_with("wait ")).unwrap();
    let last_dismiss = calls.iter().rposition(|c| c == "click text=No thanks").unwrap();
    assert!(last_dismiss < wait_at);
}

#[tokio::test]
async fn result_timeout_yields_no_links_and_saves_namespaced_diagnostics() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage {
        fillable: vec![Locator::css("#s_input")],
        results_ready: false,
        ..ScriptedPage::default()
    };
    let session = session(page, temp.path());
    let user = resolve_user(SOURCE);

    let failure = session.drive(SOURCE).await.unwrap_err();
    assert_eq!(failure.stage, ExtractionStage::InterstitialClearing);
    assert!(matches!(failure.error, BrowserError::Timeout { .. }));

    let links = session.extract_links(SOURCE, &user).await;
    assert!(links.is_empty());

    let mut names: Vec<String> = temp
        .path()
        .read_dir()
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "20240501T123000.000_w3_someone.html".to_string(),
            "20240501T123000.000_w3_someone.png".to_string(),
        ]
    );
    let html = std::fs::read_to_string(temp.path().join(&names[0])).unwrap();
    assert!(html.contains("blocked"));
}

#[tokio::test]
async fn navigation_failure_stops_before_touching_the_page() {
    let temp = TempDir::new().unwrap();
    let page = ScriptedPage {
        navigation_fails: true,
        results_ready: true,
        ..ScriptedPage::default()
    };
    let session = session(page, temp.path());

    let failure = session.drive(SOURCE).await.unwrap_err();
    assert_eq!(failure.stage, ExtractionStage::Navigating);
    assert_eq!(session.page().calls().len(), 1);

    let links = session.extract_links(SOURCE, &resolve_user(SOURCE)).await;
    assert!(links.is_empty());
}

#[test]
fn text_locators_render_as_xpath() {
    assert_eq!(Locator::css("button.close").xpath(), None);
    assert_eq!(
        Locator::button_text("Close").xpath().unwrap(),
        "//button[contains(normalize-space(.), 'Close')]"
    );
    assert_eq!(
        Locator::exact_text("Skip ad").xpath().unwrap(),
        "//*[normalize-space(text())='Skip ad']"
    );
    assert_eq!(
        Locator::exact_text("Don't").xpath().unwrap(),
        "//*[normalize-space(text())=\"Don't\"]"
    );
}
