//! chromiumoxide-backed implementation of [`BrowserPage`].

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::{BrowserError, BrowserPage, Locator, RawAnchor};
use crate::types::WorkerId;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ChromeSettings {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    /// Upper bound for page calls that take no timeout of their own: listing
    /// tabs, reading result anchors, screenshots and markup.
    pub command_timeout: Duration,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_size: (1280, 900),
            command_timeout: Duration::from_secs(20),
        }
    }
}

/// A launched browser with the single page a worker drives.
pub struct ChromeSession {
    worker: WorkerId,
    command_timeout: Duration,
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    pub async fn launch(worker: WorkerId, settings: &ChromeSettings) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_size.0, settings.window_size.1);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        // The handler stream must be polled for the CDP connection to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_debug!("Browser handler stopped: {}", err);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(protocol_error)?;

        engine_debug!("Worker {} browser launched", worker);
        Ok(Self {
            worker,
            command_timeout: settings.command_timeout,
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    pub async fn shutdown(self) {
        let mut browser = self.browser.into_inner();
        if let Err(err) = browser.close().await {
            engine_warn!("Worker {} failed to close browser: {}", self.worker, err);
        }
        let _ = browser.wait().await;
        self.handler.abort();
    }

    async fn find(&self, locator: &Locator) -> Result<Element, CdpError> {
        match locator {
            Locator::Css(selector) => self.page.find_element(selector.as_str()).await,
            _ => self.page.find_xpath(locator.xpath().unwrap_or_default()).await,
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, CdpError> {
        match locator {
            Locator::Css(selector) => self.page.find_elements(selector.as_str()).await,
            _ => self.page.find_xpaths(locator.xpath().unwrap_or_default()).await,
        }
    }

    /// Poll until the locator matches, then hand the element to the caller.
    async fn wait_element(&self, locator: &Locator, timeout: Duration) -> Result<Element, BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find(locator).await {
                Ok(element) => return Ok(element),
                Err(err) => {
                    if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                        engine_debug!("Giving up on {}: {}", locator, err);
                        return Err(BrowserError::NotFound(locator.to_string()));
                    }
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn protocol_error(err: CdpError) -> BrowserError {
    BrowserError::Protocol(err.to_string())
}

async fn bounded<T, F>(step: &str, timeout: Duration, fut: F) -> Result<T, BrowserError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BrowserError::Timeout {
            step: step.to_string(),
            timeout,
        })?
}

#[async_trait::async_trait]
impl BrowserPage for ChromeSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        bounded("navigation", timeout, async {
            self.page.goto(url).await.map_err(protocol_error)?;
            Ok(())
        })
        .await
    }

    async fn fill(
        &self,
        locator: &Locator,
        value: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        bounded("fill", timeout, async {
            let element = self.wait_element(locator, timeout).await?;
            element
                .call_js_fn("function() { this.value = ''; }", false)
                .await
                .map_err(protocol_error)?;
            element.click().await.map_err(protocol_error)?;
            element.type_str(value).await.map_err(protocol_error)?;
            Ok(())
        })
        .await
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        bounded("click", timeout, async {
            let element = self.wait_element(locator, timeout).await?;
            element.click().await.map_err(protocol_error)?;
            Ok(())
        })
        .await
    }

    async fn close_other_pages(&self) -> Result<usize, BrowserError> {
        bounded("close pop-up tabs", self.command_timeout, async {
            let pages = self.browser.lock().await.pages().await.map_err(protocol_error)?;
            let primary = self.page.target_id().clone();
            let mut closed = 0;
            for page in pages {
                if *page.target_id() == primary {
                    continue;
                }
                match page.close().await {
                    Ok(()) => closed += 1,
                    Err(err) => engine_debug!("Could not close pop-up page: {}", err),
                }
            }
            Ok(closed)
        })
        .await
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        bounded("wait for results", timeout, async {
            self.wait_element(locator, timeout).await.map(|_| ())
        })
        .await
        .map_err(|err| match err {
            BrowserError::NotFound(_) => BrowserError::Timeout {
                step: format!("wait for {locator}"),
                timeout,
            },
            other => other,
        })
    }

    async fn anchors(&self, locator: &Locator) -> Result<Vec<RawAnchor>, BrowserError> {
        // One bound for the whole read, however many anchors there are.
        bounded("read result anchors", self.command_timeout, async {
            let elements = self.find_all(locator).await.map_err(protocol_error)?;
            let mut anchors = Vec::with_capacity(elements.len());
            for element in elements {
                let title = element.attribute("title").await.map_err(protocol_error)?;
                let href = element.attribute("href").await.map_err(protocol_error)?;
                anchors.push(RawAnchor { title, href });
            }
            Ok(anchors)
        })
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        bounded("screenshot", self.command_timeout, async {
            self.page
                .screenshot(ScreenshotParams::builder().full_page(true).build())
                .await
                .map_err(protocol_error)
        })
        .await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        bounded("page markup", self.command_timeout, async {
            self.page.content().await.map_err(protocol_error)
        })
        .await
    }
}
