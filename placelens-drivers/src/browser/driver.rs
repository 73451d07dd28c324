use crate::browser::options::{capabilities, CaptureOptions};
use crate::CaptureProvider;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use placelens_runtime::sleep_or_cancel;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0);";

/// One live browser session, opened for a single capture.
pub struct CaptureSession {
    pub client: Client,
    opts: CaptureOptions,
}

impl CaptureSession {
    /// Connect to the WebDriver service and size the window.
    pub async fn open(opts: &CaptureOptions) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(capabilities(opts))
            .connect(&opts.webdriver_url)
            .await
            .with_context(|| format!("connect to webdriver at {}", opts.webdriver_url))?;

        let session = Self {
            client,
            opts: opts.clone(),
        };
        if let Err(e) = session.prepare().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn prepare(&self) -> Result<()> {
        let (w, h) = self.opts.viewport;
        self.client
            .set_window_size(w, h)
            .await
            .context("set window size")?;
        self.client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(self.opts.nav_timeout),
                None,
            ))
            .await
            .context("set page load timeout")?;
        Ok(())
    }

    /// Navigate and wait for the page to settle, bounded by the nav timeout.
    pub async fn load(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        tokio::time::timeout(self.opts.nav_timeout, self.client.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} exceeded {:?}", self.opts.nav_timeout))?
            .with_context(|| format!("navigate to {url}"))?;
        tracing::debug!(%url, elapsed_ms = started.elapsed().as_millis() as u64, "capture.page.loaded");

        sleep_or_cancel(cancel, self.opts.settle)
            .await
            .map_err(|_| anyhow!("capture cancelled"))?;
        Ok(())
    }

    /// Scroll to the bottom and back so lazy images render.
    pub async fn reveal_lazy_content(&self, cancel: &CancellationToken) -> Result<()> {
        self.client
            .execute(SCROLL_TO_BOTTOM, vec![])
            .await
            .context("scroll to bottom")?;
        sleep_or_cancel(cancel, self.opts.scroll_settle)
            .await
            .map_err(|_| anyhow!("capture cancelled"))?;
        self.client
            .execute(SCROLL_TO_TOP, vec![])
            .await
            .context("scroll to top")?;
        Ok(())
    }

    /// Take a PNG screenshot and write it to `dest`.
    pub async fn screenshot_to(&self, dest: &Path) -> Result<PathBuf> {
        let png = self.client.screenshot().await.context("take screenshot")?;
        if !png.starts_with(&PNG_SIGNATURE) {
            bail!("webdriver returned {} bytes that are not a PNG", png.len());
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        tokio::fs::write(dest, &png)
            .await
            .with_context(|| format!("write {}", dest.display()))?;
        Ok(dest.to_path_buf())
    }

    /// Close the browser session. Failures are logged, not returned.
    pub async fn close(self) {
        if let Err(e) = self.client.close().await {
            tracing::warn!(error=%e, "capture.session.close_failed");
        }
    }
}

/// [`CaptureProvider`] backed by a WebDriver service.
pub struct WebDriverCapturer {
    opts: CaptureOptions,
    cancel: CancellationToken,
}

impl WebDriverCapturer {
    pub fn new(opts: CaptureOptions) -> Self {
        Self {
            opts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.opts
    }

    async fn run(&self, session: &CaptureSession, url: &str, dest: &Path) -> Result<PathBuf> {
        session.load(url, &self.cancel).await?;
        session.reveal_lazy_content(&self.cancel).await?;
        session.screenshot_to(dest).await
    }
}

fn check_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid url {raw:?}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported scheme {other:?} in {raw:?}"),
    }
}

#[async_trait]
impl CaptureProvider for WebDriverCapturer {
    async fn capture(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let url = check_url(url)?;
        if self.cancel.is_cancelled() {
            bail!("capture cancelled");
        }
        let started = Instant::now();
        tracing::info!(url=%url, dest=%dest.display(), "capture.start");

        let session = CaptureSession::open(&self.opts).await?;
        let outcome = self.run(&session, url.as_str(), dest).await;
        session.close().await;

        match &outcome {
            Ok(path) => tracing::info!(
                url=%url,
                path=%path.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "capture.done"
            ),
            Err(e) => tracing::error!(url=%url, error=%format!("{e:#}"), "capture.failed"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_captured() {
        assert!(check_url("https://example.com").is_ok());
        assert!(check_url(" http://example.com/a ").is_ok());
        assert!(check_url("ftp://example.com").is_err());
        assert!(check_url("example.com").is_err());
    }

    #[tokio::test]
    async fn rejects_bad_url_before_connecting() {
        let capturer = WebDriverCapturer::new(CaptureOptions {
            webdriver_url: "http://127.0.0.1:9".into(),
            ..CaptureOptions::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let err = capturer
            .capture("mailto:someone@example.com", &dir.path().join("x.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
