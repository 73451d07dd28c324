//! Driver layer for turning a website URL into a screenshot on disk.
//!
//! - [`CaptureProvider`]: the seam the analyzer depends on
//! - [`browser::driver::WebDriverCapturer`]: fantoccini implementation, one
//!   browser session per capture
//! - [`browser::options`]: viewport, timeouts and Chrome arguments
pub mod browser;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use browser::driver::WebDriverCapturer;
pub use browser::options::CaptureOptions;

/// Produces a PNG screenshot of `url` at `dest`.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Capture `url` into `dest` and return the path written.
    async fn capture(&self, url: &str, dest: &Path) -> anyhow::Result<PathBuf>;
}

#[async_trait]
impl<T: CaptureProvider + ?Sized> CaptureProvider for std::sync::Arc<T> {
    async fn capture(&self, url: &str, dest: &Path) -> anyhow::Result<PathBuf> {
        (**self).capture(url, dest).await
    }
}
