//! Browser automation seam.
//!
//! The session manager and crawler only talk to a `BrowserPage`, so the
//! headless Chrome implementation can be swapped for a scripted mock.

use async_trait::async_trait;

use crate::config::RunConfig;
use crate::error::Result;

/// One open browser tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL currently shown (after redirects).
    async fn current_url(&self) -> Result<String>;

    /// Type `value` into the first element matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Click the first element matching `selector` whose visible text,
    /// trimmed, equals `label`.
    async fn click_labeled(&self, selector: &str, label: &str) -> Result<()>;

    /// Wait for a navigation triggered by the previous action.
    async fn wait_for_navigation(&self) -> Result<()>;

    /// Whether any element matches `selector`.
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Scroll the `index`-th match into the viewport.
    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<()>;

    /// Outer HTML of the `index`-th match.
    async fn outer_html(&self, selector: &str, index: usize) -> Result<String>;
}

/// Starts a browser for one run.
///
/// The returned page owns the browser process; dropping it tears the
/// process down, which covers early returns, timeouts and panics.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, run: &RunConfig) -> Result<Box<dyn BrowserPage>>;
}
