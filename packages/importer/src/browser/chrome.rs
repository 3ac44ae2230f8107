//! Headless Chrome implementation of the browser seam.
//!
//! `headless_chrome` is blocking, so every tab operation runs on the
//! blocking pool. The `Browser` handle owns the OS process and kills it
//! when dropped.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{ImportError, Result};
use crate::traits::browser::{BrowserLauncher, BrowserPage};

/// Binary names tried on `PATH` when no explicit path is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

const USER_AGENT_ARG: &str = "--user-agent=Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launches a local Chrome/Chromium per run.
///
/// The browser's idle timeout is the run timeout, so a stalled session
/// never outlives the run that owns it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }
}

/// Locate the browser binary. Missing binary is fatal for the run.
pub fn resolve_browser_binary(run: &RunConfig) -> Result<PathBuf> {
    if let Some(path) = &run.browser_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ImportError::Environment(format!(
            "browser binary not found at {}",
            path.display()
        )));
    }

    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            ImportError::Environment(format!(
                "no browser binary on PATH (tried {})",
                BROWSER_CANDIDATES.join(", ")
            ))
        })
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, run: &RunConfig) -> Result<Box<dyn BrowserPage>> {
        let path = resolve_browser_binary(run)?;
        let headless = run.headless;
        let idle_timeout = run.run_timeout;

        info!(path = %path.display(), headless, "Launching browser");

        let session = tokio::task::spawn_blocking(move || {
            ChromeSession::start(path, headless, idle_timeout)
        })
        .await
        .map_err(|e| ImportError::Environment(format!("browser launch task failed: {}", e)))??;

        Ok(Box::new(session))
    }
}

/// A running browser with one tab.
pub struct ChromeSession {
    // Dropping the Browser kills the process
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn start(path: PathBuf, headless: bool, idle_timeout: Duration) -> Result<Self> {
        let options = LaunchOptionsBuilder::default()
            .headless(headless)
            .sandbox(false)
            .path(Some(path))
            .idle_browser_timeout(idle_timeout)
            .args(vec![
                OsStr::new(USER_AGENT_ARG),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ])
            .build()
            .map_err(|e| ImportError::Environment(format!("invalid launch options: {}", e)))?;

        let browser = Browser::new(options)
            .map_err(|e| ImportError::Environment(format!("failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ImportError::Browser(format!("failed to open tab: {}", e)))?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking tab operation off the async runtime.
    async fn with_tab<T, F>(&self, what: &'static str, op: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(&tab))
            .await
            .map_err(|e| ImportError::Browser(format!("{}: task failed: {}", what, e)))?
            .map_err(|e| ImportError::Browser(format!("{}: {}", what, e)))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!("Tearing down browser session");
    }
}

#[async_trait]
impl BrowserPage for ChromeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_tab("navigate", move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        self.with_tab("current url", |tab| Ok(tab.get_url())).await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let selector = selector.to_string();
        let value = value.to_string();
        self.with_tab("fill", move |tab| {
            let element = tab.wait_for_element(&selector)?;
            element.click()?;
            element.type_into(&value)?;
            Ok(())
        })
        .await
    }

    async fn click_labeled(&self, selector: &str, label: &str) -> Result<()> {
        let selector = selector.to_string();
        let label = label.to_string();
        self.with_tab("click", move |tab| {
            for element in tab.find_elements(&selector)? {
                if element.get_inner_text()?.trim() == label {
                    element.click()?;
                    return Ok(());
                }
            }
            anyhow::bail!("no {} labeled {:?}", selector, label)
        })
        .await
    }

    async fn wait_for_navigation(&self) -> Result<()> {
        self.with_tab("wait for navigation", |tab| {
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let selector = selector.to_string();
        self.with_tab("find", move |tab| Ok(tab.find_element(&selector).is_ok()))
            .await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let selector = selector.to_string();
        self.with_tab("count", move |tab| {
            // find_elements errors when nothing matches
            Ok(tab.find_elements(&selector).map(|e| e.len()).unwrap_or(0))
        })
        .await
    }

    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab("scroll", move |tab| {
            let elements = tab.find_elements(&selector)?;
            let element = elements
                .get(index)
                .ok_or_else(|| anyhow::anyhow!("no element {} of {}", index, selector))?;
            element.scroll_into_view()?;
            Ok(())
        })
        .await
    }

    async fn outer_html(&self, selector: &str, index: usize) -> Result<String> {
        let selector = selector.to_string();
        self.with_tab("read", move |tab| {
            let elements = tab.find_elements(&selector)?;
            let element = elements
                .get(index)
                .ok_or_else(|| anyhow::anyhow!("no element {} of {}", index, selector))?;
            element.get_content()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_binary_is_environment_error() {
        let mut run = RunConfig::default();
        run.browser_path = Some(PathBuf::from("/nonexistent/chromium-for-tests"));

        let err = resolve_browser_binary(&run).unwrap_err();
        assert!(matches!(err, ImportError::Environment(_)));
    }
}
