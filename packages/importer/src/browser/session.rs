//! Login against an external site.

use tracing::{debug, info, warn};

use crate::error::{ImportError, Result};
use crate::security::LoginCredentials;
use crate::traits::browser::BrowserPage;
use crate::traits::site::SiteConfig;

/// First attempt plus one retry.
pub const LOGIN_ATTEMPTS: usize = 2;

/// Fill and submit the login form, then check where we landed.
///
/// Still on a URL containing the login marker means the attempt failed.
pub async fn login(
    page: &dyn BrowserPage,
    config: &SiteConfig,
    credentials: &LoginCredentials,
) -> Result<()> {
    for attempt in 1..=LOGIN_ATTEMPTS {
        debug!(service = %config.service, attempt, "Submitting login form");

        page.goto(&config.login_url).await?;
        page.fill(&config.email_selector, &credentials.login_id).await?;
        page.fill(&config.password_selector, credentials.password.expose())
            .await?;
        page.click_labeled(&config.submit_selector, &config.submit_label)
            .await?;
        page.wait_for_navigation().await?;

        let landed = page.current_url().await?;
        if !landed.contains(&config.login_url_marker) {
            info!(service = %config.service, attempt, "Logged in");
            return Ok(());
        }

        warn!(
            service = %config.service,
            attempt,
            url = %landed,
            "Still on login page after submit"
        );
    }

    Err(ImportError::Authentication {
        service: config.service.label().to_string(),
        login_id: credentials.login_id.clone(),
    })
}
