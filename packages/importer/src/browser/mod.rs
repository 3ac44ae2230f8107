//! Browser session management.
//!
//! - `chrome` - headless Chrome launcher and tab driver
//! - `session` - login with a single retry

pub mod chrome;
pub mod session;

pub use chrome::{ChromeLauncher, ChromeSession};
pub use session::login;
