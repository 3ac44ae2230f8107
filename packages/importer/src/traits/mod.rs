//! Core trait abstractions.
//!
//! These define the seams the runner depends on: browser, site adapter,
//! stores and operator mail.

pub mod browser;
pub mod mailer;
pub mod site;
pub mod store;
