//! Pagination crawl and navigation throttling.

pub mod pagination;
pub mod throttle;

pub use pagination::{CrawlLimits, Crawler};
pub use throttle::NavigationThrottle;
