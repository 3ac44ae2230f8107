//! Site adapters and the registry the runner looks them up in.

pub mod fields;
pub mod html;
pub mod source_a;
pub mod source_b;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use source_a::SourceA;
pub use source_b::SourceB;

use crate::traits::site::SiteAdapter;
use crate::types::job::ServiceType;

/// Adapters by service. A job whose service has no adapter is skipped.
#[derive(Clone, Default)]
pub struct SiteRegistry {
    adapters: HashMap<ServiceType, Arc<dyn SiteAdapter>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both built-in sources with their default configuration.
    pub fn builtin() -> Self {
        Self::new().with(SourceA::new()).with(SourceB::new())
    }

    /// Built-in sources with the navigation delay overridden.
    pub fn builtin_with_delay(delay: Duration) -> Self {
        let mut a = SourceA::default_config();
        a.navigation_delay = delay;
        let mut b = SourceB::default_config();
        b.navigation_delay = delay;
        Self::new()
            .with(SourceA::with_config(a))
            .with(SourceB::with_config(b))
    }

    pub fn with(mut self, adapter: impl SiteAdapter + 'static) -> Self {
        self.register(Arc::new(adapter));
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(adapter.service(), adapter);
    }

    pub fn get(&self, service: ServiceType) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(&service).cloned()
    }

    pub fn contains(&self, service: ServiceType) -> bool {
        self.adapters.contains_key(&service)
    }
}
