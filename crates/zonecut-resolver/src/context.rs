use crate::cache::SharedCache;
use crate::metrics::Metrics;

/// Per-request state of a resolution walk.
pub struct Context<'a, T> {
    // global context
    pub transport: &'a T,
    pub cache: &'a SharedCache,
    // request state
    metrics: Metrics,
}

impl<'a, T> Context<'a, T> {
    pub fn new(transport: &'a T, cache: &'a SharedCache) -> Self {
        Self {
            transport,
            cache,
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&mut self) -> &mut Metrics {
        &mut self.metrics
    }

    pub fn done(self) -> Metrics {
        self.metrics
    }
}
