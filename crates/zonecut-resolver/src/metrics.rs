/// Metrics from a resolution attempt.  The resolver builds this
/// structure rather than update the Prometheus metrics directly.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Metrics {
    /// Questions answered from the cache without any network traffic
    /// (cached data or cached name errors).
    pub cache_hits: u64,
    /// Questions which had to go to the network.
    pub cache_misses: u64,
    /// Queries which an upstream nameserver answered.
    pub nameserver_hits: u64,
    /// Queries which an upstream nameserver failed to answer.
    pub nameserver_misses: u64,
    /// New zone cuts discovered during the walk.
    pub zone_cuts: u64,
    /// Intermediate labels skipped because the cache knows they are
    /// not zone cuts.
    pub skipped_labels: u64,
    /// Name errors received from upstream.
    pub name_errors: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn nameserver_hit(&mut self) {
        self.nameserver_hits += 1;
    }

    pub fn nameserver_miss(&mut self) {
        self.nameserver_misses += 1;
    }

    pub fn zone_cut(&mut self) {
        self.zone_cuts += 1;
    }

    pub fn skipped_label(&mut self) {
        self.skipped_labels += 1;
    }

    pub fn name_error(&mut self) {
        self.name_errors += 1;
    }

    /// Total number of queries sent upstream.
    pub fn nameserver_queries(&self) -> u64 {
        self.nameserver_hits + self.nameserver_misses
    }
}
