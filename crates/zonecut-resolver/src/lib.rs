#![warn(clippy::pedantic)]
// Don't care enough to fix
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::wildcard_imports)]

pub mod cache;
pub mod config;
pub mod context;
pub mod gateway;
pub mod metrics;
pub mod util;
pub mod zonecut;

use hickory_proto::rr::RecordType;
use tracing::Instrument;

use self::cache::SharedCache;
use self::context::Context;
use self::metrics::Metrics;
use self::util::nameserver::NameserverTransport;
use self::util::types::{ResolutionError, ResolvedRecord};
use self::zonecut::resolve_zonecut;

/// Resolve a name by walking down from the closest known zone cut,
/// revealing one more label to each nameserver on the way.
///
/// The cache is updated with every zone cut, non-cut, and name error
/// learned along the way.
pub async fn resolve<T: NameserverTransport>(
    transport: &T,
    cache: &SharedCache,
    domain: &str,
    qtype: RecordType,
) -> (Metrics, Result<ResolvedRecord, ResolutionError>) {
    let mut context = Context::new(transport, cache);

    let result = resolve_zonecut(&mut context, domain, qtype)
        .instrument(tracing::error_span!("resolve_zonecut", %domain, %qtype))
        .await;

    (context.done(), result)
}
