use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, RecordType};
use tracing::Instrument;

use crate::context::Context;
use crate::util::name::{
    canonical_name, extend_by_one_label, from_wire_name, is_valid_name, label_count, split_labels,
};
use crate::util::nameserver::NameserverTransport;
use crate::util::types::*;

/// Where the walk down to the target name has got to.
#[derive(Debug)]
enum WalkState {
    /// Find out whether `child` is a zone cut below `parent`, the
    /// deepest zone cut found so far.
    SeekZoneCut { parent: String, child: String },
    /// Ask the nameserver of `parent` about the target name itself.
    AtLeaf { parent: String },
    Done(Result<ResolvedRecord, ResolutionError>),
}

/// Resolve a name with qname minimisation.
///
/// Starting from the closest zone cut the cache knows of, each zone's
/// nameserver is asked only for the NS records of the name one label
/// below it.  Only the nameserver of the final zone sees the full
/// name and query type.
///
/// A name error is cached against the target name, whichever label it
/// came back for.  Transport and protocol errors abort the walk and
/// are not cached.
pub async fn resolve_zonecut<T: NameserverTransport>(
    context: &mut Context<'_, T>,
    domain: &str,
    qtype: RecordType,
) -> Result<ResolvedRecord, ResolutionError> {
    let domain = canonical_name(domain);
    if !is_valid_name(&domain) {
        return Err(ResolutionError::InvalidName { name: domain });
    }

    let (reply, _, rrs) = context.cache.lookup(&domain, qtype);
    if reply.exists.is_false() {
        tracing::trace!("cached name error");
        context.metrics().cache_hit();
        return Ok(ResolvedRecord::NameError { cached: true });
    }
    if reply.exists.is_true() && !rrs.is_empty() {
        tracing::trace!("cached answer");
        context.metrics().cache_hit();
        return Ok(ResolvedRecord::Cached { rrs });
    }
    context.metrics().cache_miss();

    tracing::trace!(closest = %reply.closest, "starting walk");

    let labels = split_labels(&domain);
    let mut state = if reply.closest == domain {
        WalkState::AtLeaf {
            parent: reply.closest,
        }
    } else {
        step_down(&labels, &domain, reply.closest.clone(), &reply.closest)
    };

    loop {
        state = match state {
            WalkState::SeekZoneCut { parent, child } => {
                match seek_zone_cut(context, &labels, &domain, parent, child).await {
                    Ok(next) => next,
                    Err(error) => WalkState::Done(Err(error)),
                }
            }
            WalkState::AtLeaf { parent } => {
                WalkState::Done(query_leaf(context, &domain, qtype, &parent).await)
            }
            WalkState::Done(result) => return result,
        };
    }
}

/// Go one label further down from `from`, with `parent` as the zone
/// cut to ask.  The walk only ever goes down: a child no deeper than
/// `from` ends it.
fn step_down(labels: &[&str], domain: &str, parent: String, from: &str) -> WalkState {
    let Some(child) = extend_by_one_label(labels, from)
        .filter(|child| label_count(child) > label_count(from))
    else {
        return WalkState::Done(Err(ResolutionError::LabelsExhausted {
            domain: domain.to_string(),
        }));
    };

    if child == domain {
        WalkState::AtLeaf { parent }
    } else {
        WalkState::SeekZoneCut { parent, child }
    }
}

/// Ask `parent`'s nameserver for the NS records of `child`.  If any of
/// them are owned by `child`, it is a new zone cut and the walk
/// carries on below it; otherwise the walk carries on in `parent`.
async fn seek_zone_cut<T: NameserverTransport>(
    context: &mut Context<'_, T>,
    labels: &[&str],
    domain: &str,
    parent: String,
    child: String,
) -> Result<WalkState, ResolutionError> {
    let (known, _, _) = context.cache.lookup(&child, RecordType::NS);
    if known.not_a_zone.is_true() {
        tracing::trace!(%child, "known not to be a zone cut - skipping");
        context.metrics().skipped_label();
        return Ok(step_down(labels, domain, parent, &child));
    }
    if known.not_a_zone.is_false() {
        tracing::trace!(%child, "known zone cut");
        return Ok(step_down(labels, domain, child.clone(), &child));
    }

    let nameserver = nameserver_for(context, &parent)?;
    let response = query(context, &child, &nameserver, RecordType::NS, true).await?;

    if response.rcode == ResponseCode::NXDomain {
        return Ok(WalkState::Done(name_error(context, domain)));
    }
    if !response.is_retrieved() {
        return Err(ResolutionError::Protocol {
            rcode: response.rcode,
        });
    }

    // only the first nameserver is kept, and NS records for anything
    // other than the child (eg, the parent) are ignored
    let cut = response.rrs.iter().find_map(|rr| match rr.data() {
        Some(RData::NS(ns)) if from_wire_name(rr.name()) == child => Some(from_wire_name(&ns.0)),
        _ => None,
    });

    if let Some(child_nameserver) = cut {
        tracing::trace!(%child, nameserver = %child_nameserver, "found zone cut");
        context.cache.insert(&child, vec![child_nameserver])?;
        context.metrics().zone_cut();
        Ok(step_down(labels, domain, child.clone(), &child))
    } else {
        tracing::trace!(%child, kind = %response.kind, "not a zone cut");
        context.cache.insert(&child, Vec::new())?;
        Ok(step_down(labels, domain, parent, &child))
    }
}

/// Ask `parent`'s nameserver the real question.
async fn query_leaf<T: NameserverTransport>(
    context: &mut Context<'_, T>,
    domain: &str,
    qtype: RecordType,
    parent: &str,
) -> Result<ResolvedRecord, ResolutionError> {
    let nameserver = nameserver_for(context, parent)?;
    let response = query(context, domain, &nameserver, qtype, false).await?;

    if response.rcode == ResponseCode::NXDomain {
        return name_error(context, domain);
    }
    if !response.is_retrieved() {
        return Err(ResolutionError::Protocol {
            rcode: response.rcode,
        });
    }

    tracing::trace!(kind = %response.kind, "got final response");
    context.cache.insert_records(domain, qtype, &response.rrs);

    Ok(ResolvedRecord::Answer {
        rrs: response.rrs,
        is_authoritative: response.is_authoritative,
    })
}

/// Send one query, keeping track of whether it got a response.
async fn query<T: NameserverTransport>(
    context: &mut Context<'_, T>,
    name: &str,
    nameserver: &str,
    qtype: RecordType,
    accept_referrals: bool,
) -> Result<NameserverResponse, ResolutionError> {
    match context
        .transport
        .query(name, nameserver, qtype, accept_referrals)
        .instrument(tracing::error_span!("query_nameserver", %name, %nameserver, %qtype))
        .await
    {
        Ok(response) => {
            tracing::trace!(rcode = %response.rcode, aa = %response.is_authoritative, kind = %response.kind, "got response");
            context.metrics().nameserver_hit();
            Ok(response)
        }
        Err(error) => {
            tracing::debug!(%name, %nameserver, %error, "nameserver query failed");
            context.metrics().nameserver_miss();
            Err(error.into())
        }
    }
}

/// The one nameserver used for a zone.
fn nameserver_for<T>(context: &Context<'_, T>, zone: &str) -> Result<String, ResolutionError> {
    let (_, nameservers, _) = context.cache.lookup(zone, RecordType::NS);
    nameservers
        .into_iter()
        .next()
        .ok_or_else(|| ResolutionError::NoNameserver {
            zone: zone.to_string(),
        })
}

/// Remember that the target name does not exist.
fn name_error<T>(
    context: &mut Context<'_, T>,
    domain: &str,
) -> Result<ResolvedRecord, ResolutionError> {
    tracing::trace!("name error");
    context.cache.insert_negative(domain)?;
    context.metrics().name_error();
    Ok(ResolvedRecord::NameError { cached: false })
}
