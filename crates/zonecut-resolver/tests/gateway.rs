use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, NS};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

use zonecut_resolver::cache::SharedCache;
use zonecut_resolver::gateway::{format_invalid, format_outcome, Request, REQUEST_BUFFER_SIZE};
use zonecut_resolver::resolve;
use zonecut_resolver::util::nameserver::NameserverTransport;
use zonecut_resolver::util::types::*;

/// A tiny two-level hierarchy: the root delegates `test` to
/// `ns.test`, which knows `www.test` and nothing else.
struct TestHierarchy {
    queries: AtomicUsize,
}

#[async_trait]
impl NameserverTransport for TestHierarchy {
    async fn query(
        &self,
        name: &str,
        nameserver: &str,
        qtype: RecordType,
        _accept_referrals: bool,
    ) -> Result<NameserverResponse, TransportError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        match (name, nameserver, qtype) {
            ("test", "a.root-servers.net", RecordType::NS) => Ok(NameserverResponse {
                rcode: ResponseCode::NoError,
                is_authoritative: false,
                kind: ResponseKind::Referral,
                rrs: vec![Record::from_rdata(
                    Name::from_ascii("test.").unwrap(),
                    300,
                    RData::NS(NS(Name::from_ascii("ns.test.").unwrap())),
                )],
            }),
            ("www.test", "ns.test", RecordType::A) => Ok(NameserverResponse {
                rcode: ResponseCode::NoError,
                is_authoritative: true,
                kind: ResponseKind::Answer,
                rrs: vec![Record::from_rdata(
                    Name::from_ascii("www.test.").unwrap(),
                    300,
                    RData::A(A(Ipv4Addr::new(10, 0, 0, 1))),
                )],
            }),
            (_, "ns.test", _) => Ok(NameserverResponse {
                rcode: ResponseCode::NXDomain,
                is_authoritative: true,
                kind: ResponseKind::Error,
                rrs: Vec::new(),
            }),
            _ => Err(TransportError::NoAddress {
                nameserver: nameserver.to_string(),
            }),
        }
    }
}

async fn serve(transport: &TestHierarchy, cache: &SharedCache, octets: &[u8]) -> String {
    assert!(octets.len() <= REQUEST_BUFFER_SIZE);

    match Request::parse(octets) {
        Ok(request) => {
            let (_, outcome) = resolve(transport, cache, &request.domain, request.qtype).await;
            format_outcome(&outcome)
        }
        Err(error) => format_invalid(&error),
    }
}

fn hierarchy() -> TestHierarchy {
    TestHierarchy {
        queries: AtomicUsize::new(0),
    }
}

#[tokio::test]
async fn answers_then_serves_from_cache() {
    let transport = hierarchy();
    let cache = SharedCache::new();
    let request = Request::new("www.test", RecordType::A).to_octets();

    let first = serve(&transport, &cache, &request).await;
    assert!(first.starts_with("Final result: ["), "{first}");
    assert!(first.contains("10.0.0.1"), "{first}");
    assert_eq!(2, transport.queries.load(Ordering::SeqCst));

    let second = serve(&transport, &cache, &request).await;
    assert!(second.starts_with("Final result: Data in cache ["), "{second}");
    assert_eq!(2, transport.queries.load(Ordering::SeqCst));
}

#[tokio::test]
async fn reports_and_remembers_missing_names() {
    let transport = hierarchy();
    let cache = SharedCache::new();

    let first = serve(&transport, &cache, b"deep.nope.test\x001").await;
    assert_eq!("Final result: No such domain", first);
    assert_eq!(2, transport.queries.load(Ordering::SeqCst));

    let second = serve(&transport, &cache, b"DEEP.nope.test.\x0028").await;
    assert_eq!("Final result: No such domain", second);
    assert_eq!(2, transport.queries.load(Ordering::SeqCst));
}

#[tokio::test]
async fn reports_transport_failure() {
    let transport = hierarchy();
    let cache = SharedCache::new();

    let reply = serve(&transport, &cache, b"www.example\x001").await;

    assert_eq!(
        "Final result: nameserver a.root-servers.net has no address",
        reply
    );
}

#[tokio::test]
async fn rejects_malformed_requests() {
    let transport = hierarchy();
    let cache = SharedCache::new();

    assert_eq!(
        "Invalid request: no query type",
        serve(&transport, &cache, b"www.test").await
    );
    assert_eq!(
        "Invalid request: query type 0 is not positive",
        serve(&transport, &cache, b"www.test\x000").await
    );
    assert_eq!(0, transport.queries.load(Ordering::SeqCst));
}
