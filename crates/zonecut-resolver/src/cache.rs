use hickory_proto::rr::{Record, RecordType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::util::name::{canonical_name, prepend_label, split_labels};
use crate::util::types::{CacheReply, Tristate};

/// The well-known root server names.  Every cache starts out knowing
/// these, so a walk always has somewhere to begin.
pub const ROOT_SERVERS: [&str; 13] = [
    "a.root-servers.net",
    "b.root-servers.net",
    "c.root-servers.net",
    "d.root-servers.net",
    "e.root-servers.net",
    "f.root-servers.net",
    "g.root-servers.net",
    "h.root-servers.net",
    "i.root-servers.net",
    "j.root-servers.net",
    "k.root-servers.net",
    "l.root-servers.net",
    "m.root-servers.net",
];

/// A convenience wrapper around a `DomainCache` which lets it be
/// shared between threads.
///
/// Invoking `clone` on a `SharedCache` gives a new instance which
/// refers to the same underlying `DomainCache` object.
#[derive(Debug, Clone)]
pub struct SharedCache {
    cache: Arc<Mutex<DomainCache>>,
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] cache mutex poisoned, cannot recover from this - aborting";

impl SharedCache {
    /// Make a new cache, knowing only the root servers.
    pub fn new() -> Self {
        Self::from_cache(DomainCache::new())
    }

    pub fn from_cache(cache: DomainCache) -> Self {
        SharedCache {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// See `DomainCache::lookup`.
    pub fn lookup(&self, name: &str, qtype: RecordType) -> (CacheReply, Vec<String>, Vec<Record>) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .lookup(name, qtype)
    }

    /// See `DomainCache::insert`.
    pub fn insert(&self, name: &str, nameservers: Vec<String>) -> Result<(), CacheError> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert(name, nameservers)
    }

    /// See `DomainCache::insert_negative`.
    pub fn insert_negative(&self, name: &str) -> Result<(), CacheError> {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert_negative(name)
    }

    /// See `DomainCache::insert_records`.
    pub fn insert_records(&self, name: &str, qtype: RecordType, rrs: &[Record]) {
        self.cache
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .insert_records(name, qtype, rrs);
    }

    /// Number of names in the cache, including the root.
    pub fn len(&self) -> usize {
        self.cache.lock().expect(MUTEX_POISON_MESSAGE).len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for SharedCache {
    fn default() -> Self {
        Self::new()
    }
}

/// What is known about names, stored as a tree of labels rooted at
/// the root zone.
///
/// Nothing is ever removed: the cache only grows.
///
/// You probably want to use `SharedCache` instead.
#[derive(Debug, Clone)]
pub struct DomainCache {
    /// INVARIANT: the root always exists and always has a non-empty
    /// set of nameservers.
    root: Node,
}

/// One name in the cache.
#[derive(Debug, Clone)]
struct Node {
    /// Full name of this node, in canonical form.
    fqdn: String,

    /// Whether the name exists.  Nodes created on the way to a deeper
    /// name start out existing.
    exists: bool,

    /// `None` if never queried.  `Some` and empty if the name is not
    /// a zone cut.  Otherwise the nameservers of the zone starting
    /// here.
    nameservers: Option<Vec<String>>,

    /// Answers to final queries for this name, by query type.
    records: HashMap<RecordType, Vec<Record>>,

    children: HashMap<String, Node>,
}

impl Node {
    fn new(fqdn: String) -> Self {
        Self {
            fqdn,
            exists: true,
            nameservers: None,
            records: HashMap::new(),
            children: HashMap::new(),
        }
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(Node::count).sum::<usize>()
    }
}

impl DomainCache {
    /// Make a new cache, knowing only the root servers.
    pub fn new() -> Self {
        Self::seeded(ROOT_SERVERS.iter().map(ToString::to_string).collect())
    }

    /// Make a new cache with a custom set of root servers.  There must
    /// be at least one.
    pub fn with_root_nameservers(nameservers: Vec<String>) -> Result<Self, CacheError> {
        if nameservers.is_empty() {
            return Err(CacheError::EmptyRoot);
        }

        Ok(Self::seeded(nameservers))
    }

    fn seeded(nameservers: Vec<String>) -> Self {
        let mut root = Node::new(String::new());
        root.nameservers = Some(nameservers);
        Self { root }
    }

    /// Look up what is known about a name, and the records on file for
    /// it of the given type.
    ///
    /// Returns the reply, the name's nameservers (empty unless it is a
    /// known zone cut), and the cached records.
    ///
    /// A name marked as not existing stops the walk down the tree:
    /// anything below it does not exist either.  A name which is
    /// merely absent from the tree is unknown.
    pub fn lookup(&self, name: &str, qtype: RecordType) -> (CacheReply, Vec<String>, Vec<Record>) {
        let name = canonical_name(name);

        let mut node = &self.root;
        let mut closest = self.root.fqdn.clone();
        for label in split_labels(&name).into_iter().rev() {
            let Some(child) = node.children.get(label) else {
                let reply = CacheReply {
                    exists: Tristate::Unknown,
                    not_a_zone: Tristate::Unknown,
                    closest,
                };
                return (reply, Vec::new(), Vec::new());
            };

            if !child.exists {
                let reply = CacheReply {
                    exists: Tristate::False,
                    not_a_zone: Tristate::Unknown,
                    closest,
                };
                return (reply, Vec::new(), Vec::new());
            }

            if child.nameservers.as_ref().is_some_and(|ns| !ns.is_empty()) {
                closest.clone_from(&child.fqdn);
            }
            node = child;
        }

        let records = node.records.get(&qtype).cloned().unwrap_or_default();
        match &node.nameservers {
            None => {
                let reply = CacheReply {
                    exists: Tristate::True,
                    not_a_zone: Tristate::Unknown,
                    closest,
                };
                (reply, Vec::new(), records)
            }
            Some(nameservers) => {
                let reply = CacheReply {
                    exists: Tristate::True,
                    not_a_zone: Tristate::from(nameservers.is_empty()),
                    closest,
                };
                (reply, nameservers.clone(), records)
            }
        }
    }

    /// Record that a name exists, and its nameservers.  An empty set
    /// of nameservers means the name is not a zone cut.
    ///
    /// The root cannot be changed.
    pub fn insert(&mut self, name: &str, nameservers: Vec<String>) -> Result<(), CacheError> {
        let node = self.non_root_node_mut(name)?;
        node.exists = true;
        node.nameservers = Some(nameservers);
        Ok(())
    }

    /// Record that a name does not exist.
    ///
    /// The root cannot be changed.
    pub fn insert_negative(&mut self, name: &str) -> Result<(), CacheError> {
        let node = self.non_root_node_mut(name)?;
        node.exists = false;
        node.nameservers = Some(Vec::new());
        Ok(())
    }

    /// Record the answer to a final query.  Does nothing if there are
    /// no records.
    ///
    /// This does not say anything about whether the name is a zone
    /// cut, so its nameservers are left alone.
    pub fn insert_records(&mut self, name: &str, qtype: RecordType, rrs: &[Record]) {
        if rrs.is_empty() {
            return;
        }

        let node = self.node_mut(&canonical_name(name));
        node.exists = true;
        node.records.insert(qtype, rrs.to_vec());
    }

    /// Number of names in the cache, including the root.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Like `node_mut`, but refuses the root.
    fn non_root_node_mut(&mut self, name: &str) -> Result<&mut Node, CacheError> {
        let name = canonical_name(name);
        if name.is_empty() {
            Err(CacheError::RootInsert)
        } else {
            Ok(self.node_mut(&name))
        }
    }

    /// Find the node for a canonical name, creating it and any missing
    /// ancestors along the way.
    fn node_mut(&mut self, name: &str) -> &mut Node {
        let mut node = &mut self.root;
        for label in split_labels(name).into_iter().rev() {
            let fqdn = prepend_label(label, &node.fqdn);
            node = node
                .children
                .entry(label.to_string())
                .or_insert_with(|| Node::new(fqdn));
        }
        node
    }
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::new()
    }
}

/// An error that can occur when updating the cache.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("the root zone needs nameservers")]
    EmptyRoot,
    #[error("cannot insert facts about the root zone")]
    RootInsert,
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::util::test_util::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lookup_root_returns_root_servers() {
        let cache = DomainCache::new();

        let (reply, nameservers, _) = cache.lookup("", RecordType::NS);

        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(Tristate::False, reply.not_a_zone);
        assert_eq!("", reply.closest);
        assert_eq!(13, nameservers.len());
        assert_eq!(names(&ROOT_SERVERS), nameservers);
    }

    #[test]
    fn lookup_dot_is_root() {
        let cache = DomainCache::new();

        assert_eq!(cache.lookup("", RecordType::A), cache.lookup(".", RecordType::A));
    }

    #[test]
    fn lookup_zone_cut() {
        let mut cache = DomainCache::new();
        cache.insert("de", names(&["ns1.denic.de"])).unwrap();

        let (reply, nameservers, _) = cache.lookup("de", RecordType::A);

        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(Tristate::False, reply.not_a_zone);
        assert_eq!("de", reply.closest);
        assert_eq!(names(&["ns1.denic.de"]), nameservers);
    }

    #[test]
    fn lookup_zone_cut_keeps_every_nameserver() {
        let mut cache = DomainCache::new();
        cache
            .insert(
                "heise.de.",
                names(&["ns1.1and1.net", "slave.isc.org", "ns.netnod.net"]),
            )
            .unwrap();

        let (reply, nameservers, _) = cache.lookup("heise.de", RecordType::A);

        assert_eq!(Tristate::False, reply.not_a_zone);
        assert_eq!("heise.de", reply.closest);
        assert_eq!(
            names(&["ns1.1and1.net", "slave.isc.org", "ns.netnod.net"]),
            nameservers
        );
    }

    #[test]
    fn lookup_not_a_zone_reports_closest_ancestor() {
        let mut cache = DomainCache::new();
        cache
            .insert("verisign.com", names(&["ns1.verisign.com", "ns2.verisign.com"]))
            .unwrap();
        cache.insert("www.verisign.com", Vec::new()).unwrap();

        let (reply, nameservers, _) = cache.lookup("www.verisign.com", RecordType::A);

        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(Tristate::True, reply.not_a_zone);
        assert_eq!("verisign.com", reply.closest);
        assert!(nameservers.is_empty());
    }

    #[test]
    fn lookup_not_a_zone_under_root() {
        let mut cache = DomainCache::new();
        cache.insert("arpa", Vec::new()).unwrap();

        let (reply, _, _) = cache.lookup("arpa", RecordType::A);

        assert_eq!(Tristate::True, reply.not_a_zone);
        assert_eq!("", reply.closest);
    }

    #[test]
    fn lookup_below_negative_does_not_exist() {
        let mut cache = DomainCache::new();
        cache.insert_negative("tagada").unwrap();

        let (reply, nameservers, _) = cache.lookup("foobar.tagada", RecordType::A);

        assert_eq!(Tristate::False, reply.exists);
        assert!(nameservers.is_empty());
    }

    #[test]
    fn lookup_negative_reports_closest_ancestor() {
        let mut cache = DomainCache::new();
        cache.insert("de", names(&["ns1.denic.de"])).unwrap();
        cache.insert_negative("google.de").unwrap();

        let (reply, _, _) = cache.lookup("www.acc.google.de", RecordType::A);

        assert_eq!(Tristate::False, reply.exists);
        assert_eq!("de", reply.closest);
    }

    #[test]
    fn lookup_negative_name_itself() {
        let mut cache = DomainCache::new();
        cache.insert_negative("google.de").unwrap();

        let (reply, _, _) = cache.lookup("google.de", RecordType::A);

        assert_eq!(Tristate::False, reply.exists);
    }

    #[test]
    fn lookup_unknown_name() {
        let cache = DomainCache::new();

        let (reply, nameservers, records) = cache.lookup("www.example.net", RecordType::A);

        assert_eq!(Tristate::Unknown, reply.exists);
        assert_eq!(Tristate::Unknown, reply.not_a_zone);
        assert_eq!("", reply.closest);
        assert!(nameservers.is_empty());
        assert!(records.is_empty());
    }

    #[test]
    fn lookup_unknown_name_below_zone_cut() {
        let mut cache = DomainCache::new();
        cache.insert("net", names(&["a.gtld-servers.net"])).unwrap();

        let (reply, _, _) = cache.lookup("www.example.net", RecordType::A);

        assert_eq!(Tristate::Unknown, reply.exists);
        assert_eq!("net", reply.closest);
    }

    #[test]
    fn lookup_implicit_ancestor_exists_but_is_not_known() {
        let mut cache = DomainCache::new();
        cache.insert("www.verisign.com", Vec::new()).unwrap();

        let (reply, nameservers, _) = cache.lookup("verisign.com", RecordType::A);

        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(Tristate::Unknown, reply.not_a_zone);
        assert_eq!("", reply.closest);
        assert!(nameservers.is_empty());
    }

    #[test]
    fn negative_fact_does_not_hide_closer_zone_cut_below_root() {
        let mut cache = DomainCache::new();
        cache.insert("de", names(&["ns1.denic.de"])).unwrap();
        cache.insert_negative("google.de").unwrap();

        let (reply, nameservers, _) = cache.lookup("de", RecordType::A);

        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(names(&["ns1.denic.de"]), nameservers);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut cache = DomainCache::new();
        cache.insert("de", names(&["ns1.denic.de"])).unwrap();
        let before = cache.lookup("de", RecordType::A);
        let size = cache.len();

        cache.insert("de", names(&["ns1.denic.de"])).unwrap();

        assert_eq!(before, cache.lookup("de", RecordType::A));
        assert_eq!(size, cache.len());
    }

    #[test]
    fn insert_negative_is_idempotent() {
        let mut cache = DomainCache::new();
        cache.insert_negative("tagada").unwrap();
        let before = cache.lookup("foobar.tagada", RecordType::A);

        cache.insert_negative("tagada").unwrap();

        assert_eq!(before, cache.lookup("foobar.tagada", RecordType::A));
    }

    #[test]
    fn lookup_ignores_trailing_dot() {
        let mut cache = DomainCache::new();
        cache
            .insert("example.com.", names(&["ns1.example.com"]))
            .unwrap();

        assert_eq!(
            cache.lookup("example.com", RecordType::A),
            cache.lookup("example.com.", RecordType::A)
        );
    }

    #[test]
    fn lookup_ignores_case() {
        let mut cache = DomainCache::new();
        cache
            .insert("Example.COM", names(&["ns1.example.com"]))
            .unwrap();

        let lower = cache.lookup("example.com", RecordType::A);
        assert_eq!(lower, cache.lookup("Example.COM", RecordType::A));
        assert_eq!("example.com", lower.0.closest);
    }

    #[test]
    fn insert_root_is_an_error() {
        let mut cache = DomainCache::new();

        assert_eq!(Err(CacheError::RootInsert), cache.insert("", Vec::new()));
        assert_eq!(Err(CacheError::RootInsert), cache.insert(".", Vec::new()));
        assert_eq!(Err(CacheError::RootInsert), cache.insert_negative(""));
        assert_eq!(13, cache.lookup("", RecordType::NS).1.len());
    }

    #[test]
    fn custom_root_nameservers() {
        let cache = DomainCache::with_root_nameservers(vec!["ns.test".to_string()]).unwrap();

        let (reply, nameservers, _) = cache.lookup("", RecordType::NS);
        assert_eq!(Tristate::False, reply.not_a_zone);
        assert_eq!(vec!["ns.test".to_string()], nameservers);
    }

    #[test]
    fn empty_root_is_an_error() {
        assert_eq!(
            Err(CacheError::EmptyRoot),
            DomainCache::with_root_nameservers(Vec::new()).map(|cache| cache.len())
        );
    }

    #[test]
    fn insert_creates_intermediate_names() {
        let mut cache = DomainCache::new();
        cache.insert("www.example.com", Vec::new()).unwrap();

        assert_eq!(4, cache.len());
    }

    #[test]
    fn insert_records_are_returned_by_type() {
        let mut cache = DomainCache::new();
        let rr = a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1));
        cache.insert_records("www.example.com", RecordType::A, &[rr.clone()]);

        let (reply, nameservers, records) = cache.lookup("www.example.com", RecordType::A);
        assert_eq!(Tristate::True, reply.exists);
        assert_eq!(Tristate::Unknown, reply.not_a_zone);
        assert!(nameservers.is_empty());
        assert_eq!(vec![rr], records);

        assert!(cache
            .lookup("www.example.com", RecordType::AAAA)
            .2
            .is_empty());
    }

    #[test]
    fn insert_records_keeps_nameservers() {
        let mut cache = DomainCache::new();
        cache.insert("example.com", names(&["ns1.example.com"])).unwrap();
        cache.insert_records(
            "example.com",
            RecordType::NS,
            &[ns_record("example.com.", "ns1.example.com.")],
        );

        let (reply, nameservers, records) = cache.lookup("example.com", RecordType::NS);
        assert_eq!(Tristate::False, reply.not_a_zone);
        assert_eq!(names(&["ns1.example.com"]), nameservers);
        assert_eq!(1, records.len());
    }

    #[test]
    fn insert_no_records_does_nothing() {
        let mut cache = DomainCache::new();
        cache.insert_records("www.example.com", RecordType::A, &[]);

        assert_eq!(1, cache.len());
    }

    #[test]
    fn shared_cache_clones_share_state() {
        let cache = SharedCache::new();
        let other = cache.clone();
        other.insert("de", names(&["ns1.denic.de"])).unwrap();

        assert_eq!("de", cache.lookup("de", RecordType::A).0.closest);
        assert_eq!(2, cache.len());
    }
}
