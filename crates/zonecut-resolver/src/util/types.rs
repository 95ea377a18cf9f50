use hickory_proto::error::ProtoError;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::Record;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::cache::CacheError;

/// A fact which may not be known yet.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Tristate {
    #[default]
    Unknown,
    True,
    False,
}

impl Tristate {
    pub fn is_unknown(self) -> bool {
        self == Tristate::Unknown
    }

    pub fn is_true(self) -> bool {
        self == Tristate::True
    }

    pub fn is_false(self) -> bool {
        self == Tristate::False
    }
}

impl From<bool> for Tristate {
    fn from(b: bool) -> Self {
        if b {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

/// What the cache knows about a name.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct CacheReply {
    /// Whether the name exists.
    pub exists: Tristate,
    /// Whether the name exists but is not itself a zone cut, so its
    /// nameservers are those of `closest`.  Only known when the
    /// name's nameservers are known.
    pub not_a_zone: Tristate,
    /// The closest known zone cut at or above the name (the root is
    /// `""`).  Resolution resumes from here.
    pub closest: String,
}

/// The result of a name resolution attempt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResolvedRecord {
    /// The final nameserver answered.
    Answer {
        rrs: Vec<Record>,
        is_authoritative: bool,
    },
    /// Answered from the cache: no query was sent.
    Cached { rrs: Vec<Record> },
    /// The name does not exist.  `cached` is true if this was already
    /// known and no query was sent.
    NameError { cached: bool },
}

impl ResolvedRecord {
    pub fn rrs(self) -> Vec<Record> {
        match self {
            ResolvedRecord::Answer { rrs, .. } => rrs,
            ResolvedRecord::Cached { rrs } => rrs,
            ResolvedRecord::NameError { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for ResolvedRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolvedRecord::Answer { rrs, .. } => write_rrs(f, rrs),
            ResolvedRecord::Cached { rrs } => {
                write!(f, "Data in cache ")?;
                write_rrs(f, rrs)
            }
            ResolvedRecord::NameError { .. } => write!(f, "No such domain"),
        }
    }
}

fn write_rrs(f: &mut fmt::Formatter, rrs: &[Record]) -> fmt::Result {
    write!(f, "[")?;
    for (i, rr) in rrs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{rr}")?;
    }
    write!(f, "]")
}

/// Which part of a nameserver response was kept.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResponseKind {
    /// The answer section was non-empty.
    Answer,
    /// No answer, but NS records in the authority section.
    Referral,
    /// No answer, and referrals were not wanted.
    NoAnswer,
    /// No answer and no NS records in the authority section.
    NoAnswerNoReferral,
    /// The response code was not NOERROR: no records were kept.
    Error,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResponseKind::Answer => write!(f, "Answer(s)"),
            ResponseKind::Referral => write!(f, "Referral(s)"),
            ResponseKind::NoAnswer => write!(f, "0 answer"),
            ResponseKind::NoAnswerNoReferral => write!(f, "0 answer and 0 referral"),
            ResponseKind::Error => write!(f, "error"),
        }
    }
}

/// A response from a remote nameserver.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NameserverResponse {
    pub rcode: ResponseCode,
    pub is_authoritative: bool,
    pub kind: ResponseKind,
    /// The answer section, the NS records of a referral, or nothing,
    /// depending on `kind`.
    pub rrs: Vec<Record>,
}

impl NameserverResponse {
    /// Whether the query got a usable (NOERROR) response.
    pub fn is_retrieved(&self) -> bool {
        self.rcode == ResponseCode::NoError
    }
}

/// An error that can occur while talking to a nameserver.  None of
/// these say anything about the name being queried, so none of them
/// are cached.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not look up address of nameserver {nameserver}: {error}")]
    Lookup { nameserver: String, error: io::Error },
    #[error("nameserver {nameserver} has no address")]
    NoAddress { nameserver: String },
    #[error("invalid query name {name:?}")]
    InvalidName { name: String },
    #[error("could not serialise query: {0}")]
    Serialise(#[source] ProtoError),
    #[error("network error talking to {address}: {error}")]
    Network { address: SocketAddr, error: io::Error },
    #[error("malformed response from {address}")]
    Malformed { address: SocketAddr },
    #[error("no response after {trials} trial(s)")]
    Timeout { trials: usize },
}

/// An error that aborts a resolution walk.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("Fatal error {rcode}")]
    Protocol { rcode: ResponseCode },
    #[error("no nameserver on file for zone {zone:?}")]
    NoNameserver { zone: String },
    #[error("invalid domain name {name:?}")]
    InvalidName { name: String },
    #[error("ran out of labels before reaching {domain:?}")]
    LabelsExhausted { domain: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}
