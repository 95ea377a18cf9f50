//! The request format spoken over the local socket between the
//! daemon and its client.
//!
//! A request is a domain name and a query type, separated by a NUL:
//! `"<domain>\0<qtype>"`, where the query type is in decimal.  The
//! reply is a single human-readable line.  A connection carries one
//! request and one reply.

use hickory_proto::rr::RecordType;
use std::fmt;

use crate::util::name::{canonical_name, is_valid_name};
use crate::util::types::{ResolutionError, ResolvedRecord};

/// The most a request (and a reply) can be.
pub const REQUEST_BUFFER_SIZE: usize = 512;

/// Query type used when the client does not give one (A).
pub const DEFAULT_QTYPE: u16 = 1;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/zonecut.sock";

/// A parsed request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Request {
    /// As given by the client: not canonicalised.
    pub domain: String,
    pub qtype: RecordType,
}

impl Request {
    pub fn new(domain: &str, qtype: RecordType) -> Self {
        Self {
            domain: domain.to_string(),
            qtype,
        }
    }

    /// Parse a request.
    ///
    /// The domain must be a valid name (use `"."` for the root), and
    /// the query type a number from 1 to 65535.
    pub fn parse(octets: &[u8]) -> Result<Self, RequestError> {
        let request = std::str::from_utf8(octets).map_err(|_| RequestError::NotUtf8)?;
        let Some((domain, qtype)) = request.split_once('\0') else {
            return Err(RequestError::MissingQtype);
        };

        let qtype = qtype.trim_end_matches('\0').trim();
        if qtype.is_empty() {
            return Err(RequestError::MissingQtype);
        }
        let Ok(number) = qtype.parse::<i64>() else {
            return Err(RequestError::InvalidQtype {
                qtype: qtype.to_string(),
            });
        };

        Self::from_parts(domain, number)
    }

    /// Check a domain and a numeric query type, as given by a user.
    pub fn from_parts(domain: &str, qtype: i64) -> Result<Self, RequestError> {
        if domain.is_empty() || !is_valid_name(&canonical_name(domain)) {
            return Err(RequestError::InvalidDomain {
                domain: domain.to_string(),
            });
        }

        if qtype <= 0 {
            return Err(RequestError::NonPositiveQtype { qtype });
        }
        let Ok(number) = u16::try_from(qtype) else {
            return Err(RequestError::InvalidQtype {
                qtype: qtype.to_string(),
            });
        };

        Ok(Self::new(domain, RecordType::from(number)))
    }

    /// Serialise a request.
    pub fn to_octets(&self) -> Vec<u8> {
        format!("{}\0{}", self.domain, u16::from(self.qtype)).into_bytes()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.domain, self.qtype)
    }
}

/// A request which could not be parsed.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("request is not UTF-8")]
    NotUtf8,
    #[error("no query type")]
    MissingQtype,
    #[error("query type {qtype:?} is not a number from 1 to 65535")]
    InvalidQtype { qtype: String },
    #[error("query type {qtype} is not positive")]
    NonPositiveQtype { qtype: i64 },
    #[error("invalid domain {domain:?}")]
    InvalidDomain { domain: String },
}

/// The reply line for a resolution.
pub fn format_outcome(outcome: &Result<ResolvedRecord, ResolutionError>) -> String {
    match outcome {
        Ok(resolved) => format!("Final result: {resolved}"),
        Err(error) => format!("Final result: {error}"),
    }
}

/// The reply line for a request which could not be parsed.
pub fn format_invalid(error: &RequestError) -> String {
    format!("Invalid request: {error}")
}
