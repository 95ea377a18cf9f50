use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, Record, RecordType};
use rand::Rng;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::config::ResolverConfig;
use crate::util::name::fqdn;
use crate::util::net::{read_tcp_bytes, send_tcp_bytes};
use crate::util::types::*;

/// Port nameservers listen on.
pub const DNS_PORT: u16 = 53;

/// Largest UDP response we accept: we do not send EDNS, so anything
/// bigger comes back truncated and is retried over TCP.
const UDP_BUFFER_SIZE: usize = 512;

/// Something which can put a single question to a single nameserver.
///
/// `name` is a canonical name (see `util::name`) and `nameserver` a
/// hostname or IP address.  Implementations handle their own timeouts
/// and retries: an `Err` means the question went unanswered.
#[async_trait]
pub trait NameserverTransport: Sync {
    async fn query(
        &self,
        name: &str,
        nameserver: &str,
        qtype: RecordType,
        accept_referrals: bool,
    ) -> Result<NameserverResponse, TransportError>;
}

/// Talks to real nameservers, on port 53 unless told otherwise: UDP
/// first, then TCP if the UDP response is truncated.
///
/// Nameserver hostnames are turned into addresses by the operating
/// system's resolver: glue records are never used.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamTransport {
    config: ResolverConfig,
    port: u16,
}

impl UpstreamTransport {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_port(config, DNS_PORT)
    }

    pub fn with_port(config: ResolverConfig, port: u16) -> Self {
        Self { config, port }
    }

    /// One attempt: send the query and wait for a matching response.
    /// `Ok(None)` means the attempt timed out or got an unrelated
    /// response, and may be retried.
    async fn attempt(
        &self,
        address: SocketAddr,
        request: &Message,
        serialised_request: &[u8],
    ) -> Result<Option<Message>, TransportError> {
        let Ok(udp_response) = timeout(
            self.config.timeout(),
            query_nameserver_udp(address, serialised_request),
        )
        .await
        else {
            tracing::debug!("timed out");
            return Ok(None);
        };
        let udp_response = udp_response?;

        if !response_matches_request(request, &udp_response) {
            tracing::debug!(id = %udp_response.id(), "discarding mismatched response");
            return Ok(None);
        }
        if !udp_response.truncated() {
            return Ok(Some(udp_response));
        }

        tracing::trace!("response truncated - retrying over TCP");
        let Ok(tcp_response) = timeout(
            self.config.timeout(),
            query_nameserver_tcp(address, serialised_request),
        )
        .await
        else {
            tracing::debug!("timed out");
            return Ok(None);
        };
        let tcp_response = tcp_response?;

        if response_matches_request(request, &tcp_response) {
            Ok(Some(tcp_response))
        } else {
            tracing::debug!(id = %tcp_response.id(), "discarding mismatched response");
            Ok(None)
        }
    }
}

impl Default for UpstreamTransport {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

#[async_trait]
impl NameserverTransport for UpstreamTransport {
    async fn query(
        &self,
        name: &str,
        nameserver: &str,
        qtype: RecordType,
        accept_referrals: bool,
    ) -> Result<NameserverResponse, TransportError> {
        let address = nameserver_address(nameserver, self.port).await?;
        let request = make_request(rand::thread_rng().gen(), name, qtype)?;
        let serialised_request = request.to_vec().map_err(TransportError::Serialise)?;

        tracing::trace!(%name, %qtype, %nameserver, %address, "querying nameserver");

        for trial in 1..=self.config.max_trials() {
            if let Some(response) = self
                .attempt(address, &request, &serialised_request)
                .await?
            {
                return Ok(interpret_response(&response, accept_referrals));
            }
            tracing::debug!(%trial, max_trials = %self.config.max_trials(), "no usable response");
        }

        Err(TransportError::Timeout {
            trials: self.config.max_trials(),
        })
    }
}

/// Build a non-recursive query for a canonical name.
pub fn make_request(id: u16, name: &str, qtype: RecordType) -> Result<Message, TransportError> {
    let qname = Name::from_ascii(fqdn(name)).map_err(|_| TransportError::InvalidName {
        name: name.to_string(),
    })?;

    let mut request = Message::new();
    request
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(qname, qtype));

    Ok(request)
}

/// Find the address of a nameserver by asking the system resolver.
/// IPv4 addresses are preferred.
async fn nameserver_address(nameserver: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let addresses = lookup_host((nameserver, port))
        .await
        .map_err(|error| TransportError::Lookup {
            nameserver: nameserver.to_string(),
            error,
        })?
        .collect::<Vec<_>>();

    addresses
        .iter()
        .find(|address| address.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
        .ok_or_else(|| TransportError::NoAddress {
            nameserver: nameserver.to_string(),
        })
}

/// Send a message to a remote nameserver over UDP, returning the
/// response.  The response is NOT validated - consumers MUST check it
/// with `response_matches_request` before using it!
async fn query_nameserver_udp(
    address: SocketAddr,
    serialised_request: &[u8],
) -> Result<Message, TransportError> {
    let network_error = |error| TransportError::Network { address, error };

    let local: SocketAddr = if address.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let sock = UdpSocket::bind(local).await.map_err(network_error)?;
    sock.connect(address).await.map_err(network_error)?;
    sock.send(serialised_request).await.map_err(network_error)?;

    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    let size = sock.recv(&mut buf).await.map_err(network_error)?;

    Message::from_vec(&buf[..size]).map_err(|_| TransportError::Malformed { address })
}

/// Send a message to a remote nameserver over TCP, returning the
/// response.  This has the same caveats as `query_nameserver_udp`.
async fn query_nameserver_tcp(
    address: SocketAddr,
    serialised_request: &[u8],
) -> Result<Message, TransportError> {
    let network_error = |error| TransportError::Network { address, error };

    let mut stream = TcpStream::connect(address).await.map_err(network_error)?;
    send_tcp_bytes(&mut stream, serialised_request)
        .await
        .map_err(network_error)?;
    let bytes = read_tcp_bytes(&mut stream)
        .await
        .map_err(|error| network_error(error.into()))?;

    Message::from_vec(bytes.as_ref()).map_err(|_| TransportError::Malformed { address })
}

/// Very basic validation that a nameserver response matches a
/// request:
///
/// - Check the ID, opcode, and questions match.
///
/// - Check it is a response.
///
/// The response code is not checked: name errors and failures are
/// answers too, and the caller decides what to do with them.
pub fn response_matches_request(request: &Message, response: &Message) -> bool {
    if request.id() != response.id() {
        return false;
    }
    if response.message_type() != MessageType::Response {
        return false;
    }
    if request.op_code() != response.op_code() {
        return false;
    }
    if request.queries() != response.queries() {
        return false;
    }

    true
}

/// Pick out the records the resolver cares about:
///
/// - the answer section, if there is one;
///
/// - otherwise the NS records in the authority section, if referrals
///   are acceptable;
///
/// - otherwise nothing.
///
/// Nothing is kept from a response with a non-NOERROR code.
pub fn interpret_response(response: &Message, accept_referrals: bool) -> NameserverResponse {
    let rcode = response.response_code();
    let is_authoritative = response.authoritative();

    let (kind, rrs) = if rcode != ResponseCode::NoError {
        (ResponseKind::Error, Vec::new())
    } else if !response.answers().is_empty() {
        (ResponseKind::Answer, response.answers().to_vec())
    } else if accept_referrals {
        let referrals = response
            .name_servers()
            .iter()
            .filter(|rr| rr.record_type() == RecordType::NS)
            .cloned()
            .collect::<Vec<Record>>();
        if referrals.is_empty() {
            (ResponseKind::NoAnswerNoReferral, referrals)
        } else {
            (ResponseKind::Referral, referrals)
        }
    } else {
        (ResponseKind::NoAnswer, Vec::new())
    };

    NameserverResponse {
        rcode,
        is_authoritative,
        kind,
        rrs,
    }
}


#[cfg(test)]
pub mod test_util {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::util::test_util::*;

    pub fn matching_nameserver_response() -> (Message, Message) {
        nameserver_response(
            "www.example.com",
            ResponseCode::NoError,
            &[a_record("www.example.com.", Ipv4Addr::new(1, 1, 1, 1))],
            &[],
        )
    }

    pub fn nameserver_response(
        name: &str,
        rcode: ResponseCode,
        answers: &[Record],
        authority: &[Record],
    ) -> (Message, Message) {
        let request = make_request(1234, name, RecordType::A).unwrap();

        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_response_code(rcode)
            .add_queries(request.queries().to_vec())
            .add_answers(answers.to_vec())
            .add_name_servers(authority.to_vec());

        (request, response)
    }
}
