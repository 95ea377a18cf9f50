use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read a DNS message from a TCP stream.
///
/// A DNS TCP message is slightly different to a DNS UDP message: it
/// has a big-endian u16 prefix giving the total length of the
/// message.  This is redundant (since the header is fixed-size and
/// says how many fields there are, and the fields contain length
/// information), but it means the entire message can be read before
/// parsing begins.
pub async fn read_tcp_bytes<S: AsyncRead + Unpin>(stream: &mut S) -> Result<BytesMut, TcpError> {
    let expected = stream.read_u16().await.map_err(TcpError::IO)? as usize;
    let mut bytes = BytesMut::with_capacity(expected);
    while bytes.len() < expected {
        match stream.read_buf(&mut bytes).await {
            Ok(0) => {
                return Err(TcpError::TooShort {
                    expected,
                    actual: bytes.len(),
                })
            }
            Ok(_) => (),
            Err(error) => return Err(TcpError::IO(error)),
        }
    }
    Ok(bytes)
}

/// An error that can occur when reading a DNS TCP message.
#[derive(Debug, thiserror::Error)]
pub enum TcpError {
    #[error("expected {expected} octets but got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error(transparent)]
    IO(io::Error),
}

impl From<TcpError> for io::Error {
    fn from(error: TcpError) -> Self {
        match error {
            TcpError::IO(error) => error,
            too_short @ TcpError::TooShort { .. } => {
                io::Error::new(io::ErrorKind::UnexpectedEof, too_short)
            }
        }
    }
}

/// Write a serialised message to a TCP stream, with the two-byte
/// length prefix (big-endian u16).
pub async fn send_tcp_bytes<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) -> io::Result<()> {
    let Ok(len) = u16::try_from(bytes.len()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "message too long for TCP framing",
        ));
    };

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;

    Ok(())
}
