use clap::Parser;
use hickory_proto::rr::RecordType;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use zonecut_resolver::gateway::{Request, DEFAULT_QTYPE, DEFAULT_SOCKET_PATH, REQUEST_BUFFER_SIZE};

async fn ask(socket: &Path, request: &Request) -> io::Result<String> {
    let mut stream = UnixStream::connect(socket).await?;
    stream.write_all(&request.to_octets()).await?;

    let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
    let mut size = 0;
    while size < buf.len() {
        match stream.read(&mut buf[size..]).await? {
            0 => break,
            n => size += n,
        }
    }

    Ok(String::from_utf8_lossy(&buf[..size]).into_owned())
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// Ask a running zonecutd to resolve a name
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    domain: String,

    /// Query type to resolve, as a number
    #[clap(value_parser, default_value_t = DEFAULT_QTYPE)]
    qtype: u16,

    /// Path of the daemon's Unix socket
    #[clap(short, long, value_parser, default_value = DEFAULT_SOCKET_PATH, env = "ZONECUT_SOCKET")]
    socket: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let request = Request::new(&args.domain, RecordType::from(args.qtype));

    match ask(&args.socket, &request).await {
        Ok(reply) => println!("Got {reply:?}"),
        Err(error) => {
            eprintln!("could not query {}: {error}", args.socket.display());
            process::exit(1);
        }
    }
}
