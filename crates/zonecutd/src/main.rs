use clap::Parser;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing_subscriber::EnvFilter;

use zonecut_resolver::cache::SharedCache;
use zonecut_resolver::config::{ResolverConfig, DEFAULT_MAX_TRIALS};
use zonecut_resolver::gateway::{
    format_invalid, format_outcome, Request, DEFAULT_SOCKET_PATH, REQUEST_BUFFER_SIZE,
};
use zonecut_resolver::resolve;
use zonecut_resolver::util::nameserver::UpstreamTransport;
use zonecut_resolver::util::types::ResolvedRecord;

mod metrics;

use self::metrics::*;

/// How long a client gets to send its request.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Read a request, giving up if the client sends nothing in time.
async fn read_request<S: AsyncRead + Unpin>(stream: &mut S, wait: Duration) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; REQUEST_BUFFER_SIZE];
    match tokio::time::timeout(wait, stream.read(&mut buf)).await {
        Ok(size) => {
            buf.truncate(size?);
            Ok(buf)
        }
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "client sent no request",
        )),
    }
}

/// Serve one connection: read a request, resolve it, write back the
/// reply line.
async fn handle_connection(
    transport: &UpstreamTransport,
    cache: &SharedCache,
    stream: &mut UnixStream,
) -> io::Result<()> {
    let start = Instant::now();

    let request = read_request(stream, REQUEST_READ_TIMEOUT).await?;

    let reply = match Request::parse(&request) {
        Ok(request) => {
            tracing::info!(domain = %request.domain, qtype = %request.qtype, "got request");

            let (metrics, outcome) = resolve(transport, cache, &request.domain, request.qtype).await;
            record_resolution(&metrics);
            CACHE_SIZE.set(i64::try_from(cache.len()).unwrap_or(i64::MAX));

            let outcome_label = match &outcome {
                Ok(ResolvedRecord::Answer { .. }) => OUTCOME_ANSWER,
                Ok(ResolvedRecord::Cached { .. }) => OUTCOME_CACHED,
                Ok(ResolvedRecord::NameError { .. }) => OUTCOME_NAME_ERROR,
                Err(error) => {
                    tracing::info!(%error, "resolution failed");
                    OUTCOME_FAILURE
                }
            };
            ZONECUT_REQUESTS_TOTAL
                .with_label_values(&[outcome_label])
                .inc();

            tracing::info!(
                outcome = %outcome_label,
                nameserver_queries = %metrics.nameserver_queries(),
                zone_cuts = %metrics.zone_cuts,
                "done"
            );

            format_outcome(&outcome)
        }
        Err(error) => {
            tracing::info!(%error, "invalid request");
            ZONECUT_REQUESTS_TOTAL
                .with_label_values(&[OUTCOME_INVALID])
                .inc();
            format_invalid(&error)
        }
    };

    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await?;

    ZONECUT_RESPONSE_TIME_SECONDS.observe(start.elapsed().as_secs_f64());

    Ok(())
}

/// Requests are served one at a time, in the order they arrive.
async fn listen_unix(transport: UpstreamTransport, cache: SharedCache, listener: UnixListener) {
    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                if let Err(error) = handle_connection(&transport, &cache, &mut stream).await {
                    tracing::debug!(?error, "connection error");
                }
            }
            Err(error) => tracing::debug!(?error, "accept error"),
        }
    }
}

/// Remove a socket file left behind by a previous run.
async fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

fn begin_logging(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let logger = tracing_subscriber::fmt().with_env_filter(filter);

    if log_json {
        logger.json().init();
    } else {
        logger.init();
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// A DNS resolver which discovers zone cuts one label at a time.
///
/// Each nameserver on the way down is asked only about the name one
/// label below its zone: only the last one sees the full name.  What
/// is learned (zone cuts, names which are not zone cuts, names which
/// do not exist) is remembered until the process exits.
///
/// Requests come in over a Unix socket, as "<domain>\0<qtype>", and
/// get a single line of text back.
///
/// Only one nameserver is used per zone, and nameserver names are
/// turned into addresses by the system resolver: glue records are
/// ignored.
struct Args {
    /// Path of the Unix socket to listen on
    #[clap(short, long, value_parser, default_value = DEFAULT_SOCKET_PATH, env = "ZONECUT_SOCKET")]
    socket: PathBuf,

    /// Seconds to wait for each reply from a nameserver
    #[clap(short, long, value_parser, default_value_t = 1.5, env = "ZONECUT_TIMEOUT")]
    timeout: f64,

    /// Number of times to send a query before giving up
    #[clap(short = 'n', long, value_parser, default_value_t = DEFAULT_MAX_TRIALS, env = "ZONECUT_MAX_TRIALS")]
    max_trials: usize,

    /// Address to listen on to serve Prometheus metrics
    #[clap(long, value_parser, env = "ZONECUT_METRICS_ADDRESS")]
    metrics_address: Option<SocketAddr>,

    /// Log in JSON
    #[clap(long, action(clap::ArgAction::SetTrue), env = "ZONECUT_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging(args.log_json);

    let config = match ResolverConfig::from_secs_f64(args.timeout, args.max_trials) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            process::exit(1);
        }
    };

    if let Err(error) = remove_stale_socket(&args.socket).await {
        tracing::error!(socket = ?args.socket, ?error, "could not remove old socket");
        process::exit(1);
    }

    tracing::info!(socket = ?args.socket, "binding Unix socket");
    let listener = match UnixListener::bind(&args.socket) {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(socket = ?args.socket, ?error, "could not bind Unix socket");
            process::exit(1);
        }
    };

    if let Some(address) = args.metrics_address {
        tracing::info!(%address, "binding HTTP TCP socket");
        tokio::spawn(async move {
            if let Err(error) = serve_prometheus_endpoint_task(address).await {
                tracing::error!(?error, "could not serve metrics");
            }
        });
    }

    let transport = UpstreamTransport::new(config);
    let cache = SharedCache::new();

    tokio::select! {
        () = listen_unix(transport, cache, listener) => (),
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::error!(?error, "could not wait for interrupt");
            }
            tracing::info!("shutting down");
        }
    }

    if let Err(error) = remove_stale_socket(&args.socket).await {
        tracing::warn!(socket = ?args.socket, ?error, "could not remove socket");
    }
}
