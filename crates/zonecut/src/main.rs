use clap::Parser;
use hickory_proto::rr::Record;
use std::process;
use tracing_subscriber::EnvFilter;

use zonecut_resolver::cache::SharedCache;
use zonecut_resolver::config::{ResolverConfig, DEFAULT_MAX_TRIALS};
use zonecut_resolver::gateway::{Request, DEFAULT_QTYPE};
use zonecut_resolver::resolve;
use zonecut_resolver::util::nameserver::UpstreamTransport;
use zonecut_resolver::util::types::ResolvedRecord;

fn print_section(heading: &str, rrs: &[Record]) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading}");
    for rr in rrs {
        let rdata = rr.data().map(ToString::to_string).unwrap_or_default();
        println!(
            "{}\t{}\t{}\t{}\t{}",
            rr.name(),
            rr.ttl(),
            rr.dns_class(),
            rr.record_type(),
            rdata
        );
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// Zone cut discovery lookup utility
///
/// Resolves one name from the root, asking each nameserver on the way
/// only about the next label.  Nothing is remembered between runs.
///
/// Only one nameserver is used per zone, and glue records are ignored.
struct Args {
    /// Domain name to resolve
    #[clap(value_parser)]
    domain: String,

    /// Query type to resolve, as a number
    #[clap(short, long, value_parser, allow_negative_numbers = true, default_value_t = i64::from(DEFAULT_QTYPE))]
    qtype: i64,

    /// Seconds to wait for each reply from a nameserver
    #[clap(short, long, value_parser, default_value_t = 1.5, env = "ZONECUT_TIMEOUT")]
    timeout: f64,

    /// Number of times to send a query before giving up
    #[clap(short = 'n', long, value_parser, default_value_t = DEFAULT_MAX_TRIALS, env = "ZONECUT_MAX_TRIALS")]
    max_trials: usize,

    /// Log each step of the walk
    #[clap(short, long, action(clap::ArgAction::SetTrue))]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match ResolverConfig::from_secs_f64(args.timeout, args.max_trials) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            process::exit(1);
        }
    };

    let request = match Request::from_parts(&args.domain, args.qtype) {
        Ok(request) => request,
        Err(error) => {
            eprintln!("{error}");
            process::exit(1);
        }
    };

    println!(";; QUESTION");
    println!("{}\tIN\t{}", request.domain, request.qtype);

    let (metrics, response) = resolve(
        &UpstreamTransport::new(config),
        &SharedCache::new(),
        &request.domain,
        request.qtype,
    )
    .await;

    tracing::debug!(
        nameserver_queries = %metrics.nameserver_queries(),
        zone_cuts = %metrics.zone_cuts,
        "done"
    );

    match response {
        Ok(ResolvedRecord::NameError { .. }) => {
            println!("\n;; ANSWER");
            println!("; name does not exist");
            process::exit(1);
        }
        Ok(ResolvedRecord::Answer {
            rrs,
            is_authoritative,
        }) => {
            if rrs.is_empty() {
                println!("\n;; ANSWER");
                println!("; no records");
            } else if is_authoritative {
                print_section("ANSWER", &rrs);
            } else {
                print_section("ANSWER (non-authoritative)", &rrs);
            }
        }
        Ok(ResolvedRecord::Cached { rrs }) => print_section("ANSWER", &rrs),
        Err(err) => {
            println!("\n;; ANSWER");
            println!("; {err}");
            process::exit(1);
        }
    }
}
