//! Feed Loader CLI
//!
//! Fetches the buyer, product and transaction feeds and loads them into
//! Dgraph as one transaction.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --source-url https://feeds.example.com --date 2020-10-21
//! cargo run -- --source-dir ./feeds --dry-run
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `FEED_SOURCE_URL`, `FEED_SOURCE_DIR`, `DGRAPH_URL`: defaults for the
//!   matching flags

use chrono::{NaiveDate, Utc};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use feed_loader::pipeline::{self, PipelineContext};
use feed_loader::source::DEFAULT_TIMEOUT;
use feed_loader::{
    feed_timestamp, DgraphClient, DirFeedSource, FeedSource, HttpFeedSource, LoaderError,
    RecordingTxn, Result, SCHEMA,
};
use log::warn;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "feed-loader", about = "Load buyer, product and transaction feeds into Dgraph")]
struct Cli {
    /// Base URL serving /buyers, /products and /transactions
    #[arg(long, env = "FEED_SOURCE_URL")]
    source_url: Option<String>,

    /// Directory holding buyers.json, products.txt and transactions.bin
    #[arg(long, env = "FEED_SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Dgraph alpha HTTP endpoint
    #[arg(long, env = "DGRAPH_URL", default_value = "http://localhost:8080")]
    dgraph_url: String,

    /// Feed snapshot date (YYYY-MM-DD), defaults to today (UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Timeout for each HTTP request, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Apply the graph schema before loading
    #[arg(long)]
    apply_schema: bool,

    /// Decode and print the mutations without contacting Dgraph
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    env_logger::init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    if let Err(e) = run(cli, &matches) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn on_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Picks the feed source. A flag given on the command line wins over the
/// environment; with both from the environment the URL wins.
fn feed_source(cli: &Cli, matches: &ArgMatches, timeout: Duration) -> Result<Box<dyn FeedSource>> {
    let url_flag = on_command_line(matches, "source_url");
    let dir_flag = on_command_line(matches, "source_dir");

    match (&cli.source_url, &cli.source_dir) {
        (Some(_), Some(_)) if url_flag && dir_flag => Err(LoaderError::InvalidArgument(
            "--source-url and --source-dir cannot be combined".to_string(),
        )),
        (Some(_), Some(dir)) if dir_flag => Ok(Box::new(DirFeedSource::new(dir))),
        (Some(url), _) => Ok(Box::new(HttpFeedSource::new(url, timeout)?)),
        (None, Some(dir)) => Ok(Box::new(DirFeedSource::new(dir))),
        (None, None) => Err(LoaderError::InvalidArgument(
            "one of --source-url or --source-dir is required".to_string(),
        )),
    }
}

fn run(cli: Cli, matches: &ArgMatches) -> Result<()> {
    let timeout = Duration::from_secs(cli.timeout_secs);
    let date = feed_timestamp(cli.date.unwrap_or_else(|| Utc::now().date_naive()));
    let source = feed_source(&cli, matches, timeout)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if cli.dry_run {
        if cli.apply_schema {
            warn!("Dry run, schema not applied");
        }
        let mut txn = RecordingTxn::new();
        let summary = pipeline::run(PipelineContext {
            source: &*source,
            txn: &mut txn,
            date,
        })?;
        for payload in txn.mutations() {
            writeln!(handle, "{}", payload.as_json())?;
        }
        summary.write_report(&mut handle)?;
        return Ok(());
    }

    let client = DgraphClient::new(&cli.dgraph_url, timeout)?;
    if cli.apply_schema {
        client.alter_schema(SCHEMA)?;
    }
    let mut txn = client.new_txn();
    let summary = pipeline::run(PipelineContext {
        source: &*source,
        txn: &mut txn,
        date,
    })?;
    summary.write_report(&mut handle)?;

    Ok(())
}
