//! Inbox command line client
//!
//! Loads a cached inbox from a snapshot file, applies one status change the
//! same way the interactive client does (cache first, server second) and
//! writes the reconciled cache back.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use inbox::config::{load_config, load_config_from_path};
use inbox::{
    CacheSnapshot, HttpInboxApi, InboxApi, InboxConfig, InboxError, InboxMutation, InboxUpdater,
    MemoryCache, Reconciled, TracingNotifier, UpdateRequest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "inboxctl")]
#[command(about = "Apply an inbox status change to a cached inbox")]
#[command(version)]
struct Args {
    /// Cache snapshot (JSON), rewritten in place on success
    #[arg(short, long, value_name = "PATH")]
    cache: PathBuf,

    /// Update request (JSON)
    #[arg(short, long, value_name = "PATH")]
    request: PathBuf,

    /// Configuration file, instead of the default locations
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the speculative cache without contacting the server
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Server stand-in that accepts every mutation
struct DryRunApi;

#[async_trait]
impl InboxApi for DryRunApi {
    async fn update_messages(&self, mutation: &InboxMutation) -> inbox::Result<()> {
        info!(
            "Dry run: would set {} message(s) to {}",
            mutation.ids.len(),
            mutation.status
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => load_config()?,
    };

    let snapshot: CacheSnapshot = serde_json::from_str(&fs::read_to_string(&args.cache)?)?;
    let request = read_request(&args.request, &config)?;

    let cache = Arc::new(MemoryCache::from_snapshot(snapshot));
    let api: Arc<dyn InboxApi> = if args.dry_run {
        Arc::new(DryRunApi)
    } else {
        Arc::new(HttpInboxApi::from_config(&config)?)
    };

    let updater = InboxUpdater::new(cache.clone(), api, Arc::new(TracingNotifier));

    match updater.update(&request).await? {
        Reconciled::Committed if args.dry_run => {
            println!("{}", serde_json::to_string_pretty(&cache.snapshot())?);
        }
        Reconciled::Committed => {
            fs::write(&args.cache, serde_json::to_string_pretty(&cache.snapshot())?)?;
            print_summary(&cache);
        }
        Reconciled::RolledBack { notice } => {
            eprintln!("{}", notice.message);
        }
    }

    Ok(())
}

/// Read an update request, taking the recency window from the config when
/// the request leaves it out.
fn read_request(path: &Path, config: &InboxConfig) -> Result<UpdateRequest, InboxError> {
    let content = fs::read_to_string(path)?;
    let mut value: serde_json::Value = serde_json::from_str(&content)?;

    if let Some(fields) = value.as_object_mut() {
        fields
            .entry("last")
            .or_insert_with(|| serde_json::Value::from(config.last));
    }

    Ok(serde_json::from_value(value)?)
}

fn print_summary(cache: &MemoryCache) {
    for key in cache.keys() {
        let unread = cache.unread_count(&key).unwrap_or_default();
        println!("{}: {} unread", key, unread);
    }
}

fn setup_tracing(verbose: bool) {
    // RUST_LOG wins over the defaults below.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose || cfg!(debug_assertions) {
            EnvFilter::new("inbox=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
