use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_kv::{
    config::{Config, read_config_file},
    storage::{CallContext, KeyValue, KvHandle},
    util::{get_etcd_endpoints, get_etcd_prefix, parse_endpoint_list},
};
use tracing::{debug, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Read and write metric values in the configured key-value store")]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Comma separated etcd endpoints (overrides the config file)
    #[arg(long)]
    endpoints: Option<String>,

    /// Key prefix for the etcd backend
    #[arg(long)]
    prefix: Option<String>,

    /// Deadline for the operation in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the value stored under a key
    Get { key: String },

    /// Store a value under a key
    Set {
        key: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Delete a key
    Remove { key: String },

    /// Check backend health
    Health,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let filter = filter::Targets::new()
        .with_targets(vec![("metrics_kv", level), ("kvctl", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    let endpoints = args
        .endpoints
        .as_deref()
        .and_then(parse_endpoint_list)
        .or_else(get_etcd_endpoints);
    let prefix = args.prefix.clone().or_else(get_etcd_prefix);
    let config = config.with_overrides(endpoints, prefix);
    debug!("storage config: {:?}", config.storage);

    let store = KvHandle::from_config(&config.storage)?;

    let ctx = match args.timeout_ms {
        Some(ms) => CallContext::with_timeout(Duration::from_millis(ms)),
        None => CallContext::background(),
    };

    match args.command {
        Command::Get { key } => {
            let value = store.get(&ctx, &key).await?;
            println!("{value}");
        }
        Command::Set { key, value } => {
            store.set(&ctx, &key, value).await?;
        }
        Command::Remove { key } => {
            store.remove(&ctx, &key).await?;
        }
        Command::Health => {
            let status = store.health_check(&ctx).await?;
            println!("{} ({})", status.message, store.backend_name());
            let mut metadata: Vec<_> = status.metadata.into_iter().collect();
            metadata.sort();
            for (key, value) in metadata {
                println!("  {key}: {value}");
            }
            if !status.healthy {
                anyhow::bail!("backend unhealthy");
            }
        }
    }

    Ok(())
}
