//! portdb CLI
//!
//! Ingests a catalog feed into a data directory and prints pages of it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portdb::config::WalSyncStrategy;
use portdb::{CancelToken, CatalogService, Config, Engine, PortFeed, PortsFilter};
use tracing_subscriber::{fmt, EnvFilter};

/// portdb CLI
#[derive(Parser, Debug)]
#[command(name = "portdb-cli")]
#[command(about = "Ingest and page through a port catalog")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./portdb_data")]
    data_dir: PathBuf,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    /// fsync the WAL after every write
    #[arg(long)]
    sync_every_write: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a catalog JSON object into the store
    Ingest {
        /// Catalog file, or `-` for stdin
        file: String,
    },

    /// Print one page of ports as JSON
    List {
        /// Start after this port id
        #[arg(short, long, default_value = "")]
        from_id: String,

        /// Page size (0 = default of 1000)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,portdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> portdb::Result<()> {
    tracing::debug!("portdb v{}, data directory {}", portdb::VERSION, args.data_dir.display());

    let sync_strategy = if args.sync_every_write {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::EveryNEntries { count: 100 }
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .wal_sync_strategy(sync_strategy)
        .build();
    let max_record_size = config.max_record_size;

    let service = CatalogService::new(Engine::open(config)?);
    let cancel = CancelToken::new();

    let outcome = match args.command {
        Commands::Ingest { file } => {
            let input: Box<dyn Read + Send> = if file == "-" {
                Box::new(io::stdin())
            } else {
                Box::new(File::open(&file)?)
            };
            let feed = PortFeed::spawn_with_limit(input, cancel.clone(), max_record_size);
            service
                .update_ports(&cancel, feed)
                .map(|count| tracing::info!("Stored {} ports from {}", count, file))
        }
        Commands::List { from_id, limit } => service
            .list_ports(&cancel, &PortsFilter::new(from_id, limit))
            .and_then(|ports| {
                let mut stdout = io::stdout().lock();
                serde_json::to_writer_pretty(&mut stdout, &ports)?;
                writeln!(stdout)?;
                Ok(())
            }),
    };

    // Close even when the command failed; records written so far stay durable
    let closed = service.into_inner().close();
    outcome.and(closed)
}
