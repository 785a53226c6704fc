//! HashDB CLI
//!
//! Command-line interface for creating and querying a HashDB file.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hashdb::{Config, HashDb, UpdatePolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// HashDB CLI
#[derive(Parser, Debug)]
#[command(name = "hashdb-cli")]
#[command(about = "CLI for the HashDB persistent hash table")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./hashdb.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new, empty database (replaces an existing file)
    Create {
        /// Bucket-count exponent: the table gets 2^BITS buckets
        #[arg(short, long, default_value = "16")]
        bits: u32,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Keep the stored value if the key already exists
        #[arg(long)]
        keep_existing: bool,
    },

    /// Check the structure of every bucket tree
    Verify,

    /// Print the file layout summary
    Info,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> hashdb::Result<ExitCode> {
    match args.command {
        Commands::Create { bits } => {
            let config = Config::builder().path(&args.db).bucket_bits(bits).build();
            HashDb::create_with_config(config)?.close()?;
        }
        Commands::Get { key } => {
            let db = HashDb::open(&args.db)?;
            match db.get(key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => {
                    println!("(nil)");
                    return Ok(ExitCode::from(2));
                }
            }
        }
        Commands::Set {
            key,
            value,
            keep_existing,
        } => {
            let policy = if keep_existing {
                UpdatePolicy::KeepExisting
            } else {
                UpdatePolicy::Overwrite
            };
            let config = Config::builder().path(&args.db).update_policy(policy).build();
            let db = HashDb::open_with_config(config)?;
            db.set(key.as_bytes(), value.as_bytes())?;
            db.close()?;
            println!("OK");
        }
        Commands::Verify => {
            let report = HashDb::open(&args.db)?.verify()?;
            println!(
                "OK: {} records in {} buckets, max depth {}",
                report.records, report.buckets_used, report.max_depth
            );
        }
        Commands::Info => {
            let db = HashDb::open(&args.db)?;
            println!("path:    {}", db.path().display());
            println!("buckets: 2^{} = {}", db.bucket_bits(), db.bucket_count());
            println!("size:    {} bytes", db.file_len());
        }
    }

    Ok(ExitCode::SUCCESS)
}
