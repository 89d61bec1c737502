//! rwlock CLI
//!
//! Command-line interface for taking and releasing locks by hand.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use redis_rwlock::{Config, ConnectionOptions, LockService, Wait};
use tracing_subscriber::{fmt, EnvFilter};

/// rwlock CLI
#[derive(Parser, Debug)]
#[command(name = "rwlock-cli")]
#[command(about = "Distributed read-write locks over Redis")]
#[command(version)]
struct Args {
    /// Single node URL
    #[arg(short, long, default_value = "redis://127.0.0.1:6379")]
    url: String,

    /// Sentinel addresses (comma separated), enables failover mode
    #[arg(long, value_delimiter = ',', requires = "master")]
    sentinel: Vec<String>,

    /// Sentinel master name
    #[arg(long)]
    master: Option<String>,

    /// Cluster seed nodes (comma separated), enables cluster mode
    #[arg(long, value_delimiter = ',', conflicts_with = "sentinel")]
    cluster: Vec<String>,

    /// Attempts made by release commands
    #[arg(long, default_value = "10")]
    release_attempts: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect, install the procedure and exit
    Ping,

    /// Acquire a write lock
    Lock {
        key: String,
        holder: String,

        /// Lease in seconds
        #[arg(short, long, default_value = "5")]
        lease: i64,

        /// Give up after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Release a write lock
    Unlock { key: String, holder: String },

    /// Acquire a read lock
    Rlock {
        key: String,

        /// Give up after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Release a read lock
    Runlock { key: String },

    /// Acquire, hold for a while, then release
    Hold {
        key: String,
        holder: String,

        /// Seconds to hold the lock
        #[arg(short, long, default_value = "5")]
        secs: u64,

        /// Take a read lock instead of a write lock
        #[arg(short, long)]
        read: bool,
    },
}

impl Args {
    fn connection(&self) -> ConnectionOptions {
        if !self.cluster.is_empty() {
            ConnectionOptions::cluster(self.cluster.clone())
        } else if !self.sentinel.is_empty() {
            ConnectionOptions::failover(
                self.sentinel.clone(),
                self.master.clone().unwrap_or_default(),
            )
        } else {
            ConnectionOptions::single(&self.url)
        }
    }
}

fn wait_for(timeout_ms: Option<u64>) -> Wait {
    match timeout_ms {
        Some(ms) => Wait::timeout(Duration::from_millis(ms)),
        None => Wait::forever(),
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,redis_rwlock=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("rwlock-cli v{}", redis_rwlock::VERSION);

    let config = Config::builder()
        .connection(args.connection())
        .release_attempts(args.release_attempts)
        .build();

    // Locks are foundational: no store, no run
    let service = match LockService::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start lock service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &args.command {
        Commands::Ping => Ok(()),
        Commands::Lock {
            key,
            holder,
            lease,
            timeout_ms,
        } => service.acquire_write_with(key, holder, *lease, &wait_for(*timeout_ms)),
        Commands::Unlock { key, holder } => service.release_write(key, holder),
        Commands::Rlock { key, timeout_ms } => {
            service.acquire_read_with(key, &wait_for(*timeout_ms))
        }
        Commands::Runlock { key } => service.release_read(key),
        Commands::Hold {
            key,
            holder,
            secs,
            read,
        } => {
            let hold = Duration::from_secs(*secs);
            if *read {
                service.lock_read(key).and_then(|guard| {
                    tracing::info!("Holding read lock on '{}' for {:?}", key, hold);
                    thread::sleep(hold);
                    guard.release()
                })
            } else {
                // Lease outlives the hold so the lock cannot lapse mid-way
                let lease = i64::try_from(secs.saturating_add(5)).unwrap_or(i64::MAX);
                service.lock_write(key, holder, lease).and_then(|guard| {
                    tracing::info!("Holding write lock on '{}' for {:?}", key, hold);
                    thread::sleep(hold);
                    guard.release()
                })
            }
        }
    };

    match result {
        Ok(()) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
