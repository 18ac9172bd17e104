use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod card_worker;
mod commands;
mod formatters;

use commands::ScanOptions;
use formatters::FormatMode;

#[derive(Parser)]
#[command(name = "mfc-reader")]
#[command(about = "MIFARE Classic / Plus Reader - Dump sectors from contactless cards")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Key and retry settings for a scan
#[derive(clap::Args)]
struct ScanArgs {
    /// JSON scan configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Passes over the key list per sector (overrides the config file)
    #[arg(long)]
    retries: Option<usize>,

    /// Draw a random RndA for MIFARE Plus authentication
    #[arg(long)]
    random_nonce: bool,

    /// Key directory with classic/<uid>.json and static/*.json
    #[arg(short, long)]
    keys: Option<PathBuf>,

    /// Key dictionary used to resolve hashed static keys
    #[arg(short, long)]
    dictionary: Option<PathBuf>,

    /// Reader to use (default: first reader with a card)
    #[arg(short, long)]
    reader: Option<String>,

    /// Output format mode
    #[arg(short, long, value_enum, default_value_t = FormatMode::Human)]
    format: FormatMode,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        ScanOptions {
            config: self.config.clone(),
            retries: self.retries,
            random_nonce: self.random_nonce,
            keys: self.keys.clone(),
            dictionary: self.dictionary.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List PC/SC readers
    Readers,
    /// Scan the card on the reader and print its sectors
    Read {
        #[command(flatten)]
        scan: ScanArgs,

        /// Write the dump to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scan every card presented to the reader
    Watch {
        #[command(flatten)]
        scan: ScanArgs,

        /// Directory to write one dump per card into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many cards
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Inspect a key file
    Keys {
        /// Key file (JSON)
        file: PathBuf,

        /// Key dictionary used to resolve hashed entries
        #[arg(short, long)]
        dictionary: Option<PathBuf>,
    },
    /// Compute the salted hash of a key
    KeyHash {
        /// Key as hex (6 or 16 bytes)
        key: String,

        /// Salt, usually the card name
        salt: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with environment-based filtering
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=trace for every frame
    // Default: info level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Readers => commands::readers::cmd_readers(),
        Command::Read { scan, output } => commands::read::cmd_read(
            &scan.options(),
            scan.reader.as_deref(),
            scan.format,
            output.as_deref(),
        ),
        Command::Watch { scan, output, count } => {
            if let Some(dir) = &output {
                std::fs::create_dir_all(dir)?;
            }
            commands::watch::cmd_watch(
                &scan.options(),
                scan.reader.clone(),
                scan.format,
                output.as_deref(),
                count,
            )
        }
        Command::Keys { file, dictionary } => {
            commands::keys::cmd_keys(&file, dictionary.as_deref())
        }
        Command::KeyHash { key, salt } => commands::key_hash::cmd_key_hash(&key, &salt),
    }
}
