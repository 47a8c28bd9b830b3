//! mediaconv CLI
//!
//! Command-line tools for FozDB cache databases.
//!
//! # Commands
//!
//! - `inspect` - Display database statistics and metadata
//! - `verify` - Check the CRC of every entry
//! - `list` - List entries
//! - `extract` - Write one payload to a file or stdout
//! - `discard` - Remove entries by compaction
//! - `gc` - Purge dumped streams that have been transcoded
//! - `hash` - Print the cache fingerprint of a media file

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use mediaconv_core::MediaKind;
use mediaconv_hash::PayloadHash;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// mediaconv cache database tools.
#[derive(Parser)]
#[command(name = "mediaconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Number of tags the database was created with
    #[arg(global = true, short = 't', long, default_value_t = commands::DEFAULT_NUM_TAGS)]
    num_tags: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display database statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the CRC of every entry
    Verify,

    /// List entries
    List {
        /// Only list this tag
        #[arg(long)]
        tag: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Write one payload to a file or stdout
    Extract {
        /// Entry tag
        #[arg(long)]
        tag: u32,

        /// Entry hash, 32 hex digits
        #[arg(long)]
        hash: PayloadHash,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove entries by compaction
    Discard {
        /// Entry names, 40 hex digits each (8 tag + 32 hash)
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Purge dumped streams whose transcodes are available
    Gc {
        /// Media kind of the databases
        #[arg(short, long)]
        kind: Option<MediaKind>,

        /// Transcoded database
        #[arg(long)]
        transcoded: Option<PathBuf>,

        /// JSON cache configuration supplying the kind and paths
        #[arg(long)]
        config: Option<PathBuf>,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the cache fingerprint of a media file
    Hash {
        /// Media file
        file: PathBuf,

        /// MurmurHash3 variant
        #[arg(long, default_value = "native")]
        variant: commands::hash::HashVariant,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, cli.num_tags, format, &mut out)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, cli.num_tags, &mut out)?;
        }
        Commands::List { tag, format } => {
            let path = cli.path.ok_or("Database path required for list")?;
            commands::list::run(&path, cli.num_tags, tag, format, &mut out)?;
        }
        Commands::Extract { tag, hash, output } => {
            let path = cli.path.ok_or("Database path required for extract")?;
            commands::extract::run(&path, cli.num_tags, tag, hash, output.as_deref(), &mut out)?;
        }
        Commands::Discard { names } => {
            let path = cli.path.ok_or("Database path required for discard")?;
            commands::discard::run(&path, cli.num_tags, &names, &mut out)?;
        }
        Commands::Gc {
            kind,
            transcoded,
            config,
            dry_run,
            format,
        } => {
            let target = commands::gc::GcTarget::resolve(cli.path, kind, transcoded, config)?;
            commands::gc::run(&target, dry_run, format, &mut out)?;
        }
        Commands::Hash {
            file,
            variant,
            format,
        } => {
            commands::hash::run(&file, variant, format, &mut out)?;
        }
        Commands::Version => {
            writeln!(out, "mediaconv CLI v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "mediaconv core v{}", mediaconv_core::VERSION)?;
        }
    }

    Ok(())
}
