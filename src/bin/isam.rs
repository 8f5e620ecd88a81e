//! ISAM command line tool
//!
//! Create, load, query and reorganize indexed sequential files

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use isam::{FileConfig, IndexedFile, KeyRangeMode, LocateResult, Record};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "isam")]
#[command(about = "Block-organized indexed sequential file tool", version)]
struct Args {
    /// Path to the indexed file
    #[arg(short = 'f', long, global = true, default_value = "data.isam")]
    file: PathBuf,

    /// TOML file with geometry and key range mode
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty file, truncating any existing one
    Create,

    /// Create a file holding the numbered records FROM..=TO
    Load {
        #[arg(long, default_value = "1")]
        from: u64,

        #[arg(long)]
        to: u64,

        /// Fraction of each block to fill, in (0, 1]
        #[arg(long, default_value = "1.0")]
        fill_rate: f64,
    },

    /// Insert one record
    Insert {
        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value = "")]
        payload: String,
    },

    /// Logically delete one record
    Delete {
        #[arg(short, long)]
        key: String,
    },

    /// Search the primary zone for a key
    Locate {
        #[arg(short, long)]
        key: String,

        /// Use key ranges over active records only
        #[arg(long)]
        strict: bool,
    },

    /// Fetch an active record from the primary or overflow zone
    Get {
        #[arg(short, long)]
        key: String,
    },

    /// List records with FROM <= key <= TO
    List {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Skip logically deleted records
        #[arg(long)]
        active_only: bool,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Rewrite the active records into a new file
    Reorganize {
        #[arg(short, long)]
        dest: PathBuf,

        #[arg(long)]
        fill_rate: f64,
    },

    /// Print header counters and geometry
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Verify structural invariants
    Check,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("failed to load config from {:?}", path)),
        None => Ok(FileConfig::default()),
    }
}

fn open(args: &Args, config: FileConfig) -> anyhow::Result<IndexedFile> {
    IndexedFile::open(&args.file, config).with_context(|| format!("failed to open {:?}", args.file))
}

fn print_record(record: &Record) {
    let marker = if record.is_active() { ' ' } else { '-' };
    println!("{}{}  {}", marker, record.key_str(), record.payload_str());
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    match &args.command {
        Command::Create => {
            IndexedFile::create(&args.file, config)?.close()?;
        }

        Command::Load { from, to, fill_rate } => {
            if from > to {
                bail!("empty range {}..={}", from, to);
            }
            let mut file = IndexedFile::create(&args.file, config)?;
            let geometry = *file.geometry();
            let records = (*from..=*to)
                .map(|i| Record::numbered(i, &geometry))
                .collect::<isam::Result<Vec<_>>>()?;
            let stats = file.load_sorted(records, *fill_rate)?;
            file.close()?;
            println!(
                "loaded {} records into {} blocks ({} per block)",
                stats.records_loaded, stats.primary_blocks, stats.fill_limit
            );
        }

        Command::Insert { key, payload } => {
            let mut file = open(&args, config)?;
            let record = Record::new(key, payload, file.geometry())?;
            let position = file.insert(record)?;
            file.close()?;
            println!("{:?} block {} slot {}", position.zone, position.block, position.slot);
        }

        Command::Delete { key } => {
            let mut file = open(&args, config)?;
            let position = file.delete(key.as_bytes())?;
            file.close()?;
            println!("{:?} block {} slot {}", position.zone, position.block, position.slot);
        }

        Command::Locate { key, strict } => {
            let file = open(&args, config)?;
            let mode = if *strict {
                KeyRangeMode::Strict
            } else {
                file.key_range_mode()
            };
            match file.locate_with(key.as_bytes(), mode)? {
                LocateResult::Found { block, slot } => {
                    println!("found in block {} slot {}", block, slot)
                }
                LocateResult::NotFound { block } => {
                    println!("not found (last visited block {})", block)
                }
            }
        }

        Command::Get { key } => {
            let file = open(&args, config)?;
            match file.get(key.as_bytes())? {
                Some(record) => print_record(&record),
                None => bail!("key {} not found", key),
            }
        }

        Command::List {
            from,
            to,
            active_only,
            json,
        } => {
            let file = open(&args, config)?;
            let scan = if *active_only {
                file.list_active(from.as_bytes(), to.as_bytes())?
            } else {
                file.list(from.as_bytes(), to.as_bytes())?
            };

            let mut count = 0usize;
            for entry in scan {
                let entry = entry?;
                if *json {
                    let line = serde_json::json!({
                        "zone": entry.position.zone,
                        "block": entry.position.block,
                        "slot": entry.position.slot,
                        "key": entry.record.key_str(),
                        "active": entry.record.is_active(),
                        "payload": entry.record.payload_str(),
                    });
                    println!("{}", line);
                } else {
                    print_record(&entry.record);
                }
                count += 1;
            }
            info!("Listed {} records", count);
        }

        Command::Reorganize { dest, fill_rate } => {
            let file = open(&args, config)?;
            let stats = file.reorganize(dest, *fill_rate)?;
            println!(
                "copied {} records into {} blocks, dropped {} deleted",
                stats.records_copied, stats.primary_blocks, stats.records_dropped
            );
        }

        Command::Stats { json } => {
            let file = open(&args, config)?;
            let stats = file.stats();
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("primary blocks:  {}", stats.primary_blocks);
                println!("overflow blocks: {}", stats.overflow_blocks);
                println!("records:         {}", stats.total_records);
                println!("capacity:        {} per block", stats.capacity);
                println!("block size:      {} bytes", stats.block_size);
                println!("file size:       {} bytes", stats.file_bytes);
            }
        }

        Command::Check => {
            let file = open(&args, config)?;
            let report = file.check()?;
            for issue in &report.issues {
                println!("{}", issue);
            }
            if !report.is_clean() {
                bail!("{} issues found", report.issues.len());
            }
            println!(
                "ok: {} active, {} deleted records",
                report.active_records, report.deleted_records
            );
        }
    }

    Ok(())
}
