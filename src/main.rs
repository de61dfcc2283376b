//! Exdepot CLI - Command-line tool for game content depot extraction.
//!
//! This is the main entry point for the exdepot command-line application.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use exdepot::depot::{write_file_list, write_index_json, write_manifest_json};
use exdepot::prelude::*;

/// Exdepot - game content depot extraction tool
#[derive(Parser)]
#[command(name = "exdepot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which depot to open and where its files live.
#[derive(Args)]
struct DepotArgs {
    /// Depot id
    #[arg(short, long)]
    depot: u32,

    /// Depot version
    #[arg(long)]
    depot_version: u32,

    /// Directory holding `{depot}_{version}.manifest` files
    #[arg(long, env = "EXDEPOT_MANIFEST_DIR", default_value = "manifests")]
    manifest_dir: PathBuf,

    /// Directory holding `{depot}.index` and `{depot}.data` files
    #[arg(long, env = "EXDEPOT_STORAGE_DIR", default_value = "storages")]
    storage_dir: PathBuf,

    /// JSON file mapping depot ids to hex keys
    #[arg(short, long, env = "EXDEPOT_KEYFILE", default_value = "depotkeys.json")]
    keyfile: PathBuf,
}

impl DepotArgs {
    fn layout(&self) -> DepotLayout {
        DepotLayout::new(&self.manifest_dir, &self.storage_dir)
    }

    /// The key file, if it exists. Encrypted files fail later with a missing key.
    fn keyfile(&self) -> Option<&Path> {
        if self.keyfile.is_file() {
            Some(&self.keyfile)
        } else {
            eprintln!(
                "Warning: key file {} not found, encrypted files cannot be extracted",
                self.keyfile.display()
            );
            None
        }
    }

    fn load(&self) -> Result<Depot> {
        let start = Instant::now();
        let depot = Depot::load(
            &self.layout(),
            self.keyfile(),
            self.depot,
            self.depot_version,
        )
        .with_context(|| {
            format!(
                "Failed to load depot {} version {}",
                self.depot, self.depot_version
            )
        })?;

        eprintln!(
            "Loaded {} items and {} index entries in {:?}",
            depot.manifest().len(),
            depot.index().len(),
            start.elapsed()
        );

        Ok(depot)
    }
}

/// Manifest field used to look up the depot key.
#[derive(Clone, Copy, ValueEnum)]
enum KeyField {
    DepotId,
    InfoCount,
}

impl From<KeyField> for KeySelector {
    fn from(field: KeyField) -> Self {
        match field {
            KeyField::DepotId => KeySelector::DepotId,
            KeyField::InfoCount => KeySelector::InfoCount,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every file of a depot version
    Extract {
        #[command(flatten)]
        depot: DepotArgs,

        /// Output directory (default: `{depot}_{version}`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of extraction workers (default: CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Pending job capacity; 0 hands each job directly to a free worker
        #[arg(long, default_value_t = 0)]
        queue_depth: usize,

        /// Keep extracting after a file fails and report all failures
        #[arg(long)]
        keep_going: bool,

        /// Manifest field used to look up the decryption key
        #[arg(long, value_enum, default_value = "depot-id")]
        key_field: KeyField,
    },

    /// List every path in a depot manifest
    FileList {
        #[command(flatten)]
        depot: DepotArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump a depot manifest as JSON
    ManifestJson {
        #[command(flatten)]
        depot: DepotArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump a depot index as JSON
    IndexJson {
        #[command(flatten)]
        depot: DepotArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            depot,
            output,
            workers,
            queue_depth,
            keep_going,
            key_field,
        } => {
            let mut options = ExtractOptions::default().with_queue_depth(queue_depth);
            if let Some(workers) = workers {
                options = options.with_workers(workers);
            }
            if keep_going {
                options = options.with_policy(FailurePolicy::CollectAll);
            }
            cmd_extract(&depot, output, options, key_field.into())?;
        }
        Commands::FileList { depot, output } => {
            let depot = depot.load()?;
            let out = open_output(output.as_deref())?;
            write_file_list(depot.manifest(), out).context("Failed to write file list")?;
        }
        Commands::ManifestJson { depot, output } => {
            let depot = depot.load()?;
            let out = open_output(output.as_deref())?;
            write_manifest_json(depot.manifest(), out).context("Failed to write manifest JSON")?;
        }
        Commands::IndexJson { depot, output } => {
            let depot = depot.load()?;
            let out = open_output(output.as_deref())?;
            write_index_json(depot.index(), out).context("Failed to write index JSON")?;
        }
    }

    Ok(())
}

fn cmd_extract(
    args: &DepotArgs,
    output: Option<PathBuf>,
    options: ExtractOptions,
    selector: KeySelector,
) -> Result<()> {
    let depot = args.load()?;
    let layout = args.layout();

    let output = output
        .unwrap_or_else(|| PathBuf::from(format!("{}_{}", args.depot, args.depot_version)));

    let data = depot
        .open_data(&layout)
        .context("Failed to open depot data")?;
    let key = depot.key(selector);

    eprintln!("Using {} extraction workers", options.workers);
    eprintln!("Extracting to {}...", output.display());

    let pb = ProgressBar::new(depot.manifest().files().count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let report = depot
        .extractor(&data, key)
        .with_options(options)
        .run_with_progress(&output, |outcome| {
            if let Err(e) = &outcome.result {
                pb.println(format!("Failed: {}: {e}", outcome.path.display()));
            }
            pb.inc(1);
        });

    pb.finish_and_clear();
    let report = report.context("Extraction failed")?;

    eprintln!(
        "Extracted {} files ({} bytes) and {} directories in {:?}",
        report.files,
        report.bytes,
        report.directories,
        start.elapsed()
    );

    if !report.is_success() {
        for failure in &report.failures {
            eprintln!("  {} (id {}): {}", failure.path.display(), failure.id, failure.error);
        }
        bail!(
            "{} of {} files failed to extract",
            report.failures.len(),
            report.files + report.failures.len()
        );
    }

    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
