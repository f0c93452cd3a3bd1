//! imgvec Cache Inspector
//!
//! Reads a dataset's embedding cache without loading any model.

use clap::{Parser, Subcommand};
use imgvec::storage::scan_images;
use imgvec::{CacheFile, EmbeddingCache, StoreConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// imgvec cache inspector
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Dataset root directory
    #[arg(short, long, default_value = "dataset")]
    root: PathBuf,

    /// Cache file name under the dataset root [default: the store's]
    #[arg(long)]
    cache_file: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

impl Args {
    fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::default();
        match &self.cache_file {
            Some(name) => config.with_cache_file_name(name),
            None => config,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Show entry count and embedding dimension
    Stats,
    /// Print every cached item identifier
    List,
    /// Compare the cache with the images on disk, without encoding
    Diff,
}

fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imgvec=info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.store_config();
    let file = CacheFile::in_root(&args.root, &config.cache_file_name);
    let cache = EmbeddingCache::load(&file)?;

    match args.command {
        Cmd::Stats => {
            println!("cache:     {}", file.path().display());
            println!("present:   {}", file.exists());
            println!("entries:   {}", cache.len());
            match cache.dimension() {
                Some(dim) => println!("dimension: {}", dim),
                None => println!("dimension: -"),
            }
        }
        Cmd::List => {
            for id in cache.ids() {
                println!("{}", id);
            }
        }
        Cmd::Diff => {
            let scan = scan_images(&args.root, &config.extensions)?;
            let plan = cache.plan(&scan);
            for image in &plan.pending {
                println!("+ {}", image.id);
            }
            for id in &plan.stale {
                println!("- {}", id);
            }
            for failure in &scan.failures {
                warn!(path = %failure.path.display(), "Not listed: {}", failure.reason);
            }
            info!(
                "{} on disk, {} to embed, {} stale, {} unlisted",
                scan.images.len(),
                plan.pending.len(),
                plan.stale.len(),
                scan.failures.len()
            );
        }
    }

    Ok(())
}
